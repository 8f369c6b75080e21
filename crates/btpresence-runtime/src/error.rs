//! Fatal error type for the supervisor loop.

use thiserror::Error;

use btpresence_mqtt::MqttError;
use btpresence_scan::ScanError;

/// Every variant is fatal: the runner logs the cause and the process
/// exits non-zero. Recoverable conditions (device resolution
/// failures) never surface here.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("supervisor not started")]
    NotStarted,

    #[error("discovery session event stream closed")]
    SessionStreamClosed,

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Publish(#[from] MqttError),
}
