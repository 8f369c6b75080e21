//! btpresence-scan: radio IO boundary.
//! Provides the scan backend trait, the BlueZ-backed production
//! implementation, and the discovery session lifecycle (start,
//! refresh, cancel). No publishing logic; pure IO boundary.

pub mod backend;
pub mod bluez;
pub mod error;
pub mod session;

pub use backend::ScanBackend;
pub use bluez::BluezBackend;
pub use error::ScanError;
pub use session::{ScanSession, SessionGuard, SessionManager};
