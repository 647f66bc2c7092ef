//! GroupWatch core: domain types, error taxonomy, layered configuration and
//! the `PlatformApi` seam shared by the HTTP client and the scan engine.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use traits::*;
pub use types::*;
