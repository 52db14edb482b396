pub mod config;
pub mod error;
pub mod types;

pub use config::BounceConfig;
pub use error::{BounceError, Result};
pub use types::ConnectionId;
