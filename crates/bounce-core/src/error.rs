use thiserror::Error;

#[derive(Debug, Error)]
pub enum BounceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BounceError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            BounceError::Config(_) => "CONFIG_ERROR",
            BounceError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BounceError>;
