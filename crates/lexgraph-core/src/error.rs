use thiserror::Error;

/// Errors raised while assembling settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}
