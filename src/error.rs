use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardianError {
    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("Package manager call failed: {0}")]
    Backend(String),

    #[error("Command '{command}' timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment is not safe to modify: {0}")]
    EnvironmentUnsafe(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GuardianError {
    /// Timeouts are a backend failure subtype but are reported separately.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GuardianError::TimedOut { .. })
    }
}

pub type Result<T> = std::result::Result<T, GuardianError>;
