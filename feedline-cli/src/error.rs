use feedline_client::{ClientError, FieldErrors};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Login failed: check your username and password")]
    LoginFailed,

    #[error("Not logged in - run `feedline login` first")]
    NotLoggedIn,
}

impl CliError {
    /// Whether the user has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        match self {
            Self::NotLoggedIn | Self::LoginFailed => true,
            Self::Client(ClientError::SessionExpired { .. }) => true,
            _ => false,
        }
    }

    /// Field errors of a rejected registration.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Client(ClientError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(feature = "interactive")]
impl From<inquire::InquireError> for CliError {
    fn from(err: inquire::InquireError) -> Self {
        Self::Prompt(err.to_string())
    }
}
