use thiserror::Error;

use vantage_model::ModelError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Authentication rejected by the asset service")]
    Unauthorized,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl EngineError {
    /// Cancellation is a normal outcome, never reported as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled(_))
    }

    /// Hard authentication failure; not retried automatically.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            EngineError::Unauthorized | EngineError::HttpStatus { status: 401 }
        )
    }

    /// Classify a response status the way every remote read does:
    /// 200/206 pass, 401 is an auth failure, anything else is fatal.
    pub fn check_status(status: u16) -> Result<()> {
        match status {
            200 | 206 => Ok(()),
            401 => Err(EngineError::Unauthorized),
            other => Err(EngineError::HttpStatus { status: other }),
        }
    }
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidRange(msg) => EngineError::InvalidRange(msg),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 => EngineError::Unauthorized,
            Some(status) => EngineError::HttpStatus {
                status: status.as_u16(),
            },
            None => EngineError::Network(err.to_string()),
        }
    }
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(EngineError::check_status(200).is_ok());
        assert!(EngineError::check_status(206).is_ok());
        assert!(EngineError::check_status(401).unwrap_err().is_auth());
        assert!(matches!(
            EngineError::check_status(416),
            Err(EngineError::HttpStatus { status: 416 })
        ));
    }
}
