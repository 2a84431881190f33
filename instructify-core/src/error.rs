use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::Deserialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("x1 must be < x2".to_string());
        assert_eq!(err.to_string(), "Invalid input: x1 must be < x2");
    }

    #[test]
    fn test_json_error_maps_to_deserialization() {
        let json_err = serde_json::from_str::<Vec<u8>>("[1, ").unwrap_err();
        match Error::from(json_err) {
            Error::Deserialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Deserialization error, got {:?}", other),
        }
    }
}
