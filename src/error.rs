//! Error types for luarray.

use thiserror::Error;

/// Common error type for luarray.
#[derive(Error, Debug)]
pub enum LuarrayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Script execution error.
    #[error("script error: {0}")]
    Script(String),
}

/// Result type alias for luarray operations.
pub type Result<T> = std::result::Result<T, LuarrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = LuarrayError::Config("bad value for level".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value for level");
    }

    #[test]
    fn test_script_error_display() {
        let err = LuarrayError::Script("attempt to call a nil value".to_string());
        assert_eq!(err.to_string(), "script error: attempt to call a nil value");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LuarrayError = io_err.into();
        assert!(matches!(err, LuarrayError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(LuarrayError::Script("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
