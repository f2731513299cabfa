use thiserror::Error;

use super::Platform;

/// dealtrack error types
#[derive(Error, Debug)]
pub enum DealError {
    /// A storefront could not be reached or answered with an unusable payload
    #[error("{platform} unavailable: {reason}")]
    SourceUnavailable { platform: Platform, reason: String },

    /// A single candidate item could not be decoded
    #[error("malformed item: {0}")]
    MalformedItem(String),

    /// An item's price fields are inconsistent or unrecoverably scaled
    #[error("ambiguous price data: {0}")]
    AmbiguousPriceData(String),

    /// Caller supplied a discount or platform outside the recognized domain
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DealError {
    pub fn unavailable(platform: Platform, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            platform,
            reason: reason.into(),
        }
    }
}

/// Result type alias for dealtrack
pub type Result<T> = std::result::Result<T, DealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DealError::InvalidRequest("discount must be 0-100".into());
        assert_eq!(err.to_string(), "invalid request: discount must be 0-100");
    }

    #[test]
    fn test_source_unavailable_display() {
        let err = DealError::unavailable(Platform::Epic, "timed out");
        assert_eq!(err.to_string(), "epic unavailable: timed out");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DealError = io_err.into();
        assert!(err.to_string().contains("io error"));
    }
}
