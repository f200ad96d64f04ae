//! Error types for the narration pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a deck into narration.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The deck itself cannot be opened. This is the only fatal error.
    #[error("Could not open slide deck: {0}")]
    DocumentOpen(String),

    /// A single page could not be read.
    #[error("Failed to extract slide {page}: {reason}")]
    Extraction { page: usize, reason: String },

    /// The relevance oracle failed for an image.
    #[error("Image classification failed on slide {slide}: {reason}")]
    Classification { slide: usize, reason: String },

    /// The narration oracle returned a different number of segments than
    /// the chunk has slides.
    #[error("Chunk {chunk} returned {actual} narration segments for {expected} slides")]
    GenerationMismatch {
        chunk: usize,
        expected: usize,
        actual: usize,
    },

    /// An oracle kept timing out until the retry budget ran out.
    #[error("Oracle timed out after {attempts} attempt(s)")]
    OracleTimeout { attempts: usize },

    /// An oracle failed for a reason other than a timeout.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// The pipeline configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),
}

impl Error {
    /// Whether the pipeline must stop when it sees this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DocumentOpen(_) | Error::InvalidConfig(_) | Error::IoError(_)
        )
    }
}

/// Failures reported by an external oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The call exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The service could not be reached or is overloaded.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request (bad credentials, bad input).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// Whether repeating the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::Timeout | OracleError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_errors_are_fatal() {
        assert!(Error::DocumentOpen("bad zip".into()).is_fatal());
        assert!(!Error::OracleTimeout { attempts: 3 }.is_fatal());
        assert!(!Error::GenerationMismatch {
            chunk: 1,
            expected: 5,
            actual: 3
        }
        .is_fatal());
    }

    #[test]
    fn test_retryable_oracle_errors() {
        assert!(OracleError::Timeout.is_retryable());
        assert!(OracleError::Unavailable("503".into()).is_retryable());
        assert!(!OracleError::Rejected("401".into()).is_retryable());
        assert!(!OracleError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_mismatch_message() {
        let err = Error::GenerationMismatch {
            chunk: 2,
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Chunk 2 returned 3 narration segments for 5 slides"
        );
    }
}
