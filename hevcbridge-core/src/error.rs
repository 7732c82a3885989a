//! Error types for the hevcbridge workspace.
//!
//! The taxonomy distinguishes negotiation failures (the caller may try
//! another format), per-call failures (the caller may grow a buffer and
//! retry), and session-fatal failures (no further processing until a fresh
//! Begin).

use thiserror::Error;

/// Main error type for the hevcbridge adapter.
#[derive(Error, Debug)]
pub enum Error {
    /// Format negotiation failed. Not fatal — the caller may offer another
    /// format.
    #[error("format rejected: {0}")]
    FormatRejected(String),

    /// The caller-provided output buffer cannot hold the produced data.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// The external engine refused to open with the derived parameters.
    /// Fatal to the session.
    #[error("engine open failed: {0}")]
    EngineOpenFailed(String),

    /// A configuration option could not be applied. Fatal to the session.
    #[error("invalid parameter {option}: {value}")]
    ParameterInvalid { option: String, value: String },

    /// Pixel conversion failed. Fatal to the session — the converter has no
    /// partial-failure mode.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// A compressed payload does not follow the expected framing. Decode
    /// direction only; recovered locally by pass-through.
    #[error("malformed bitstream: {0}")]
    MalformedBitstream(String),

    /// No buffer layout could be derived for the request.
    #[error("layout error: {0}")]
    Layout(String),

    /// The session is not in a state that allows the call.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// External engine failure during encode or decode. Fatal to the session.
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Create a format-rejection error.
    pub fn format_rejected(msg: impl Into<String>) -> Self {
        Error::FormatRejected(msg.into())
    }

    /// Create an invalid-parameter error naming the offending option.
    pub fn invalid_param(option: impl Into<String>, value: impl Into<String>) -> Self {
        Error::ParameterInvalid {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Check whether this error aborts the whole session.
    ///
    /// Negotiation rejections, undersized caller buffers, and malformed
    /// decode payloads are recoverable for the call that produced them;
    /// everything else poisons the session until a fresh Begin.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::FormatRejected(_)
                | Error::BufferTooSmall { .. }
                | Error::MalformedBitstream(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BufferTooSmall {
            needed: 4096,
            available: 512,
        };
        assert_eq!(err.to_string(), "buffer too small: need 4096 bytes, have 512");

        let err = Error::invalid_param("level", "9.9");
        assert_eq!(err.to_string(), "invalid parameter level: 9.9");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!Error::format_rejected("odd width").is_fatal());
        assert!(!Error::BufferTooSmall { needed: 1, available: 0 }.is_fatal());
        assert!(!Error::MalformedBitstream("short length field".into()).is_fatal());

        assert!(Error::EngineOpenFailed("no encoder".into()).is_fatal());
        assert!(Error::ConversionFailed("csp".into()).is_fatal());
        assert!(Error::invalid_param("preset", "warp9").is_fatal());
    }
}
