use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoombookError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream rejected request (code {code}): {message}")]
    UpstreamRejection { code: i64, message: String },

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),
}

impl From<base64::DecodeError> for RoombookError {
    fn from(e: base64::DecodeError) -> Self {
        RoombookError::DecodeFailure(format!("invalid base64 payload: {e}"))
    }
}

impl RoombookError {
    /// True for network-level failures (connect, timeout, unreadable body).
    pub fn is_transport(&self) -> bool {
        matches!(self, RoombookError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, RoombookError>;

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    #[test]
    fn test_base64_error_maps_to_decode_failure() {
        let err: RoombookError = STANDARD.decode("not base64!!").unwrap_err().into();
        assert!(matches!(err, RoombookError::DecodeFailure(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_upstream_rejection_display() {
        let err = RoombookError::UpstreamRejection {
            code: 500,
            message: "房间不可用".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upstream rejected request (code 500): 房间不可用"
        );
    }
}
