use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Result, RoombookError};

/// Decodes a captcha payload, accepting both bare base64 and
/// `data:image/...;base64,<payload>` URIs.
pub fn decode_captcha_payload(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(uri) => {
            uri.split_once(',')
                .map(|(_, data)| data)
                .ok_or_else(|| {
                    RoombookError::DecodeFailure("data URI has no payload".to_string())
                })?
        }
        None => payload,
    };

    // Payloads may arrive line-wrapped.
    let cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(RoombookError::DecodeFailure("captcha payload is empty".to_string()));
    }

    Ok(STANDARD.decode(cleaned)?)
}

/// Keeps only the ASCII letters and digits of an OCR result.
pub fn normalize_captcha_text(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
