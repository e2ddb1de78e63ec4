//! Captcha recognition.
//!
//! The booking portal hands out short alphanumeric captchas as base64 images.
//! This module turns such a payload into text:
//! - [`decode_captcha_payload`] strips an optional data-URI prefix and decodes
//! - [`preprocess_captcha`] upscales, grayscales and contrast-stretches
//! - [`OcrProvider`] runs the engine and normalises the answer
//!
//! # Backends
//!
//! Selected by the prefix of `OCR_MODEL`:
//! - `local/...` (default): Tesseract via leptess, behind the `local-ocr` feature
//! - `openai/...`, `mistral/...`, `deepseek/...`: OpenAI-compatible vision chat API
//!
//! A backend that cannot start leaves the provider unavailable; recognition
//! then yields an empty string and the booking run stops.

mod api;
mod decode;
mod preprocessing;
mod provider;

pub use decode::{decode_captcha_payload, normalize_captcha_text};
pub use preprocessing::preprocess_captcha;
pub use provider::OcrProvider;
