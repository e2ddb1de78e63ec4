use std::time::Duration;

#[cfg(feature = "local-ocr")]
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(feature = "local-ocr")]
use leptess::LepTess;
#[cfg(feature = "local-ocr")]
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::booking::CaptchaRecognizer;
use crate::config::OcrConfig;
use crate::error::{Result, RoombookError};

use super::api::VisionOcrClient;
use super::decode::{decode_captcha_payload, normalize_captcha_text};
use super::preprocessing::preprocess_captcha;

#[derive(Clone)]
enum OcrBackend {
    #[cfg(feature = "local-ocr")]
    Local { tesseract: Arc<Mutex<LepTess>> },
    Api { client: VisionOcrClient },
    Unavailable { reason: String },
}

/// Captcha recognizer. Holds the loaded engine for the lifetime of a run.
#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

#[cfg(feature = "local-ocr")]
fn local_backend(config: &OcrConfig) -> std::result::Result<OcrBackend, String> {
    let lt = LepTess::new(None, &config.languages)
        .map_err(|e| format!("Tesseract not available: {e}"))?;
    info!(languages = %config.languages, "Tesseract OCR initialized");
    Ok(OcrBackend::Local {
        tesseract: Arc::new(Mutex::new(lt)),
    })
}

#[cfg(not(feature = "local-ocr"))]
fn local_backend(_config: &OcrConfig) -> std::result::Result<OcrBackend, String> {
    Err("built without the local-ocr feature".to_string())
}

impl OcrProvider {
    /// Picks a backend from the `provider/` prefix of `config.model`.
    /// Backends that cannot start degrade to unavailable instead of failing.
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let model_lower = config.model.to_lowercase();
        let provider_prefix = model_lower.split('/').next().unwrap_or("local");

        let backend = match provider_prefix {
            "openai" | "mistral" | "deepseek" => VisionOcrClient::new(config)
                .map(|client| {
                    info!(model = %config.model, "Vision OCR API backend initialized");
                    OcrBackend::Api { client }
                })
                .map_err(|e| format!("Vision OCR backend unavailable: {e}")),
            _ => local_backend(config),
        };

        match backend {
            Ok(backend) => Ok(Self {
                backend,
                config: config.clone(),
            }),
            Err(reason) => {
                warn!("{}", reason);
                Ok(Self::unavailable(reason, config))
            }
        }
    }

    /// A provider that never recognises anything.
    pub fn unavailable(reason: impl Into<String>, config: &OcrConfig) -> Self {
        Self {
            backend: OcrBackend::Unavailable {
                reason: reason.into(),
            },
            config: config.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    /// Runs the engine on raw image bytes, bounded by `timeout_secs`.
    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.ocr_internal(image_bytes)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(RoombookError::Ocr(format!(
                "OCR operation timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }

    async fn ocr_internal(&self, image_bytes: &[u8]) -> Result<String> {
        match &self.backend {
            #[cfg(feature = "local-ocr")]
            OcrBackend::Local { tesseract } => {
                let bytes = image_bytes.to_vec();
                let tesseract = Arc::clone(tesseract);

                let text = tokio::task::spawn_blocking(move || {
                    let mut lt = tesseract.blocking_lock();
                    lt.set_image_from_mem(&bytes)
                        .map_err(|e| RoombookError::Ocr(format!("Failed to set image: {e}")))?;
                    lt.get_utf8_text()
                        .map_err(|e| RoombookError::Ocr(format!("Failed to extract text: {e}")))
                })
                .await
                .map_err(|e| RoombookError::Ocr(format!("OCR task panicked: {e}")))??;

                Ok(text.trim().to_string())
            }
            OcrBackend::Api { client } => client.ocr(image_bytes).await,
            OcrBackend::Unavailable { reason } => {
                Err(RoombookError::OcrUnavailable(reason.clone()))
            }
        }
    }

    /// Decodes, cleans up and reads a base64 captcha.
    pub async fn recognize_captcha(&self, captcha_base64: &str) -> Result<String> {
        let raw = decode_captcha_payload(captcha_base64)?;
        let prepared = preprocess_captcha(&raw, &self.config)?;
        let text = self.ocr(&prepared).await?;
        Ok(normalize_captcha_text(&text))
    }
}

#[async_trait]
impl CaptchaRecognizer for OcrProvider {
    async fn recognize(&self, captcha_base64: &str) -> String {
        match self.recognize_captcha(captcha_base64).await {
            Ok(text) => {
                info!(text = %text, "OCR result");
                text
            }
            Err(e) => {
                warn!(error = %e, "Captcha recognition failed");
                String::new()
            }
        }
    }
}
