use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OcrConfig;
use crate::error::{Result, RoombookError};

const CAPTCHA_PROMPT: &str = "This image is a short captcha made of letters and digits. \
Reply with the characters only, without spaces or explanations.";

const MAX_RETRIES: u32 = 3;

/// Default endpoint and model for each OpenAI-compatible vision provider.
fn provider_defaults(provider: &str) -> Option<(&'static str, &'static str)> {
    match provider {
        "openai" => Some(("https://api.openai.com/v1", "gpt-4o-mini")),
        "mistral" => Some(("https://api.mistral.ai/v1", "pixtral-12b-2409")),
        "deepseek" => Some(("https://api.deepseek.com/v1", "deepseek-vl")),
        _ => None,
    }
}

/// Reads captchas through an OpenAI-compatible chat completion endpoint.
#[derive(Clone, Debug)]
pub struct VisionOcrClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

impl VisionOcrClient {
    /// `config.model` is `provider/model`; the model part may be omitted.
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (provider, model) = config
            .model
            .split_once('/')
            .unwrap_or((config.model.as_str(), ""));
        let provider = provider.to_lowercase();

        let (default_base_url, default_model) = provider_defaults(&provider).ok_or_else(|| {
            RoombookError::Ocr(format!("Unsupported OCR API provider: {provider}"))
        })?;

        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RoombookError::Ocr(format!("API key required for {provider} OCR")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RoombookError::Ocr(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.to_string()),
            model: if model.is_empty() {
                default_model.to_string()
            } else {
                model.to_string()
            },
        })
    }

    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(image_bytes));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: CAPTCHA_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 16,
        };

        self.make_request(&request).await
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<String> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await;

            let error = match response {
                Ok(resp) if resp.status().is_success() => {
                    let chat_response: ChatResponse = resp.json().await.map_err(|e| {
                        RoombookError::Ocr(format!("Failed to parse response: {e}"))
                    })?;

                    return chat_response
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| RoombookError::Ocr("No response from API".to_string()));
                }
                Ok(resp) if resp.status().as_u16() == 429 || resp.status().is_server_error() => {
                    format!("status {}", resp.status())
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(RoombookError::Ocr(format!(
                        "API request failed: {status} - {body}"
                    )));
                }
                Err(e) => e.to_string(),
            };

            retries += 1;
            if retries >= MAX_RETRIES {
                return Err(RoombookError::Ocr(format!(
                    "API request failed after {MAX_RETRIES} retries: {error}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(100 * 2_u64.pow(retries))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(model: &str, api_key: Option<&str>) -> OcrConfig {
        OcrConfig {
            model: model.to_string(),
            api_key: api_key.map(String::from),
            ..OcrConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn test_api_key_required() {
        let err = VisionOcrClient::new(&config("openai/gpt-4o", None)).unwrap_err();
        assert!(err.to_string().contains("API key required"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = VisionOcrClient::new(&config("acme/vision", Some("k"))).unwrap_err();
        assert!(err.to_string().contains("Unsupported OCR API provider"));
    }

    #[test]
    fn test_default_model_and_base_url() {
        let client = VisionOcrClient::new(&config("mistral", Some("k"))).unwrap();
        assert_eq!(client.model, "pixtral-12b-2409");
        assert!(client.base_url.contains("mistral"));

        let client = VisionOcrClient::new(&config("OpenAI/gpt-4o", Some("k"))).unwrap();
        assert_eq!(client.model, "gpt-4o");
        assert!(client.base_url.contains("openai"));
    }

    #[tokio::test]
    async fn test_ocr_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("x7Kq")))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config("openai/gpt-4o", Some("test-key"));
        cfg.base_url = Some(format!("{}/v1", server.uri()));
        let client = VisionOcrClient::new(&cfg).unwrap();

        assert_eq!(client.ocr(&[1, 2, 3]).await.unwrap(), "x7Kq");
    }

    #[tokio::test]
    async fn test_ocr_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ab12")))
            .mount(&server)
            .await;

        let mut cfg = config("openai", Some("test-key"));
        cfg.base_url = Some(server.uri());
        let client = VisionOcrClient::new(&cfg).unwrap();

        assert_eq!(client.ocr(&[1]).await.unwrap(), "ab12");
    }

    #[tokio::test]
    async fn test_ocr_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config("openai", Some("wrong"));
        cfg.base_url = Some(server.uri());
        let client = VisionOcrClient::new(&cfg).unwrap();

        let err = client.ocr(&[1]).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
