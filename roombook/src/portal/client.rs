use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::PortalConfig;
use crate::error::{Result, RoombookError};
use crate::models::CaptchaChallenge;

use super::dto::{
    CaptchaResponse, LoginForm, LoginResponse, ReservationQuery, ReservationRequest,
    ReservationResponse, API_OK, LOGIN_OK,
};

pub const TOKEN_HEADER: &str = "X-Id-Token";

/// HTTP client for the login and reservation endpoints.
///
/// Every request carries the portal's fixed `User-Agent`; authenticated
/// requests add the token under `X-Id-Token`.
#[derive(Clone, Debug)]
pub struct PortalClient {
    client: Client,
    config: PortalConfig,
}

impl PortalClient {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RoombookError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Logs in with username/password and returns the issued id token.
    ///
    /// A 4xx reply is a rejected login, not a transport problem: its body is
    /// read for the portal's message. Only 5xx surfaces as `Transport`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let form = LoginForm::new(username, password);
        let response = self
            .client
            .post(&self.config.login_url)
            .form(&form)
            .send()
            .await?;

        let response = if response.status().is_server_error() {
            response.error_for_status()?
        } else {
            response
        };
        let status = response.status();
        let body = response.text().await?;

        let response: LoginResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                RoombookError::AuthFailure(format!("malformed login response: {e}"))
            } else {
                RoombookError::AuthFailure(format!("login rejected with HTTP {status}"))
            }
        })?;

        if response.code != LOGIN_OK {
            return Err(RoombookError::AuthFailure(
                response
                    .message
                    .unwrap_or_else(|| "未知错误".to_string()),
            ));
        }
        if !status.is_success() {
            return Err(RoombookError::AuthFailure(format!(
                "login rejected with HTTP {status}"
            )));
        }

        response
            .data
            .and_then(|data| data.id_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RoombookError::AuthFailure("login response has no idToken".to_string()))
    }

    /// Lists the project's reservations for a date. The body is returned as-is.
    pub async fn query_reservations(&self, token: &str, date: &str) -> Result<String> {
        let query = ReservationQuery {
            project_id: &self.config.project_id,
            date,
        };

        let body = self
            .client
            .get(self.config.query_url())
            .header(TOKEN_HEADER, token)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(body)
    }

    /// Requests a fresh captcha for `room_id`.
    ///
    /// A non-200 application code surfaces as `UpstreamRejection`; a body that
    /// does not match the expected shape as `DecodeFailure`.
    pub async fn fetch_captcha(&self, token: &str, room_id: &str) -> Result<CaptchaChallenge> {
        let body = self
            .client
            .get(self.config.captcha_url(room_id))
            .header(TOKEN_HEADER, token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: CaptchaResponse = decode_body(&body, "captcha")?;
        if response.code != API_OK {
            return Err(RoombookError::UpstreamRejection {
                code: response.code,
                message: response.message().to_string(),
            });
        }

        let image = response
            .data
            .filter(|data| !data.trim().is_empty())
            .ok_or_else(|| RoombookError::DecodeFailure("captcha payload is empty".to_string()))?;

        Ok(CaptchaChallenge {
            room_id: room_id.to_string(),
            image,
        })
    }

    /// Posts a reservation. The response is decoded regardless of HTTP status
    /// because the portal reports rejections in the JSON `code` field.
    pub async fn submit_reservation(
        &self,
        token: &str,
        request: &ReservationRequest,
    ) -> Result<ReservationResponse> {
        let body = self
            .client
            .post(self.config.reservation_url())
            .header(TOKEN_HEADER, token)
            .json(request)
            .send()
            .await?
            .text()
            .await?;

        debug!(body = %body, "Reservation response");
        decode_body(&body, "reservation")
    }
}

fn decode_body<T: DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        RoombookError::DecodeFailure(format!("unexpected {endpoint} response: {e}"))
    })
}
