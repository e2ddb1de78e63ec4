use async_trait::async_trait;
use tracing::{info, warn};

use crate::booking::{BookingPortal, ReservationResult};
use crate::config::Credentials;
use crate::error::{Result, RoombookError};
use crate::models::CaptchaChallenge;
use crate::portal::{PortalClient, ReservationRequest};
use crate::token_store::TokenStore;

/// An authenticated portal client. The token is fixed for the whole run.
#[derive(Clone, Debug)]
pub struct Session {
    client: PortalClient,
    token: String,
}

impl Session {
    pub fn new(client: PortalClient, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }

    /// Reuses the cached token when there is one, otherwise logs in and
    /// writes the new token back to `store`.
    ///
    /// The token from the environment wins; the store is read when the
    /// process environment had none, e.g. an empty `TOKEN` exported by the shell.
    pub async fn establish(
        client: PortalClient,
        credentials: &Credentials,
        store: &TokenStore,
    ) -> Result<Self> {
        if let Some(token) = credentials.token.as_deref().filter(|t| !t.is_empty()) {
            info!("Using cached token");
            return Ok(Self::new(client, token));
        }

        match store.token() {
            Ok(Some(token)) => {
                info!(path = %store.path().display(), "Using token from env file");
                return Ok(Self::new(client, token));
            }
            Ok(None) => {}
            Err(e) => warn!(path = %store.path().display(), error = %e, "Failed to read env file"),
        }

        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(RoombookError::Config(
                "no cached token and no username/password to log in with".to_string(),
            ));
        }

        let token = client
            .login(&credentials.username, &credentials.password)
            .await?;
        info!(username = %credentials.username, "Login succeeded");

        // Booking can proceed without the cache; the next run just logs in again.
        if let Err(e) = store.save_token(&token) {
            warn!(path = %store.path().display(), error = %e, "Failed to persist token");
        }

        Ok(Self::new(client, token))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn query_reservations(&self, date: &str) -> Result<String> {
        self.client.query_reservations(&self.token, date).await
    }
}

#[async_trait]
impl BookingPortal for Session {
    async fn fetch_captcha(&self, room_id: &str) -> Result<CaptchaChallenge> {
        self.client.fetch_captcha(&self.token, room_id).await
    }

    async fn submit(&self, request: &ReservationRequest) -> ReservationResult {
        ReservationResult::from_response(
            self.client.submit_reservation(&self.token, request).await,
        )
    }
}
