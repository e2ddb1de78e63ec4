//! Captcha → OCR → submission loop.
//!
//! `BookingController` drives a reservation through a bounded number of
//! captcha attempts. It only sees the portal through [`BookingPortal`] and the
//! OCR engine through [`CaptchaRecognizer`].

mod controller;
mod outcome;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CaptchaChallenge;
use crate::portal::ReservationRequest;

pub use controller::BookingController;
pub use outcome::{
    AbortReason, BookingOutcome, ReservationResult, TerminalState, CAPTCHA_REJECTED_MESSAGE,
};

/// Authenticated portal operations the booking loop needs.
#[async_trait]
pub trait BookingPortal: Send + Sync {
    async fn fetch_captcha(&self, room_id: &str) -> Result<CaptchaChallenge>;
    async fn submit(&self, request: &ReservationRequest) -> ReservationResult;
}

/// Turns a base64 captcha into text. An empty string means nothing was read.
#[async_trait]
pub trait CaptchaRecognizer: Send + Sync {
    async fn recognize(&self, captcha_base64: &str) -> String;
}
