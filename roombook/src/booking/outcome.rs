use std::fmt;

use crate::error::{Result, RoombookError};
use crate::portal::ReservationResponse;

/// Message the portal sends with `code: 400` when the captcha answer is wrong.
/// Only this exact text is retried; any other 400 is terminal.
pub const CAPTCHA_REJECTED_MESSAGE: &str = "验证码错误";

/// Outcome of a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationResult {
    Success,
    CaptchaRejected,
    OtherFailure { code: Option<i64>, message: String },
    TransportError(String),
}

impl ReservationResult {
    pub fn classify(response: &ReservationResponse) -> Self {
        match response.code {
            200 => ReservationResult::Success,
            400 if response.msg.as_deref() == Some(CAPTCHA_REJECTED_MESSAGE) => {
                ReservationResult::CaptchaRejected
            }
            code => ReservationResult::OtherFailure {
                code: Some(code),
                message: response.message().to_string(),
            },
        }
    }

    pub fn from_response(result: Result<ReservationResponse>) -> Self {
        match result {
            Ok(response) => Self::classify(&response),
            Err(RoombookError::Transport(e)) => ReservationResult::TransportError(e.to_string()),
            Err(e) => ReservationResult::OtherFailure {
                code: None,
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    CaptchaUnavailable(String),
    RecognitionFailed,
    AttemptsExhausted { attempts: u32 },
    Rejected { code: Option<i64>, message: String },
    Transport(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::CaptchaUnavailable(reason) => {
                write!(f, "no captcha available: {reason}")
            }
            AbortReason::RecognitionFailed => write!(f, "captcha could not be recognised"),
            AbortReason::AttemptsExhausted { attempts } => {
                write!(f, "captcha rejected {attempts} times, giving up")
            }
            AbortReason::Rejected {
                code: Some(code),
                message,
            } => write!(f, "reservation rejected (code {code}): {message}"),
            AbortReason::Rejected { code: None, message } => {
                write!(f, "reservation failed: {message}")
            }
            AbortReason::Transport(e) => write!(f, "reservation request failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    Done,
    Aborted(AbortReason),
}

/// Final report of a booking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingOutcome {
    pub state: TerminalState,
    /// Submissions rejected for a wrong captcha.
    pub rejected_attempts: u32,
    pub captchas_fetched: u32,
    pub submissions: u32,
}

impl BookingOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.state, TerminalState::Done)
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match &self.state {
            TerminalState::Done => None,
            TerminalState::Aborted(reason) => Some(reason),
        }
    }
}
