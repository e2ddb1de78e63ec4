use tracing::{info, warn};

use crate::config::{ApplicantProfile, BookingConfig};
use crate::models::{CaptchaChallenge, ReservationSlot};
use crate::portal::ReservationRequest;

use super::outcome::{AbortReason, BookingOutcome, ReservationResult, TerminalState};
use super::{BookingPortal, CaptchaRecognizer};

enum State {
    FetchChallenge,
    Recognize(CaptchaChallenge),
    Submit(String),
    Done,
    Abort(AbortReason),
}

pub struct BookingController<'a, P, R> {
    portal: &'a P,
    recognizer: &'a R,
    profile: &'a ApplicantProfile,
    max_attempts: u32,
}

impl<'a, P, R> BookingController<'a, P, R>
where
    P: BookingPortal,
    R: CaptchaRecognizer,
{
    pub fn new(
        portal: &'a P,
        recognizer: &'a R,
        profile: &'a ApplicantProfile,
        config: &BookingConfig,
    ) -> Self {
        Self {
            portal,
            recognizer,
            profile,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Runs the booking until it is accepted or a terminal condition is hit.
    ///
    /// Only a wrong-captcha rejection loops, and each loop fetches a new
    /// challenge. Every other failure stops the run.
    pub async fn run(&self, slot: &ReservationSlot) -> BookingOutcome {
        let mut rejected_attempts = 0u32;
        let mut captchas_fetched = 0u32;
        let mut submissions = 0u32;
        let mut state = State::FetchChallenge;

        loop {
            state = match state {
                State::FetchChallenge => {
                    match self.portal.fetch_captcha(&slot.room_id).await {
                        Ok(challenge) => {
                            captchas_fetched += 1;
                            State::Recognize(challenge)
                        }
                        Err(e) => {
                            warn!(
                                room_id = %slot.room_id,
                                transport = e.is_transport(),
                                error = %e,
                                "Failed to fetch captcha"
                            );
                            State::Abort(AbortReason::CaptchaUnavailable(e.to_string()))
                        }
                    }
                }
                State::Recognize(challenge) => {
                    let answer = self.recognizer.recognize(&challenge.image).await;
                    if answer.is_empty() {
                        warn!(room_id = %challenge.room_id, "Captcha recognition produced no text");
                        State::Abort(AbortReason::RecognitionFailed)
                    } else {
                        info!(answer = %answer, "Captcha recognised");
                        State::Submit(answer)
                    }
                }
                State::Submit(answer) => {
                    let request = ReservationRequest::new(self.profile, slot, &answer);
                    submissions += 1;

                    match self.portal.submit(&request).await {
                        ReservationResult::Success => {
                            info!(room_id = %slot.room_id, date = %slot.apply_date, "Reservation accepted");
                            State::Done
                        }
                        ReservationResult::CaptchaRejected => {
                            rejected_attempts += 1;
                            warn!(
                                attempt = rejected_attempts,
                                max_attempts = self.max_attempts,
                                "Captcha rejected"
                            );
                            if rejected_attempts < self.max_attempts {
                                State::FetchChallenge
                            } else {
                                State::Abort(AbortReason::AttemptsExhausted {
                                    attempts: rejected_attempts,
                                })
                            }
                        }
                        ReservationResult::OtherFailure { code, message } => {
                            warn!(code = ?code, message = %message, "Reservation rejected");
                            State::Abort(AbortReason::Rejected { code, message })
                        }
                        ReservationResult::TransportError(e) => {
                            warn!(error = %e, "Reservation request failed");
                            State::Abort(AbortReason::Transport(e))
                        }
                    }
                }
                State::Done => {
                    return BookingOutcome {
                        state: TerminalState::Done,
                        rejected_attempts,
                        captchas_fetched,
                        submissions,
                    };
                }
                State::Abort(reason) => {
                    return BookingOutcome {
                        state: TerminalState::Aborted(reason),
                        rejected_attempts,
                        captchas_fetched,
                        submissions,
                    };
                }
            };
        }
    }
}
