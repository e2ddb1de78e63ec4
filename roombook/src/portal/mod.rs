//! Reservation portal HTTP surface.
//!
//! `PortalClient` wraps the four endpoints the booking flow uses (login,
//! reservation listing, captcha, submission) with typed request/response
//! records from [`dto`].

mod client;
pub mod dto;

pub use client::{PortalClient, TOKEN_HEADER};
pub use dto::{ReservationRequest, ReservationResponse};
