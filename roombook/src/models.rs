use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoombookError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// A single room booking window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSlot {
    pub room_id: String,
    pub apply_date: String,
    pub begin_time: String,
    pub end_time: String,
}

impl ReservationSlot {
    /// Builds a slot after checking the date/time formats the portal expects.
    pub fn new(
        room_id: impl Into<String>,
        apply_date: impl Into<String>,
        begin_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Result<Self> {
        let slot = Self {
            room_id: room_id.into().trim().to_string(),
            apply_date: apply_date.into().trim().to_string(),
            begin_time: begin_time.into().trim().to_string(),
            end_time: end_time.into().trim().to_string(),
        };

        if slot.room_id.is_empty() {
            return Err(RoombookError::Validation("room id cannot be empty".to_string()));
        }

        NaiveDate::parse_from_str(&slot.apply_date, DATE_FORMAT).map_err(|e| {
            RoombookError::Validation(format!("invalid date '{}': {e}", slot.apply_date))
        })?;

        let begin = parse_time(&slot.begin_time)?;
        let end = parse_time(&slot.end_time)?;
        if begin >= end {
            return Err(RoombookError::Validation(format!(
                "begin time {} must be before end time {}",
                slot.begin_time, slot.end_time
            )));
        }

        Ok(slot)
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| RoombookError::Validation(format!("invalid time '{value}': {e}")))
}

/// A captcha issued for one room. Consumed by exactly one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub room_id: String,
    /// Base64 image, possibly carrying a `data:image/...;base64,` prefix.
    pub image: String,
}
