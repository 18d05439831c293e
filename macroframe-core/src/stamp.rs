//! Update stamps as written to the stores' `update_dt` fields:
//! `YYYY-MM-DD HH:MM:SS ffffff` (microseconds after a space).

use chrono::{Local, NaiveDateTime, Timelike};
use thiserror::Error;

const SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StampError {
    #[error("stamp '{0}' has no microsecond field")]
    MissingMicros(String),

    #[error("stamp '{stamp}' has an invalid microsecond field '{micros}'")]
    InvalidMicros { stamp: String, micros: String },

    #[error("stamp '{stamp}': {source}")]
    InvalidDateTime {
        stamp: String,
        source: chrono::ParseError,
    },
}

pub fn format_stamp(at: NaiveDateTime) -> String {
    format!("{} {:06}", at.format(SECONDS_FORMAT), at.nanosecond() / 1_000 % 1_000_000)
}

pub fn parse_stamp(stamp: &str) -> Result<NaiveDateTime, StampError> {
    let trimmed = stamp.trim();
    let (seconds, micros) = trimmed
        .rsplit_once(' ')
        .ok_or_else(|| StampError::MissingMicros(stamp.to_string()))?;

    let invalid_micros = || StampError::InvalidMicros {
        stamp: stamp.to_string(),
        micros: micros.to_string(),
    };
    if micros.len() != 6 || !micros.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_micros());
    }
    let micros: u32 = micros.parse().map_err(|_| invalid_micros())?;

    let at = NaiveDateTime::parse_from_str(seconds, SECONDS_FORMAT).map_err(|source| {
        StampError::InvalidDateTime {
            stamp: stamp.to_string(),
            source,
        }
    })?;
    at.with_nanosecond(micros * 1_000).ok_or_else(invalid_micros)
}

/// Stamp for the current local time.
pub fn now_stamp() -> String {
    format_stamp(Local::now().naive_local())
}
