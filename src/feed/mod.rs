use chrono::NaiveDateTime;
use thiserror::Error;

pub mod prices;
pub mod stations;

/// Errors raised while fetching or parsing a feed. All of them abort the
/// current refresh iteration; none of them terminate the refresh loop.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport-level failure reaching a feed endpoint.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// I/O failure while reading a feed stream.
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    /// A row value failed type conversion.
    #[error("malformed {field}: {value:?}")]
    MalformedField {
        field: &'static str,
        value: String,
    },

    /// A row carried an unexpected number of fields.
    #[error("malformed row: expected {expected} fields, got {got}")]
    MalformedRow {
        expected: &'static str,
        got: usize,
    },
}

pub fn parse_station_id(s: &str) -> Result<i64, FeedError> {
    s.parse().map_err(|_| FeedError::MalformedField {
        field: "station id",
        value: s.to_owned(),
    })
}

/// Boolean tokens as the price feed emits them, both numeric and textual.
pub fn parse_bool_token(s: &str) -> Result<bool, FeedError> {
    match s {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        _ => Err(FeedError::MalformedField {
            field: "self service flag",
            value: s.to_owned(),
        }),
    }
}

/// Observation timestamps are day-first without leading zeros,
/// e.g. `5/3/2024 8:00:00`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, FeedError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|_| FeedError::MalformedField {
        field: "timestamp",
        value: s.to_owned(),
    })
}
