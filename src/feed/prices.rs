use std::{io::BufRead, str::FromStr};

use chrono::NaiveDateTime;

use crate::{
    cache::RecordCache,
    feed::{FeedError, parse_bool_token, parse_station_id, parse_timestamp},
};

/// One observed price for a fuel type at a station.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub station_id: i64,
    pub fuel_type: String,
    pub price: f64,
    pub self_service: bool,
    pub observed_at: NaiveDateTime,
}

impl PriceRecord {
    /// Cache key shared by every observation a station reported at the same
    /// instant.
    pub fn cache_key(&self) -> String {
        format!(
            "{}-{}",
            self.station_id,
            self.observed_at.and_utc().timestamp()
        )
    }
}

impl FromStr for PriceRecord {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(';').collect();
        if fields.len() != 5 {
            return Err(FeedError::MalformedRow {
                expected: "5",
                got: fields.len(),
            });
        }

        let station_id = parse_station_id(fields[0])?;
        let fuel_type = fields[1].to_owned();
        let price: f64 = fields[2].parse().map_err(|_| FeedError::MalformedField {
            field: "price",
            value: fields[2].to_owned(),
        })?;
        let self_service = parse_bool_token(fields[3])?;
        let observed_at = parse_timestamp(fields[4])?;

        Ok(Self {
            station_id,
            fuel_type,
            price,
            self_service,
            observed_at,
        })
    }
}

/// Parse the price feed. The feed opens with two lines of non-CSV header
/// which are discarded unread; every row after that must carry exactly five
/// fields, and any row that fails to parse fails the whole batch.
///
/// Each record is written to `cache` as soon as it parses, before the next
/// row is read. The cache therefore holds everything that parsed even when
/// a later row aborts the batch.
pub fn parse_prices<R: BufRead>(
    reader: R,
    cache: &RecordCache,
) -> Result<Vec<PriceRecord>, FeedError> {
    let mut lines = reader.lines();
    for _ in 0..2 {
        match lines.next() {
            Some(line) => {
                line?;
            }
            None => {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
        }
    }

    let mut records = Vec::new();
    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let record: PriceRecord = line.parse()?;
        cache.put(&record.cache_key(), record.clone());
        records.push(record);
    }

    Ok(records)
}
