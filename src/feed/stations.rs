use std::{collections::HashMap, io::BufRead, str::FromStr};

use tracing::warn;

use crate::feed::{FeedError, parse_station_id};

/// Kind of site a station operates as. The registry is free to introduce
/// new values without notice, so unknown strings are carried through
/// unchanged rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationType {
    Roadside,
    Motorway,
    Other(String),
}

impl From<&str> for StationType {
    fn from(s: &str) -> Self {
        match s {
            "roadside" => StationType::Roadside,
            "motorway" => StationType::Motorway,
            other => StationType::Other(other.to_owned()),
        }
    }
}

impl StationType {
    pub fn as_str(&self) -> &str {
        match self {
            StationType::Roadside => "roadside",
            StationType::Motorway => "motorway",
            StationType::Other(s) => s,
        }
    }
}

/// Registry entry for a fuel station. Latitude and longitude are opaque
/// strings; nothing downstream does arithmetic on them.
#[allow(unused)]
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: i64,
    pub operator: String,
    pub brand: String,
    pub station_type: StationType,
    pub name: String,
    pub address: String,
    pub municipality: String,
    pub province: String,
    pub lat: String,
    pub lon: String,
}

impl FromStr for Station {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Rows are split on the raw delimiter. The feed contains
        // unterminated quote characters, so a quote-aware reader chokes on
        // rows that this split salvages.
        let fields: Vec<&str> = s.split(';').collect();
        let extra = match fields.len() {
            10 => 0,
            // Known upstream defect: the address field arrives duplicated.
            // Keep the first copy, drop the duplicate.
            11 => 1,
            got => {
                return Err(FeedError::MalformedRow {
                    expected: "10 or 11",
                    got,
                });
            }
        };

        Ok(Station {
            id: parse_station_id(fields[0])?,
            operator: fields[1].to_owned(),
            brand: fields[2].to_owned(),
            station_type: StationType::from(fields[3]),
            name: fields[4].to_owned(),
            address: fields[5].to_owned(),
            municipality: fields[6 + extra].to_owned(),
            province: fields[7 + extra].to_owned(),
            lat: fields[8 + extra].to_owned(),
            lon: fields[9 + extra].to_owned(),
        })
    }
}

/// Parse the station registry into a map keyed by station id.
///
/// The feed is structurally unreliable: a single header line, rows of 10 or
/// 11 fields, blank lines, duplicated ids. Blank lines are skipped with a
/// warning and a duplicated id keeps the later row. A row with any other
/// field count, or an id that does not parse, aborts the whole table build.
pub fn parse_stations<R: BufRead>(reader: R) -> Result<HashMap<i64, Station>, FeedError> {
    let mut stations = HashMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 {
            // header
            continue;
        }
        if line.is_empty() {
            warn!("skipping empty station row");
            continue;
        }

        let station: Station = line.parse()?;
        if let Some(previous) = stations.insert(station.id, station) {
            warn!(
                "duplicate station id {}, keeping the later row",
                previous.id
            );
        }
    }

    Ok(stations)
}
