//! Relevance triggers and pass date handling.
//!
//! These properties are never accepted through overrides; they are set only
//! through the dedicated [`crate::Project`] setters and applied here.

use super::schema;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::warn;

/// Wallet shows at most this many beacons and locations.
pub const MAX_RELEVANCE_ENTRIES: usize = 10;

/// One relevance trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Relevance {
    /// Beacon records (`proximityUUID`, optional `major`/`minor`).
    Beacons(Vec<Value>),
    /// Location records (`latitude`, `longitude`, optional `altitude`).
    Locations(Vec<Value>),
    /// Maximum distance in meters from a location at which the pass is relevant.
    MaxDistance(u64),
    /// Date at which the pass becomes relevant.
    RelevantDate(String),
}

impl Relevance {
    /// Property name in `pass.json`.
    pub fn key(&self) -> &'static str {
        match self {
            Relevance::Beacons(_) => "beacons",
            Relevance::Locations(_) => "locations",
            Relevance::MaxDistance(_) => "maxDistance",
            Relevance::RelevantDate(_) => "relevantDate",
        }
    }

    /// Write this trigger into the descriptor root.
    ///
    /// Invalid beacon and location records are dropped and the remainder is
    /// capped at [`MAX_RELEVANCE_ENTRIES`]. If nothing valid remains, or the
    /// date cannot be parsed, the descriptor is left untouched.
    pub fn apply(&self, root: &mut Map<String, Value>) {
        let value = match self {
            Relevance::Beacons(items) => valid_records(self.key(), items, schema::is_valid_beacon),
            Relevance::Locations(items) => valid_records(self.key(), items, schema::is_valid_location),
            Relevance::MaxDistance(meters) => Some(Value::from(*meters)),
            Relevance::RelevantDate(date) => {
                let formatted = format_pass_date(date);
                if formatted.is_none() {
                    warn!(date = %date, "Ignoring unparseable relevantDate");
                }
                formatted.map(Value::String)
            }
        };

        if let Some(value) = value {
            root.insert(self.key().to_string(), value);
        }
    }
}

fn valid_records(key: &str, items: &[Value], check: fn(&Value) -> bool) -> Option<Value> {
    let valid: Vec<Value> = items.iter().filter(|item| check(item)).cloned().collect();
    if valid.len() < items.len() {
        warn!(property = key, dropped = items.len() - valid.len(), "Dropped invalid relevance records");
    }
    if valid.len() > MAX_RELEVANCE_ENTRIES {
        warn!(property = key, kept = MAX_RELEVANCE_ENTRIES, "Too many relevance records");
    }
    if valid.is_empty() {
        return None;
    }
    Some(Value::Array(valid.into_iter().take(MAX_RELEVANCE_ENTRIES).collect()))
}

/// Parse a caller-supplied date.
///
/// Accepts RFC 3339 (`2030-01-01T10:00:00+02:00`), a UTC date-time without
/// offset (`2030-01-01T10:00:00`) and a bare date (`2030-01-01`, midnight UTC).
pub fn parse_pass_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().fixed_offset());
    }
    None
}

/// W3C date string used by `pass.json`: `YYYY-MM-DDTHH:MM:SS+HH:MM`.
pub fn to_w3c(date: &DateTime<FixedOffset>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Parse and re-format a date, or `None` if it cannot be parsed.
pub fn format_pass_date(input: &str) -> Option<String> {
    parse_pass_date(input).map(|dt| to_w3c(&dt))
}
