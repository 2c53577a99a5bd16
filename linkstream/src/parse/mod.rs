use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

pub mod csv;
pub mod warc;
pub mod wat;

pub use csv::CsvLinkRecords;
pub use wat::{DedupState, WatLinkRecords};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("io error reading input: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed warc record: {0}")]
    Warc(String),
}

const DT14: &str = "%Y%m%d%H%M%S";

/// Reformat an archive timestamp into the compact 14-digit form when `dt14`
/// is set. Timestamps that cannot be parsed are passed through unchanged, a
/// bad date never aborts its record.
pub fn normalize_timestamp(raw: &str, dt14: bool) -> String {
    if !dt14 {
        return raw.to_string();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DT14).to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format(DT14).to_string();
        }
    }

    raw.to_string()
}
