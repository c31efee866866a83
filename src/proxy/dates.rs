//! Date normalization for the JTB wire format.
//!
//! The registry wants `dd-mm-yyyy` for list queries and tax records but
//! `dd/mm/yyyy` for asset submissions.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Separator style expected by a given upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `dd-mm-yyyy`
    Dashed,
    /// `dd/mm/yyyy`
    Slashed,
}

impl DateStyle {
    pub fn format(self, date: NaiveDate) -> String {
        match self {
            DateStyle::Dashed => date.format("%d-%m-%Y").to_string(),
            DateStyle::Slashed => date.format("%d/%m/%Y").to_string(),
        }
    }
}

/// Parses the date forms a browser or API client is likely to send.
pub fn parse_flexible(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
