/// Types for scraped timetable data
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// An enrollment count scraped from the results table.
///
/// The timetable renders unfilled counts as dashes or blanks, so a count is
/// either a known number or explicitly unknown. Seat comparisons require both
/// sides to be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeatCount {
    Known(u32),
    Unknown,
}

impl SeatCount {
    /// Parses a raw cell value, yielding `Unknown` for anything that is not
    /// a plain non-negative integer.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(n) => SeatCount::Known(n),
            Err(_) => SeatCount::Unknown,
        }
    }

    /// Returns the count if it is known.
    pub fn known(self) -> Option<u32> {
        match self {
            SeatCount::Known(n) => Some(n),
            SeatCount::Unknown => None,
        }
    }
}

/// One scheduled section of a course in a term, as scraped from a single
/// results-table row.
///
/// Offerings have no identity across refreshes; the full list is recomputed
/// wholesale on every scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOffering {
    pub term: String,
    pub crn: String,
    pub subject: String,
    pub number: String,
    pub section: String,
    pub title: String,
    pub crosslist: String,
    pub period_code: String,
    pub period: String,
    pub room: String,
    pub building: String,
    pub instructor: String,
    pub world_culture: String,
    pub distrib: String,
    pub lang_req: String,
    pub limit: SeatCount,
    pub enrolled: SeatCount,
    pub status: String,
}

impl CourseOffering {
    /// Returns true if the section currently has at least one open seat.
    ///
    /// Waitlists and instructor overrides exist upstream, so `enrolled` may
    /// legitimately exceed `limit`; only a strict `enrolled < limit` with both
    /// counts known reports an opening.
    pub fn has_open_seat(&self) -> bool {
        match (self.enrolled, self.limit) {
            (SeatCount::Known(enrolled), SeatCount::Known(limit)) => enrolled < limit,
            _ => false,
        }
    }
}

static COURSE_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(\.\d+)?$").unwrap());

/// Normalizes a course number to the timetable's zero-padded form.
///
/// The catalog pads integer course numbers to three digits ("7" becomes
/// "007", "12.5" becomes "012.5"). Values that are not plain numbers are
/// returned trimmed but otherwise untouched.
pub fn normalize_course_number(raw: &str) -> String {
    let raw = raw.trim();
    match COURSE_NUMBER_REGEX.captures(raw) {
        Some(caps) => {
            let integer = &caps[1];
            let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            format!("{:0>3}{}", integer, fraction)
        }
        None => raw.to_string(),
    }
}
