// libs/scheduling-cell/src/services/timeslot.rs
//! Normalization of booking-form time labels to minutes since midnight.

use chrono::{NaiveTime, Timelike};

/// Closed mapping of the booking form's slot labels to start times.
/// Anything outside this table is handed back as `Raw` so the caller
/// decides policy instead of silently trusting a string.
const SLOT_LABELS: &[(&str, i32)] = &[
    ("7:00 AM", 7 * 60),
    ("8:00 AM", 8 * 60),
    ("9:00 AM", 9 * 60),
    ("10:00 AM", 10 * 60),
    ("11:00 AM", 11 * 60),
    ("12:00 PM", 12 * 60),
    ("1:00 PM", 13 * 60),
    ("2:00 PM", 14 * 60),
    ("3:00 PM", 15 * 60),
    ("4:00 PM", 16 * 60),
    ("5:00 PM", 17 * 60),
];

/// Outcome of normalizing a requested time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTime {
    /// Label found in the slot table.
    Known(i32),
    /// Unrecognized label, passed through for the caller to interpret.
    Raw(String),
}

impl ParsedTime {
    /// Resolve to minutes since midnight. `Raw` values get one lenient
    /// attempt as a 24-hour `HH:MM` string; anything else is `None` and
    /// the booking must be rejected as malformed.
    pub fn resolve(&self) -> Option<i32> {
        match self {
            ParsedTime::Known(minutes) => Some(*minutes),
            ParsedTime::Raw(text) => NaiveTime::parse_from_str(text.trim(), "%H:%M")
                .ok()
                .map(|t| (t.hour() * 60 + t.minute()) as i32),
        }
    }
}

pub fn parse_time_label(label: &str) -> ParsedTime {
    let trimmed = label.trim();
    for (slot, minutes) in SLOT_LABELS {
        if slot.eq_ignore_ascii_case(trimmed) {
            return ParsedTime::Known(*minutes);
        }
    }
    ParsedTime::Raw(trimmed.to_string())
}

/// Render minutes since midnight as a PostgREST `time` literal.
pub fn minutes_to_time_string(minutes: i32) -> String {
    format!("{:02}:{:02}:00", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_map_to_minutes() {
        assert_eq!(parse_time_label("2:00 PM"), ParsedTime::Known(840));
        assert_eq!(parse_time_label("7:00 AM"), ParsedTime::Known(420));
        assert_eq!(parse_time_label("12:00 PM"), ParsedTime::Known(720));
    }

    #[test]
    fn label_match_ignores_case_and_whitespace() {
        assert_eq!(parse_time_label("  2:00 pm "), ParsedTime::Known(840));
    }

    #[test]
    fn unknown_label_is_raw() {
        assert_eq!(
            parse_time_label("quarter past two"),
            ParsedTime::Raw("quarter past two".to_string())
        );
    }

    #[test]
    fn raw_resolves_24h_times_only() {
        assert_eq!(ParsedTime::Raw("14:30".to_string()).resolve(), Some(870));
        assert_eq!(ParsedTime::Raw("garbage".to_string()).resolve(), None);
    }

    #[test]
    fn time_string_round_trip() {
        assert_eq!(minutes_to_time_string(840), "14:00:00");
        assert_eq!(minutes_to_time_string(630), "10:30:00");
    }
}
