//! Auction date extraction.

use crate::types::AuctionDate;
use chrono::{Datelike, NaiveDate};
use regex::Regex;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Find "Auction <weekday> <day> <month>[ at <time>]" in `text`.
///
/// The date resolves against `today`: the current year, or next year when
/// that date has already passed. When the month name does not resolve the
/// readable form is kept instead.
pub fn parse_auction(text: &str, today: NaiveDate) -> Option<AuctionDate> {
    let re = Regex::new(r"(?i)Auction\s+(\w+)\s+(\d+)\s+(\w+)(?:\s+at\s+(\d+:\d+\s*(?:am|pm)))?")
        .expect("auction regex is valid");
    let caps = re.captures(text)?;

    let weekday = &caps[1];
    let day = &caps[2];
    let month = &caps[3];
    let readable = match caps.get(4) {
        Some(time) => format!("{weekday} {day} {month} at {}", time.as_str()),
        None => format!("{weekday} {day} {month}"),
    };

    match resolve_date(day, month, today) {
        Some(date) => Some(AuctionDate::Date(date)),
        None => Some(AuctionDate::Text(readable)),
    }
}

fn resolve_date(day: &str, month: &str, today: NaiveDate) -> Option<NaiveDate> {
    let month = month.to_lowercase();
    let index = MONTHS.iter().position(|m| month.starts_with(m))?;
    let day: u32 = day.parse().ok()?;
    let month = index as u32 + 1;

    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_upcoming_this_year() {
        let got = parse_auction("Auction Saturday 14 March", date(2026, 1, 10));
        assert_eq!(got, Some(AuctionDate::Date(date(2026, 3, 14))));
    }

    #[test]
    fn test_past_rolls_to_next_year() {
        let got = parse_auction("Auction Saturday 14 March at 11:00 am", date(2026, 10, 19));
        assert_eq!(got, Some(AuctionDate::Date(date(2027, 3, 14))));
    }

    #[test]
    fn test_today_is_not_past() {
        let got = parse_auction("auction sat 19 oct", date(2026, 10, 19));
        assert_eq!(got, Some(AuctionDate::Date(date(2026, 10, 19))));
    }

    #[test]
    fn test_resolves_today_or_later() {
        let today = chrono::Utc::now().date_naive();
        match parse_auction("Auction Saturday 14 March", today) {
            Some(AuctionDate::Date(d)) => {
                assert!(d >= today);
                assert!(d.year() == today.year() || d.year() == today.year() + 1);
            }
            other => panic!("expected a date, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_month_keeps_text() {
        let got = parse_auction("Auction Saturday 14 Smarch at 2:30pm", date(2026, 1, 1));
        assert_eq!(
            got,
            Some(AuctionDate::Text("Saturday 14 Smarch at 2:30pm".to_string()))
        );
    }

    #[test]
    fn test_no_auction() {
        assert_eq!(parse_auction("Private sale", date(2026, 1, 1)), None);
    }
}
