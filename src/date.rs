//! The replay header records when the match was played as text formatted by the recording
//! machine's locale. Three layouts are known:
//!
//! - `DD.MM.YYYY HH:mm`, 24 hour (European)
//! - `M/D/YYYY h:mm XM`, 12 hour and not zero padded (US)
//! - `YYYY.MM.DD <meridiem> h:mm`, where the meridiem is written in Korean

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::sync::OnceLock;

const KOREAN_PM: &str = "오후";

fn euro() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{2}).([0-9]{2}).([0-9]{4})\s([0-9]{2}).([0-9]{2})")
            .expect("valid euro date regex")
    })
}

fn us() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{1,2}).([0-9]{1,2}).([0-9]{4})\s([0-9]{1,2}).([0-9]{1,2}).*?(\w)M")
            .expect("valid us date regex")
    })
}

fn asian() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{4}).([0-9]{2}).([0-9]{2})\s([^\x00-\x7F]+)\s([0-9]?[0-9]).([0-9]{2})")
            .expect("valid asian date regex")
    })
}

fn num(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn to_24_hour(hour: u32, pm: bool) -> u32 {
    match (hour, pm) {
        (12, false) => 0,
        (h, true) if h < 12 => h + 12,
        (h, _) => h,
    }
}

fn build(year: u32, month: u32, day: u32, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?.and_hms_opt(hour, minute, 0)
}

fn decode_euro(s: &str) -> Option<NaiveDateTime> {
    let caps = euro().captures(s)?;
    build(
        num(&caps, 3)?,
        num(&caps, 2)?,
        num(&caps, 1)?,
        num(&caps, 4)?,
        num(&caps, 5)?,
    )
}

fn decode_us(s: &str) -> Option<NaiveDateTime> {
    let caps = us().captures(s)?;
    let pm = caps.get(6)?.as_str().eq_ignore_ascii_case("p");
    build(
        num(&caps, 3)?,
        num(&caps, 1)?,
        num(&caps, 2)?,
        to_24_hour(num(&caps, 4)?, pm),
        num(&caps, 5)?,
    )
}

fn decode_asian(s: &str) -> Option<NaiveDateTime> {
    let caps = asian().captures(s)?;
    let pm = caps.get(4)?.as_str() == KOREAN_PM;
    build(
        num(&caps, 1)?,
        num(&caps, 2)?,
        num(&caps, 3)?,
        to_24_hour(num(&caps, 5)?, pm),
        num(&caps, 6)?,
    )
}

/// Decodes the locale specific timestamp of a replay header. The layouts are tried in turn, and a
/// layout that matches but describes an impossible date falls through to the next one.
pub fn decode_date(s: &str) -> Option<NaiveDateTime> {
    let res = decode_euro(s)
        .or_else(|| decode_us(s))
        .or_else(|| decode_asian(s));

    if res.is_none() {
        tracing::debug!(date = s, "unrecognized date format");
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn euro_date() {
        assert_eq!(decode_date("24.12.2007 18:30"), Some(dt(2007, 12, 24, 18, 30)));
        assert_eq!(decode_date("03-01-2008 09:05"), Some(dt(2008, 1, 3, 9, 5)));
    }

    #[test]
    fn us_date() {
        assert_eq!(decode_date("1/5/2007 6:30 PM"), Some(dt(2007, 1, 5, 18, 30)));
        assert_eq!(decode_date("11/25/2007 9:07 AM"), Some(dt(2007, 11, 25, 9, 7)));
        assert_eq!(decode_date("11/25/2007 12:07 AM"), Some(dt(2007, 11, 25, 0, 7)));
        assert_eq!(decode_date("11/25/2007 12:07 PM"), Some(dt(2007, 11, 25, 12, 7)));
    }

    #[test]
    fn zero_padded_us_date_falls_through_euro() {
        // Looks european until the month comes out as 24
        assert_eq!(decode_date("12/24/2007 06:30 PM"), Some(dt(2007, 12, 24, 18, 30)));
    }

    #[test]
    fn korean_date() {
        assert_eq!(
            decode_date("2008.02.13 오후 8:15"),
            Some(dt(2008, 2, 13, 20, 15))
        );
        assert_eq!(
            decode_date("2008.02.13 오전 8:15"),
            Some(dt(2008, 2, 13, 8, 15))
        );
    }

    #[test]
    fn unknown_date() {
        assert_eq!(decode_date(""), None);
        assert_eq!(decode_date("yesterday"), None);
        assert_eq!(decode_date("31.02.2007 10:00"), None);
    }
}
