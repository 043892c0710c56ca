//! Date range helpers

use crate::error::{Error, Result};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ISO8601_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[+-]?P(?:(?P<date>(?:\d+(?:[.,]\d+)?Y)?(?:\d+(?:[.,]\d+)?M)?(?:\d+(?:[.,]\d+)?W)?(?:\d+(?:[.,]\d+)?D)?)(?:T(?P<time>(?:\d+(?:[.,]\d+)?H)?(?:\d+(?:[.,]\d+)?M)?(?:\d+(?:[.,]\d+)?S)?))?|\d{4}-?\d{2}-?\d{2}T\d{2}:?\d{2}:?\d{2})$",
    )
    .unwrap()
});

/// Whether `duration` is an ISO 8601 duration such as `P1Y2M3DT4H5M6S`, `PT30M` or `P2W`
pub fn validate_iso8601_duration(duration: &str) -> bool {
    let Some(caps) = ISO8601_DURATION_RE.captures(duration) else {
        return false;
    };

    let Some(date) = caps.name("date") else {
        // alternative `PYYYY-MM-DDThh:mm:ss` form
        return true;
    };

    // `P` and `PT` alone, or a trailing `T`, carry no components
    match caps.name("time") {
        Some(time) => !time.as_str().is_empty(),
        None => !date.as_str().is_empty(),
    }
}

/// A calendar date, or a date with a time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrDateTime {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<NaiveDate> for DateOrDateTime {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<NaiveDateTime> for DateOrDateTime {
    fn from(datetime: NaiveDateTime) -> Self {
        Self::DateTime(datetime)
    }
}

impl FromStr for DateOrDateTime {
    type Err = Error;

    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DDThh:mm:ss[.f]` or `YYYY-MM-DD hh:mm:ss[.f]`
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self::DateTime)
            .ok_or_else(|| Error::invalid_value("date", format!("'{s}' is not a date or datetime")))
    }
}

impl DateOrDateTime {
    fn start_of_range(self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(NaiveTime::MIN),
            Self::DateTime(datetime) => datetime,
        }
    }

    fn end_of_range(self) -> NaiveDateTime {
        match self {
            Self::Date(date) => date.and_time(end_of_day()),
            Self::DateTime(datetime) => datetime,
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

/// Turn a start and optional end into a concrete datetime range
///
/// A missing end means the range covers just the start. Dates without a time
/// cover the whole day: a start date begins at midnight and an end date runs
/// to the last microsecond of the day.
pub fn sanitize_date_range(
    start: impl Into<DateOrDateTime>,
    end: Option<DateOrDateTime>,
) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let start = start.into();
    let end = end.unwrap_or(start);

    let start = start.start_of_range();
    let end = end.end_of_range();

    if start > end {
        return Err(Error::invalid_value(
            "start_date",
            format!("Start date must come before end date: {start} > {end}"),
        ));
    }

    Ok((start, end))
}

/// Step between the boundaries produced by [`chunk_date_range`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::Minutely => "minutely",
            Self::Secondly => "secondly",
        };
        f.write_str(name)
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yearly" => Ok(Self::Yearly),
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "minutely" => Ok(Self::Minutely),
            "secondly" => Ok(Self::Secondly),
            other => Err(Error::invalid_value(
                "frequency",
                format!("unknown frequency '{other}'"),
            )),
        }
    }
}

impl Frequency {
    fn is_calendar(self) -> bool {
        matches!(self, Self::Yearly | Self::Monthly)
    }

    /// `start` advanced by `n` steps; calendar steps clamp to the month end
    fn advance(self, start: NaiveDateTime, n: u32) -> Option<NaiveDateTime> {
        let fixed = |step: TimeDelta| {
            let step = step.checked_mul(i32::try_from(n).ok()?)?;
            start.checked_add_signed(step)
        };

        match self {
            Self::Yearly => start.checked_add_months(Months::new(n.checked_mul(12)?)),
            Self::Monthly => start.checked_add_months(Months::new(n)),
            Self::Weekly => fixed(TimeDelta::weeks(1)),
            Self::Daily => fixed(TimeDelta::days(1)),
            Self::Hourly => fixed(TimeDelta::hours(1)),
            Self::Minutely => fixed(TimeDelta::minutes(1)),
            Self::Secondly => fixed(TimeDelta::seconds(1)),
        }
    }
}

/// Split `[start, end]` into consecutive windows of `frequency`
///
/// Window boundaries step from `start`; the last window is cut short at
/// `end`. Calendar steps landing on a day the month lacks (the 31st of a
/// 30 day month, the 29th of February) are skipped rather than clamped.
/// A zero-length range gives one `(start, start)` window and a range with
/// `start > end` gives none.
pub fn chunk_date_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    frequency: Frequency,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let mut boundaries = Vec::new();

    for n in 0..u32::MAX {
        let Some(boundary) = frequency.advance(start, n) else {
            break;
        };
        if boundary > end {
            break;
        }
        if frequency.is_calendar() && boundary.day() != start.day() {
            continue;
        }
        boundaries.push(boundary);
    }

    if boundaries.last() != Some(&end) || boundaries.len() == 1 {
        boundaries.push(end);
    }

    boundaries
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test_case("P1Y2M3DT4H5M6S" ; "full format")]
    #[test_case("P3D" ; "days only")]
    #[test_case("PT4H" ; "hours only")]
    #[test_case("P2W" ; "weeks")]
    #[test_case("PT30M" ; "minutes")]
    #[test_case("PT0.5S" ; "fractional seconds")]
    #[test_case("P0001-02-03T04:05:06" ; "alternative format")]
    fn test_valid_duration(duration: &str) {
        assert!(validate_iso8601_duration(duration));
    }

    #[test_case("1Y2M3DT4H5M6S" ; "missing p")]
    #[test_case("P1Y2M3D4H5M6S" ; "time without t")]
    #[test_case("This is not a duration" ; "not iso")]
    #[test_case("" ; "empty")]
    #[test_case("P" ; "p only")]
    #[test_case("PT" ; "pt only")]
    #[test_case("P1DT" ; "trailing t")]
    fn test_invalid_duration(duration: &str) {
        assert!(!validate_iso8601_duration(duration));
    }

    #[test]
    fn test_sanitize_start_date_only() {
        let (start, end) = sanitize_date_range(date(2023, 8, 1), None).unwrap();

        assert_eq!(start, dt(2023, 8, 1, 0, 0));
        assert_eq!(end, date(2023, 8, 1).and_hms_micro_opt(23, 59, 59, 999_999).unwrap());
    }

    #[test]
    fn test_sanitize_dates() {
        let (start, end) =
            sanitize_date_range(date(2023, 8, 1), Some(date(2023, 8, 10).into())).unwrap();

        assert_eq!(start, dt(2023, 8, 1, 0, 0));
        assert_eq!(end, date(2023, 8, 10).and_hms_micro_opt(23, 59, 59, 999_999).unwrap());
    }

    #[test]
    fn test_sanitize_equal_dates() {
        let (start, end) =
            sanitize_date_range(date(2023, 8, 1), Some(date(2023, 8, 1).into())).unwrap();

        assert!(start < end);
    }

    #[test]
    fn test_sanitize_start_after_end() {
        let err = sanitize_date_range(date(2023, 8, 10), Some(date(2023, 8, 1).into())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_sanitize_datetimes_unchanged() {
        let start = dt(2023, 8, 1, 12, 0);
        let end = dt(2023, 8, 10, 18, 0);

        assert_eq!(sanitize_date_range(start, Some(end.into())).unwrap(), (start, end));
    }

    #[test]
    fn test_sanitize_mixed() {
        let end = dt(2023, 8, 10, 18, 0);
        let (start, sanitized_end) = sanitize_date_range(date(2023, 8, 1), Some(end.into())).unwrap();

        assert_eq!(start, dt(2023, 8, 1, 0, 0));
        assert_eq!(sanitized_end, end);
    }

    #[test]
    fn test_parse_date_or_datetime() {
        assert_eq!(
            "2023-08-01".parse::<DateOrDateTime>().unwrap(),
            DateOrDateTime::Date(date(2023, 8, 1))
        );
        assert_eq!(
            "2023-08-01T12:30:00".parse::<DateOrDateTime>().unwrap(),
            DateOrDateTime::DateTime(dt(2023, 8, 1, 12, 30))
        );
        assert!("01/08/2023".parse::<DateOrDateTime>().is_err());
    }

    #[test]
    fn test_chunk_yearly() {
        let chunks = chunk_date_range(dt(2010, 5, 5, 0, 0), dt(2012, 12, 26, 0, 0), Frequency::Yearly);

        assert_eq!(
            chunks,
            vec![
                (dt(2010, 5, 5, 0, 0), dt(2011, 5, 5, 0, 0)),
                (dt(2011, 5, 5, 0, 0), dt(2012, 5, 5, 0, 0)),
                (dt(2012, 5, 5, 0, 0), dt(2012, 12, 26, 0, 0)),
            ]
        );
    }

    #[test]
    fn test_chunk_exact_multiple() {
        let chunks = chunk_date_range(dt(2024, 1, 1, 0, 0), dt(2024, 1, 3, 0, 0), Frequency::Daily);

        assert_eq!(
            chunks,
            vec![
                (dt(2024, 1, 1, 0, 0), dt(2024, 1, 2, 0, 0)),
                (dt(2024, 1, 2, 0, 0), dt(2024, 1, 3, 0, 0)),
            ]
        );
    }

    #[test]
    fn test_chunk_monthly_skips_missing_days() {
        let chunks = chunk_date_range(dt(2024, 1, 31, 0, 0), dt(2024, 4, 15, 0, 0), Frequency::Monthly);

        assert_eq!(
            chunks,
            vec![
                (dt(2024, 1, 31, 0, 0), dt(2024, 3, 31, 0, 0)),
                (dt(2024, 3, 31, 0, 0), dt(2024, 4, 15, 0, 0)),
            ]
        );
    }

    #[test]
    fn test_chunk_hourly_partial() {
        let chunks = chunk_date_range(dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 1, 30), Frequency::Hourly);

        assert_eq!(
            chunks,
            vec![
                (dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 1, 0)),
                (dt(2024, 1, 1, 1, 0), dt(2024, 1, 1, 1, 30)),
            ]
        );
    }

    #[test]
    fn test_chunk_zero_length_range() {
        let at = dt(2024, 1, 1, 0, 0);
        assert_eq!(chunk_date_range(at, at, Frequency::Daily), vec![(at, at)]);
    }

    #[test]
    fn test_chunk_reversed_range() {
        let chunks = chunk_date_range(dt(2024, 2, 1, 0, 0), dt(2024, 1, 1, 0, 0), Frequency::Daily);
        assert!(chunks.is_empty());
    }

    #[test_case("yearly", Frequency::Yearly)]
    #[test_case("MONTHLY", Frequency::Monthly)]
    #[test_case("daily", Frequency::Daily)]
    fn test_frequency_from_str(input: &str, expected: Frequency) {
        assert_eq!(input.parse::<Frequency>().unwrap(), expected);
    }
}
