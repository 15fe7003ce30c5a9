//! Heuristic normalization of helpdesk export timestamps.
//!
//! Upstream exports mix ISO strings, loose "Oct 14, 2025, 03:14 AM" phrases,
//! slash dates in either order and assorted noise ("Updated", "from IP ...",
//! ordinals, `GMT+1100` annotations). Everything funnels through
//! [`parse_timestamp`]; the storage and display entry points only differ in
//! what they return when every strategy fails.

use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constants::{
    month_from_name, DAY_KEY_FORMAT, MAX_YEARS_AHEAD, MIN_PLAUSIBLE_YEAR,
    STORAGE_TIMESTAMP_FORMAT,
};

const MONTH_PATTERN: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

static ISO_UTC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?Z$").expect("valid ISO UTC regex")
});

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid ordinal regex"));

static FROM_IP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfrom\s+ip\b[\s:]*[0-9a-f.:]*").expect("valid provenance regex")
});

static LABEL_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:updated|created)\b:?").expect("valid label regex"));

static GMT_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\bGMT\s*[+-]\d{2}:?\d{2}\b.*$").expect("valid GMT offset regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static MONTH_NAME_WITH_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTH_PATTERN})\.?\s+(\d{{1,2}}),?(?:\s+(\d{{4}}))?,?\s+(?:at\s+)?(\d{{1,2}}):(\d{{2}})(?::(\d{{2}}))?(?:\s*([ap])\.?m\b\.?)?"
    ))
    .expect("valid month-name time regex")
});

static MONTH_NAME_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTH_PATTERN})\.?\s+(\d{{1,2}})\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid month-name date regex")
});

/// Optional trailing clock for the numeric strategies, groups 4 to 7
const NUMERIC_TIME_PATTERN: &str = r"(?:[T\s]+(?:at\s+)?(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([ap])\.?m\b\.?)?)?";

static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{4}})[-/](\d{{1,2}})[-/](\d{{1,2}})\b{NUMERIC_TIME_PATTERN}"
    ))
    .expect("valid year-first regex")
});

static YEAR_FIRST_LEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-/]").expect("valid year-first lead regex"));

static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})[-/](\d{{1,2}})[-/](\d{{4}})\b{NUMERIC_TIME_PATTERN}"
    ))
    .expect("valid month-first regex")
});

/// Naive forms accepted by the native parse, including the storage format
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Which calendar a parsed instant must be bucketed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// The source carried an explicit `Z`; bucket by UTC calendar fields
    Utc,
    /// Bucket by the evaluation zone's calendar fields
    Local,
}

/// A parsed point in time plus the calendar it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInstant {
    pub instant: DateTime<Utc>,
    pub precision: Precision,
}

impl NormalizedInstant {
    /// Calendar date under UTC or under `zone`, depending on precision
    pub fn calendar_date<Tz: TimeZone>(&self, zone: &Tz) -> NaiveDate {
        match self.precision {
            Precision::Utc => self.instant.date_naive(),
            Precision::Local => self.instant.with_timezone(zone).date_naive(),
        }
    }

    pub fn day_key<Tz: TimeZone>(&self, zone: &Tz) -> DayBucketKey {
        DayBucketKey::from_date(self.calendar_date(zone))
    }

    /// Wall-clock reading of the instant in `zone`
    pub fn local_datetime<Tz: TimeZone>(&self, zone: &Tz) -> NaiveDateTime {
        self.instant.with_timezone(zone).naive_local()
    }
}

/// `YYYY-MM-DD` key grouping instants that share a calendar day
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayBucketKey(String);

impl DayBucketKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DAY_KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, DAY_KEY_FORMAT).ok()
    }
}

impl fmt::Display for DayBucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical storage value, plus whether it is the "now" fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTimestamp {
    pub value: String,
    pub fell_back: bool,
}

/// Parse strategies, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Native,
    MonthNameWithTime,
    MonthNameDate,
    YearFirst,
    MonthFirst,
}

impl ParseStrategy {
    pub const ALL: [ParseStrategy; 5] = [
        ParseStrategy::Native,
        ParseStrategy::MonthNameWithTime,
        ParseStrategy::MonthNameDate,
        ParseStrategy::YearFirst,
        ParseStrategy::MonthFirst,
    ];

    fn attempt<Tz: TimeZone>(
        self,
        cleaned: &str,
        zone: &Tz,
        current_year: i32,
    ) -> Option<DateTime<Utc>> {
        match self {
            ParseStrategy::Native => parse_native(cleaned, zone),
            ParseStrategy::MonthNameWithTime => {
                let caps = MONTH_NAME_WITH_TIME.captures(cleaned)?;
                let date = month_name_date(&caps, current_year)?;
                let time = clock_time(&caps, 4, 5, 6, 7)?;
                resolve_local(zone, date.and_time(time))
            }
            ParseStrategy::MonthNameDate => {
                let caps = MONTH_NAME_DATE.captures(cleaned)?;
                let date = month_name_date(&caps, current_year)?;
                resolve_local(zone, date.and_hms_opt(0, 0, 0)?)
            }
            ParseStrategy::YearFirst => {
                let caps = YEAR_FIRST.captures(cleaned)?;
                let date = numeric_date(&caps, 1, 2, 3)?;
                resolve_local(zone, date.and_time(numeric_time(&caps)?))
            }
            ParseStrategy::MonthFirst => {
                // A leading four-digit group always means year-first
                if YEAR_FIRST_LEAD.is_match(cleaned) {
                    return None;
                }
                let caps = MONTH_FIRST.captures(cleaned)?;
                let date = numeric_date(&caps, 3, 1, 2)?;
                resolve_local(zone, date.and_time(numeric_time(&caps)?))
            }
        }
    }
}

/// True for strict ISO-8601 date-times carrying a `Z` designator
pub fn is_iso_utc(raw: &str) -> bool {
    ISO_UTC.is_match(raw.trim())
}

/// Strip ordinals, provenance noise, label words and GMT offset annotations
pub fn clean_raw_timestamp(raw: &str) -> String {
    let cleaned = ORDINAL_SUFFIX.replace_all(raw, "$1");
    let cleaned = FROM_IP.replace_all(&cleaned, " ");
    let cleaned = LABEL_WORDS.replace_all(&cleaned, " ");
    let cleaned = GMT_OFFSET.replace(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_string()
}

/// Parse a raw timestamp against the evaluation instant `now`.
///
/// `now` supplies the local calendar (its timezone), the default year for
/// year-less strings and the upper bound of the plausible-year window.
/// Returns `None` when no strategy yields a plausible instant.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> Option<NormalizedInstant> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let zone = now.timezone();
    let current_year = now.year();
    let precision = if is_iso_utc(trimmed) {
        Precision::Utc
    } else {
        Precision::Local
    };
    let cleaned = clean_raw_timestamp(trimmed);

    for strategy in ParseStrategy::ALL {
        let Some(instant) = strategy.attempt(&cleaned, &zone, current_year) else {
            continue;
        };
        let parsed = NormalizedInstant { instant, precision };
        let year = parsed.calendar_date(&zone).year();
        if is_plausible_year(year, current_year) {
            trace!(raw = trimmed, ?strategy, %instant, "parsed timestamp");
            return Some(parsed);
        }
        debug!(raw = trimmed, ?strategy, year, "rejected implausible timestamp year");
    }

    debug!(raw = trimmed, cleaned = %cleaned, "timestamp could not be parsed");
    None
}

/// Display path: `None` means Unknown
pub fn display_instant<Tz: TimeZone>(
    raw: Option<&str>,
    now: &DateTime<Tz>,
) -> Option<NormalizedInstant> {
    raw.and_then(|raw| parse_timestamp(raw, now))
}

/// Storage path: unparseable or absent input becomes `now`
pub fn storage_timestamp<Tz: TimeZone>(raw: Option<&str>, now: &DateTime<Tz>) -> StorageTimestamp {
    let zone = now.timezone();
    match display_instant(raw, now) {
        Some(parsed) => StorageTimestamp {
            value: format_storage(parsed.local_datetime(&zone)),
            fell_back: false,
        },
        None => StorageTimestamp {
            value: format_storage(now.naive_local()),
            fell_back: true,
        },
    }
}

/// Canonical `YYYY-MM-DD HH:MM:SS` value for persisting, read against the wall clock
pub fn to_storage_timestamp(raw: Option<&str>) -> String {
    storage_timestamp(raw, &Local::now()).value
}

/// Parsed instant for aggregation, read against the wall clock
pub fn to_display_instant(raw: Option<&str>) -> Option<NormalizedInstant> {
    display_instant(raw, &Local::now())
}

fn format_storage(datetime: NaiveDateTime) -> String {
    datetime.format(STORAGE_TIMESTAMP_FORMAT).to_string()
}

fn is_plausible_year(year: i32, current_year: i32) -> bool {
    (MIN_PLAUSIBLE_YEAR..=current_year + MAX_YEARS_AHEAD).contains(&year)
}

fn parse_native<Tz: TimeZone>(cleaned: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(cleaned) {
        return Some(dt.with_timezone(&Utc));
    }

    // Zulu strings without seconds or with unusual precision
    if let Some(body) = cleaned.strip_suffix('Z').or_else(|| cleaned.strip_suffix('z')) {
        return NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(body, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(cleaned, format).ok())
        .and_then(|naive| resolve_local(zone, naive))
}

/// Interpret a wall-clock reading in `zone`, skipping forward over DST gaps
fn resolve_local<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

fn month_name_date(caps: &Captures<'_>, current_year: i32) -> Option<NaiveDate> {
    let month = month_from_name(caps.get(1)?.as_str())?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year = match caps.get(3) {
        Some(year) => year.as_str().parse().ok()?,
        None => current_year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric_date(caps: &Captures<'_>, year: usize, month: usize, day: usize) -> Option<NaiveDate> {
    let year: i32 = caps.get(year)?.as_str().parse().ok()?;
    let month: u32 = caps.get(month)?.as_str().parse().ok()?;
    let day: u32 = caps.get(day)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Trailing clock of a numeric date, midnight when there is none.
/// An out-of-range clock rejects the match instead of dropping the time.
fn numeric_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    match caps.get(4) {
        Some(_) => clock_time(caps, 4, 5, 6, 7),
        None => NaiveTime::from_hms_opt(0, 0, 0),
    }
}

/// Clock time from captures, folding a 12-hour reading into 24 hours
fn clock_time(
    caps: &Captures<'_>,
    hour: usize,
    minute: usize,
    second: usize,
    meridiem: usize,
) -> Option<NaiveTime> {
    let hour: u32 = caps.get(hour)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(minute)?.as_str().parse().ok()?;
    let second: u32 = match caps.get(second) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };

    let hour = match caps.get(meridiem).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(m) if m == "p" && hour < 12 => hour + 12,
        Some(m) if m == "a" && hour == 12 => 0,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, second)
}
