use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::{percent_delta, DateSelector, Trend};
use crate::constants::DAY_LABEL_FORMAT;
use crate::normalize::{DayBucketKey, NormalizedInstant, Precision};
use crate::types::TicketRecord;

/// One point of the daily ticket series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub key: DayBucketKey,
    pub label: String,
    pub count: usize,
}

impl DayCount {
    fn new(key: DayBucketKey, count: usize) -> Self {
        let label = key
            .date()
            .map(|date| date.format(DAY_LABEL_FORMAT).to_string())
            .unwrap_or_else(|| key.to_string());
        Self { key, label, count }
    }
}

/// The calendar day to count, expressed in both calendars a record may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTarget {
    pub utc: NaiveDate,
    pub local: NaiveDate,
}

impl DayTarget {
    /// The day containing `instant`, in UTC and in the instant's own zone
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self {
            utc: instant.naive_utc().date(),
            local: instant.date_naive(),
        }
    }

    pub fn today<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self::at(now)
    }

    /// UTC records compare against the day 24 hours before `now`; local
    /// records against the local calendar day before today.
    pub fn yesterday<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        Self {
            utc: (now.clone() - Duration::hours(24)).naive_utc().date(),
            local: today.pred_opt().unwrap_or(today),
        }
    }

    pub fn matches<Tz: TimeZone>(&self, parsed: &NormalizedInstant, zone: &Tz) -> bool {
        match parsed.precision {
            Precision::Utc => parsed.instant.date_naive() == self.utc,
            Precision::Local => parsed.calendar_date(zone) == self.local,
        }
    }
}

/// Today's count against yesterday's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayComparison {
    pub today: usize,
    pub yesterday: usize,
    pub delta_percent: i64,
    pub trend: Trend,
}

/// Count records per calendar day of the selected date, ascending by day.
///
/// Records whose selected date is Unknown are skipped.
pub fn bucket_by_day<Tz: TimeZone>(
    records: &[TicketRecord],
    selector: DateSelector,
    now: &DateTime<Tz>,
) -> Vec<DayCount> {
    let zone = now.timezone();
    let mut buckets: BTreeMap<DayBucketKey, usize> = BTreeMap::new();

    for record in records {
        if let Some(parsed) = selector.instant(record, now) {
            *buckets.entry(parsed.day_key(&zone)).or_default() += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(key, count)| DayCount::new(key, count))
        .collect()
}

/// Zero-filled window of the `days` calendar days ending on `last_day`
pub fn fill_recent_days(series: &[DayCount], last_day: NaiveDate, days: usize) -> Vec<DayCount> {
    let counts: BTreeMap<&DayBucketKey, usize> =
        series.iter().map(|day| (&day.key, day.count)).collect();

    (0..days)
        .rev()
        .filter_map(|back| last_day.checked_sub_signed(Duration::days(back as i64)))
        .map(|date| {
            let key = DayBucketKey::from_date(date);
            let count = counts.get(&key).copied().unwrap_or(0);
            DayCount::new(key, count)
        })
        .collect()
}

/// Count records whose selected date falls on `target`
pub fn count_on_day<Tz: TimeZone>(
    records: &[TicketRecord],
    selector: DateSelector,
    target: &DayTarget,
    now: &DateTime<Tz>,
) -> usize {
    let zone = now.timezone();
    records
        .iter()
        .filter_map(|record| selector.instant(record, now))
        .filter(|parsed| target.matches(parsed, &zone))
        .count()
}

pub fn compare_today_with_yesterday<Tz: TimeZone>(
    records: &[TicketRecord],
    selector: DateSelector,
    now: &DateTime<Tz>,
) -> DayComparison {
    let today = count_on_day(records, selector, &DayTarget::today(now), now);
    let yesterday = count_on_day(records, selector, &DayTarget::yesterday(now), now);

    DayComparison {
        today,
        yesterday,
        delta_percent: percent_delta(today, yesterday),
        trend: Trend::between(today, yesterday),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(10 * 3600).unwrap()
    }

    fn ticket(id: &str, updated_at: Option<&str>, created_at: Option<&str>) -> TicketRecord {
        TicketRecord {
            updated_at: updated_at.map(str::to_string),
            created_at: created_at.map(str::to_string),
            ..TicketRecord::new(id)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bucket_by_day_sorts_and_skips_unknown() {
        let now = zone().with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        let records = vec![
            ticket("a", Some("Oct 14, 2025, 03:14 AM"), None),
            ticket("b", Some("2025-10-12"), None),
            ticket("c", Some("Oct 14th, 2025"), None),
            ticket("d", None, Some("10/13/2025")),
            ticket("e", Some("not a date"), Some("2025-10-12")),
            ticket("f", None, None),
        ];

        let series = bucket_by_day(&records, DateSelector::UpdatedOrCreated, &now);
        let keys: Vec<_> = series.iter().map(|day| day.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-10-12", "2025-10-13", "2025-10-14"]);
        assert_eq!(series.iter().map(|day| day.count).sum::<usize>(), 4);
        assert_eq!(series[2].count, 2);
        assert_eq!(series[0].label, "Oct 12");
    }

    #[test]
    fn test_bucket_by_day_uses_utc_calendar_for_zulu_strings() {
        let now = zone().with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        let records = vec![
            // 20:00Z is 06:00 on the 15th at +10:00, but stays on the 14th
            ticket("a", Some("2025-10-14T20:00:00Z"), None),
            // Same instant with an explicit offset buckets locally
            ticket("b", Some("2025-10-14T20:00:00+00:00"), None),
        ];

        let series = bucket_by_day(&records, DateSelector::Updated, &now);
        let keys: Vec<_> = series.iter().map(|day| day.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-10-14", "2025-10-15"]);
    }

    #[test]
    fn test_yesterday_is_asymmetric() {
        // 01:00 local on the 15th is 15:00Z on the 14th
        let now = zone().with_ymd_and_hms(2025, 10, 15, 1, 0, 0).unwrap();
        let yesterday = DayTarget::yesterday(&now);
        assert_eq!(yesterday.local, date(2025, 10, 14));
        assert_eq!(yesterday.utc, date(2025, 10, 13));

        let today = DayTarget::today(&now);
        assert_eq!(today.local, date(2025, 10, 15));
        assert_eq!(today.utc, date(2025, 10, 14));
    }

    #[test]
    fn test_count_on_day_matches_per_record_precision() {
        let now = zone().with_ymd_and_hms(2025, 10, 15, 1, 0, 0).unwrap();
        let records = vec![
            ticket("utc-today", Some("2025-10-14T09:00:00Z"), None),
            ticket("utc-yesterday", Some("2025-10-13T09:00:00Z"), None),
            ticket("local-today", Some("Oct 15, 2025, 00:30 AM"), None),
            ticket("local-yesterday", Some("Oct 14, 2025 11:00 PM"), None),
            ticket("unknown", Some("??"), None),
        ];

        let today = count_on_day(&records, DateSelector::Updated, &DayTarget::today(&now), &now);
        let yesterday =
            count_on_day(&records, DateSelector::Updated, &DayTarget::yesterday(&now), &now);
        assert_eq!(today, 2);
        assert_eq!(yesterday, 2);
    }

    #[test]
    fn test_compare_today_with_yesterday() {
        let now = zone().with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        let records = vec![
            ticket("a", Some("Oct 15, 2025 09:00 AM"), None),
            ticket("b", Some("Oct 15, 2025 10:00 AM"), None),
            ticket("c", Some("Oct 15, 2025 11:00 AM"), None),
            ticket("d", Some("Oct 14, 2025 09:00 AM"), None),
            ticket("e", Some("Oct 14, 2025 09:00 AM"), None),
            ticket("f", Some("Oct 14, 2025 09:00 AM"), None),
            ticket("g", Some("Oct 14, 2025 09:00 AM"), None),
        ];

        let comparison = compare_today_with_yesterday(&records, DateSelector::Updated, &now);
        assert_eq!(comparison.today, 3);
        assert_eq!(comparison.yesterday, 4);
        assert_eq!(comparison.delta_percent, -25);
        assert_eq!(comparison.trend, Trend::Down);
    }

    #[test]
    fn test_fill_recent_days_zero_fills_window() {
        let series = vec![
            DayCount::new(DayBucketKey::from_date(date(2025, 10, 1)), 9),
            DayCount::new(DayBucketKey::from_date(date(2025, 10, 13)), 2),
            DayCount::new(DayBucketKey::from_date(date(2025, 10, 15)), 5),
        ];

        let window = fill_recent_days(&series, date(2025, 10, 15), 3);
        let counts: Vec<_> = window.iter().map(|day| (day.key.as_str(), day.count)).collect();
        assert_eq!(
            counts,
            vec![("2025-10-13", 2), ("2025-10-14", 0), ("2025-10-15", 5)]
        );
        assert!(fill_recent_days(&series, date(2025, 10, 15), 0).is_empty());
    }
}
