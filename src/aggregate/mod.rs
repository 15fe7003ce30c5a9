//! Dashboard aggregates over ticket records.
//!
//! Every function here is a pure transform of the records and an explicit
//! evaluation instant `now`; the timezone of `now` is the "local" calendar
//! used for day bucketing. Records whose dates cannot be parsed drop out of
//! date-keyed aggregates only.

pub mod daily;
pub mod groups;
pub mod reply;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_TOP_BRANDS, STORAGE_TIMESTAMP_FORMAT};
use crate::normalize::{display_instant, NormalizedInstant};
use crate::types::TicketRecord;

pub use daily::{
    bucket_by_day, compare_today_with_yesterday, count_on_day, fill_recent_days, DayComparison,
    DayCount, DayTarget,
};
pub use groups::{count_by_status, group_by_brand, top_brands, BrandCount, StatusCount};
pub use reply::{average_first_reply_minutes, first_reply_minutes};

/// Which timestamp of a ticket dates it for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSelector {
    Created,
    Updated,
    /// `updated_at`, or `created_at` when the update is absent or blank
    #[default]
    UpdatedOrCreated,
    FirstReply,
}

impl DateSelector {
    pub fn raw<'a>(&self, record: &'a TicketRecord) -> Option<&'a str> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.trim().is_empty())
        }

        match self {
            DateSelector::Created => present(&record.created_at),
            DateSelector::Updated => present(&record.updated_at),
            DateSelector::UpdatedOrCreated => {
                present(&record.updated_at).or_else(|| present(&record.created_at))
            }
            DateSelector::FirstReply => present(&record.first_reply_at),
        }
    }

    pub fn instant<Tz: TimeZone>(
        &self,
        record: &TicketRecord,
        now: &DateTime<Tz>,
    ) -> Option<NormalizedInstant> {
        display_instant(self.raw(record), now)
    }
}

/// Direction of change between two counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Decided by the sign of the raw difference, not the percentage
    pub fn between(current: usize, previous: usize) -> Self {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Trend::Up,
            std::cmp::Ordering::Less => Trend::Down,
            std::cmp::Ordering::Equal => Trend::Flat,
        }
    }
}

/// Signed whole-percent change from `previous` to `current`.
///
/// A zero baseline reports +100 when anything happened and 0 otherwise.
/// Halves round toward positive infinity.
pub fn percent_delta(current: usize, previous: usize) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    (change + 0.5).floor() as i64
}

/// Knobs for [`DashboardSummary::build`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardOptions {
    pub selector: DateSelector,
    pub top_brands: usize,
    /// Length of the zero-filled trend window ending today
    pub trend_days: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            selector: DateSelector::UpdatedOrCreated,
            top_brands: DEFAULT_TOP_BRANDS,
            trend_days: 14,
        }
    }
}

/// Presentation-ready dashboard payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub generated_at: String,
    pub total_tickets: usize,
    /// Tickets whose selected date could not be parsed
    pub unparsed_dates: usize,
    pub daily: Vec<DayCount>,
    pub trend: Vec<DayCount>,
    pub today: DayComparison,
    pub top_brands: Vec<BrandCount>,
    pub statuses: Vec<StatusCount>,
    pub average_first_reply_minutes: i64,
}

impl DashboardSummary {
    pub fn build<Tz: TimeZone>(
        records: &[TicketRecord],
        now: &DateTime<Tz>,
        options: &DashboardOptions,
    ) -> Self {
        let daily = bucket_by_day(records, options.selector, now);
        let dated: usize = daily.iter().map(|day| day.count).sum();
        let trend = fill_recent_days(&daily, now.date_naive(), options.trend_days);

        let summary = Self {
            generated_at: now.naive_local().format(STORAGE_TIMESTAMP_FORMAT).to_string(),
            total_tickets: records.len(),
            unparsed_dates: records.len() - dated,
            today: compare_today_with_yesterday(records, options.selector, now),
            top_brands: top_brands(records, options.top_brands),
            statuses: count_by_status(records),
            average_first_reply_minutes: average_first_reply_minutes(records, now),
            daily,
            trend,
        };

        debug!(
            total = summary.total_tickets,
            unparsed = summary.unparsed_dates,
            days = summary.daily.len(),
            "built dashboard summary"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    #[test]
    fn test_percent_delta() {
        assert_eq!(percent_delta(5, 0), 100);
        assert_eq!(percent_delta(0, 0), 0);
        assert_eq!(percent_delta(3, 4), -25);
        assert_eq!(percent_delta(4, 4), 0);
        assert_eq!(percent_delta(10, 4), 150);
        assert_eq!(percent_delta(0, 3), -100);
        assert_eq!(percent_delta(1, 3), -67);
    }

    #[test]
    fn test_trend_follows_raw_difference() {
        assert_eq!(Trend::between(5, 0), Trend::Up);
        assert_eq!(Trend::between(3, 4), Trend::Down);
        assert_eq!(Trend::between(0, 0), Trend::Flat);
    }

    #[test]
    fn test_selector_falls_back_on_blank_update() {
        let record = TicketRecord {
            created_at: Some("2025-10-01".into()),
            updated_at: Some("  ".into()),
            first_reply_at: Some("2025-10-02".into()),
            ..TicketRecord::new("1")
        };
        assert_eq!(DateSelector::UpdatedOrCreated.raw(&record), Some("2025-10-01"));
        assert_eq!(DateSelector::Updated.raw(&record), None);
        assert_eq!(DateSelector::Created.raw(&record), Some("2025-10-01"));
        assert_eq!(DateSelector::FirstReply.raw(&record), Some("2025-10-02"));
    }

    #[test]
    fn test_summary_counts_unparsed_in_totals_only() {
        let zone = FixedOffset::east_opt(0).unwrap();
        let now = zone.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap();
        let records = vec![
            TicketRecord {
                updated_at: Some("Oct 15, 2025 08:00 AM".into()),
                created_at: Some("Oct 15, 2025 07:00 AM".into()),
                status: Some("open".into()),
                brand: Some("shopify".into()),
                ..TicketRecord::new("1")
            },
            TicketRecord {
                updated_at: Some("Oct 14, 2025".into()),
                status: Some("solved".into()),
                brand: Some("SHOPIFY".into()),
                ..TicketRecord::new("2")
            },
            TicketRecord {
                updated_at: Some("sometime last week".into()),
                status: Some("open".into()),
                ..TicketRecord::new("3")
            },
        ];

        let options = DashboardOptions { trend_days: 3, ..DashboardOptions::default() };
        let summary = DashboardSummary::build(&records, &now, &options);

        assert_eq!(summary.generated_at, "2025-10-15 12:00:00");
        assert_eq!(summary.total_tickets, 3);
        assert_eq!(summary.unparsed_dates, 1);
        assert_eq!(summary.daily.len(), 2);
        assert_eq!(summary.trend.len(), 3);
        assert_eq!(
            summary.trend.first().and_then(|day| day.key.date()),
            NaiveDate::from_ymd_opt(2025, 10, 13)
        );
        assert_eq!(summary.today.today, 1);
        assert_eq!(summary.today.yesterday, 1);
        assert_eq!(summary.today.trend, Trend::Flat);
        assert_eq!(summary.top_brands[0], BrandCount { brand: "Shopify".into(), count: 2 });
        assert_eq!(summary.statuses[0], StatusCount { status: "open".into(), count: 2 });
        assert_eq!(summary.average_first_reply_minutes, 60);
    }
}
