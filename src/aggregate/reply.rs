use chrono::{DateTime, TimeZone};

use crate::normalize::display_instant;
use crate::types::TicketRecord;

/// Minutes to first reply for one ticket, if any source yields a usable value.
///
/// Preference order: the explicit `first_reply_minutes` field, then
/// `first_reply_at - created_at`, then `updated_at - created_at` as a proxy.
/// Differences are only used when the later instant is not before creation.
pub fn first_reply_minutes<Tz: TimeZone>(record: &TicketRecord, now: &DateTime<Tz>) -> Option<f64> {
    if let Some(minutes) = record.first_reply_minutes_value() {
        return Some(minutes);
    }

    let created = display_instant(record.created_at.as_deref(), now)?;
    [record.first_reply_at.as_deref(), record.updated_at.as_deref()]
        .into_iter()
        .filter_map(|raw| display_instant(raw, now))
        .find(|later| later.instant >= created.instant)
        .map(|later| (later.instant - created.instant).num_seconds() as f64 / 60.0)
}

/// Mean first-reply time in whole minutes over tickets that have one; 0 when none do
pub fn average_first_reply_minutes<Tz: TimeZone>(records: &[TicketRecord], now: &DateTime<Tz>) -> i64 {
    let minutes: Vec<f64> = records
        .iter()
        .filter_map(|record| first_reply_minutes(record, now))
        .collect();

    if minutes.is_empty() {
        return 0;
    }
    (minutes.iter().sum::<f64>() / minutes.len() as f64).round() as i64
}
