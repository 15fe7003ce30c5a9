//! Filtering, sorting and display rows for the ticket table.

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::aggregate::groups::status_key;
use crate::constants::{TABLE_TIMESTAMP_FORMAT, UNKNOWN_LABEL};
use crate::normalize::{brand_label_or_unknown, display_instant, normalize_brand_label, NormalizedInstant};
use crate::types::TicketRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    TicketId,
    Subject,
    Brand,
    Status,
    CreatedAt,
    #[default]
    UpdatedAt,
}

/// Table query, deserialized straight from the request query string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
    pub sort: SortColumn,
    pub descending: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Default for TicketQuery {
    fn default() -> Self {
        Self {
            status: None,
            brand: None,
            search: None,
            sort: SortColumn::UpdatedAt,
            descending: true,
            limit: None,
            offset: None,
        }
    }
}

/// One rendered table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub ticket_id: String,
    pub subject: String,
    pub brand: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
}

struct Prepared<'a> {
    record: &'a TicketRecord,
    brand: String,
    status: String,
    created: Option<NormalizedInstant>,
    updated: Option<NormalizedInstant>,
}

/// Apply `query` to `records` and render the resulting page
pub fn build_table<Tz: TimeZone>(
    records: &[TicketRecord],
    query: &TicketQuery,
    now: &DateTime<Tz>,
) -> Vec<TableRow> {
    let zone = now.timezone();
    let mut rows: Vec<Prepared<'_>> = records
        .iter()
        .map(|record| Prepared {
            record,
            brand: brand_label_or_unknown(record.brand.as_deref()),
            status: status_key(record.status.as_deref()),
            created: display_instant(record.created_at.as_deref(), now),
            updated: display_instant(record.updated_at.as_deref(), now),
        })
        .filter(|row| matches_query(row, query))
        .collect();

    rows.sort_by(|a, b| compare_rows(a, b, query.sort, query.descending));

    rows.into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|row| TableRow {
            ticket_id: row.record.ticket_id.clone(),
            subject: row.record.subject.clone().unwrap_or_default(),
            brand: row.brand,
            status: row.status,
            created_at: date_cell(row.created.as_ref(), row.record.created_at.as_deref(), &zone),
            updated_at: date_cell(row.updated.as_ref(), row.record.updated_at.as_deref(), &zone),
            message_count: row.record.messages.len(),
        })
        .collect()
}

/// Parsed instant in the table format, else the raw text, else "Unknown"
pub fn date_cell<Tz: TimeZone>(parsed: Option<&NormalizedInstant>, raw: Option<&str>, zone: &Tz) -> String {
    match (parsed, raw.map(str::trim)) {
        (Some(parsed), _) => parsed
            .local_datetime(zone)
            .format(TABLE_TIMESTAMP_FORMAT)
            .to_string(),
        (None, Some(raw)) if !raw.is_empty() => raw.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn matches_query(row: &Prepared<'_>, query: &TicketQuery) -> bool {
    if let Some(status) = non_blank(query.status.as_deref()) {
        if row.status != status_key(Some(status)) {
            return false;
        }
    }
    if let Some(brand) = non_blank(query.brand.as_deref()) {
        if row.brand != normalize_brand_label(brand) {
            return false;
        }
    }
    if let Some(search) = non_blank(query.search.as_deref()) {
        let needle = search.to_lowercase();
        let record = row.record;
        let haystacks = [
            Some(record.ticket_id.as_str()),
            record.subject.as_deref(),
            record.requester.as_deref(),
        ];
        if !haystacks
            .iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    true
}

fn compare_rows(a: &Prepared<'_>, b: &Prepared<'_>, column: SortColumn, descending: bool) -> Ordering {
    let directed = |ordering: Ordering| if descending { ordering.reverse() } else { ordering };

    match column {
        SortColumn::TicketId => directed(a.record.ticket_id.cmp(&b.record.ticket_id)),
        SortColumn::Subject => directed(
            lower(a.record.subject.as_deref()).cmp(&lower(b.record.subject.as_deref())),
        ),
        SortColumn::Brand => directed(a.brand.cmp(&b.brand)),
        SortColumn::Status => directed(a.status.cmp(&b.status)),
        SortColumn::CreatedAt => compare_instants(a.created.as_ref(), b.created.as_ref(), directed),
        SortColumn::UpdatedAt => compare_instants(a.updated.as_ref(), b.updated.as_ref(), directed),
    }
}

/// Unknown dates sort last in either direction
fn compare_instants(
    a: Option<&NormalizedInstant>,
    b: Option<&NormalizedInstant>,
    directed: impl Fn(Ordering) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.instant.cmp(&b.instant)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn lower(value: Option<&str>) -> String {
    value.unwrap_or_default().to_lowercase()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 15, 12, 0, 0)
            .unwrap()
    }

    fn records() -> Vec<TicketRecord> {
        vec![
            TicketRecord {
                subject: Some("Refund request".into()),
                brand: Some("shopify".into()),
                status: Some("Open".into()),
                created_at: Some("Oct 10, 2025".into()),
                updated_at: Some("Oct 14, 2025, 03:14 PM".into()),
                ..TicketRecord::new("T-1")
            },
            TicketRecord {
                subject: Some("Login broken".into()),
                brand: Some("acme.com.au".into()),
                status: Some("solved".into()),
                requester: Some("jo@example.com".into()),
                created_at: Some("2025-10-11".into()),
                updated_at: Some("mystery".into()),
                ..TicketRecord::new("T-2")
            },
            TicketRecord {
                subject: Some("Shipping delay".into()),
                brand: Some("SHOPIFY".into()),
                status: Some("open".into()),
                created_at: None,
                updated_at: Some("2025-10-15T01:00:00Z".into()),
                ..TicketRecord::new("T-3")
            },
        ]
    }

    fn ids(rows: &[TableRow]) -> Vec<&str> {
        rows.iter().map(|row| row.ticket_id.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_latest_update_first_with_unknown_last() {
        let rows = build_table(&records(), &TicketQuery::default(), &now());
        assert_eq!(ids(&rows), vec!["T-3", "T-1", "T-2"]);

        let ascending = TicketQuery { descending: false, ..TicketQuery::default() };
        let rows = build_table(&records(), &ascending, &now());
        assert_eq!(ids(&rows), vec!["T-1", "T-3", "T-2"]);
    }

    #[test]
    fn test_date_cells() {
        let rows = build_table(&records(), &TicketQuery::default(), &now());
        let t1 = rows.iter().find(|row| row.ticket_id == "T-1").unwrap();
        assert_eq!(t1.updated_at, "2025-10-14 15:14");
        assert_eq!(t1.created_at, "2025-10-10 00:00");
        let t2 = rows.iter().find(|row| row.ticket_id == "T-2").unwrap();
        assert_eq!(t2.updated_at, "mystery");
        let t3 = rows.iter().find(|row| row.ticket_id == "T-3").unwrap();
        assert_eq!(t3.created_at, "Unknown");
        assert_eq!(t3.brand, "Shopify");
    }

    #[test]
    fn test_filters() {
        let open = TicketQuery { status: Some("OPEN".into()), ..TicketQuery::default() };
        assert_eq!(ids(&build_table(&records(), &open, &now())), vec!["T-3", "T-1"]);

        let brand = TicketQuery { brand: Some("ACME.COM.AU".into()), ..TicketQuery::default() };
        assert_eq!(ids(&build_table(&records(), &brand, &now())), vec!["T-2"]);

        let search = TicketQuery { search: Some("JO@".into()), ..TicketQuery::default() };
        assert_eq!(ids(&build_table(&records(), &search, &now())), vec!["T-2"]);

        let blank = TicketQuery { search: Some("  ".into()), ..TicketQuery::default() };
        assert_eq!(build_table(&records(), &blank, &now()).len(), 3);
    }

    #[test]
    fn test_sort_columns_and_pagination() {
        let by_subject = TicketQuery {
            sort: SortColumn::Subject,
            descending: false,
            ..TicketQuery::default()
        };
        assert_eq!(ids(&build_table(&records(), &by_subject, &now())), vec!["T-2", "T-1", "T-3"]);

        let by_created = TicketQuery {
            sort: SortColumn::CreatedAt,
            descending: true,
            ..TicketQuery::default()
        };
        assert_eq!(ids(&build_table(&records(), &by_created, &now())), vec!["T-2", "T-1", "T-3"]);

        let page = TicketQuery {
            sort: SortColumn::TicketId,
            descending: false,
            limit: Some(1),
            offset: Some(1),
            ..TicketQuery::default()
        };
        assert_eq!(ids(&build_table(&records(), &page, &now())), vec!["T-2"]);
    }
}
