use crate::error::Result;
use crate::metrics::StoreMetrics;
use crate::normalize::{display_instant, storage_timestamp};
use crate::types::{TicketMessage, TicketRecord, UpsertOutcome};
use chrono::{DateTime, Local, TimeZone};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Persistence for tickets and their messages.
///
/// Implementations are blocking; async callers go through `spawn_blocking`.
pub trait TicketStore: Send + Sync {
    fn upsert_ticket(&self, record: &TicketRecord) -> Result<UpsertOutcome>;
    fn get_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>>;
    fn list_tickets(&self) -> Result<Vec<TicketRecord>>;
    /// Returns false when the ticket did not exist
    fn delete_ticket(&self, ticket_id: &str) -> Result<bool>;
    fn count_tickets(&self) -> Result<usize>;
}

/// A record with every timestamp in canonical storage form
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTicket {
    pub record: TicketRecord,
    pub timestamp_fallbacks: usize,
}

/// Normalize a record for the write path, reading unparseable timestamps against `now`.
///
/// `created_at` and `updated_at` are mandatory columns and fall back to `now`.
/// `first_reply_at` is optional, so an unusable value is dropped instead.
/// Message `sent_at` values that do not parse are kept verbatim so that
/// re-ingesting the same export matches the stored messages again.
pub fn prepare_for_storage<Tz: TimeZone>(record: &TicketRecord, now: &DateTime<Tz>) -> PreparedTicket {
    let mut prepared = record.clone();
    let mut fallbacks = 0;

    for field in [&mut prepared.created_at, &mut prepared.updated_at] {
        let stored = storage_timestamp(field.as_deref(), now);
        if stored.fell_back {
            fallbacks += 1;
        }
        *field = Some(stored.value);
    }

    prepared.first_reply_at = match non_blank(record.first_reply_at.as_deref()) {
        Some(raw) if display_instant(Some(raw), now).is_some() => {
            Some(storage_timestamp(Some(raw), now).value)
        }
        Some(raw) => {
            warn!(ticket_id = %record.ticket_id, raw, "dropping unparseable first_reply_at");
            None
        }
        None => None,
    };

    for message in &mut prepared.messages {
        message.sent_at = match non_blank(message.sent_at.as_deref()) {
            Some(raw) if display_instant(Some(raw), now).is_some() => {
                Some(storage_timestamp(Some(raw), now).value)
            }
            other => other.map(str::to_string),
        };
    }

    if fallbacks > 0 {
        warn!(
            ticket_id = %record.ticket_id,
            fallbacks,
            "stored current time for unparseable timestamps"
        );
    }

    PreparedTicket {
        record: prepared,
        timestamp_fallbacks: fallbacks,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA foreign_keys=ON;
    CREATE TABLE IF NOT EXISTS tickets (
        ticket_id            TEXT PRIMARY KEY,
        subject              TEXT,
        status               TEXT,
        brand                TEXT,
        requester            TEXT,
        created_at           TEXT NOT NULL,
        updated_at           TEXT NOT NULL,
        first_reply_at       TEXT,
        first_reply_minutes  REAL
    );
    CREATE TABLE IF NOT EXISTS ticket_messages (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        ticket_id  TEXT NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
        author     TEXT NOT NULL DEFAULT '',
        body       TEXT NOT NULL,
        sent_at    TEXT NOT NULL DEFAULT '',
        UNIQUE(ticket_id, author, body, sent_at)
    );
"#;

/// SQLite-backed store. Every operation opens its own connection and drops it on return.
pub struct SqliteTicketStore {
    db_path: PathBuf,
}

impl SqliteTicketStore {
    /// Create the database file and schema if they do not exist yet
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { db_path };
        store.connect()?.execute_batch(SCHEMA)?;
        info!("Opened ticket store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    /// Same as [`TicketStore::upsert_ticket`] with an explicit "now" for fallbacks
    pub fn upsert_ticket_at<Tz: TimeZone>(
        &self,
        record: &TicketRecord,
        now: &DateTime<Tz>,
    ) -> Result<UpsertOutcome> {
        let started = Instant::now();
        let prepared = prepare_for_storage(record, now);
        let result = self.write_prepared(&prepared);
        match &result {
            Ok(outcome) => {
                StoreMetrics::record_upsert(
                    outcome.created,
                    outcome.messages_appended,
                    started.elapsed().as_secs_f64(),
                );
                StoreMetrics::record_timestamp_fallbacks(outcome.timestamp_fallbacks);
            }
            Err(e) => {
                warn!(ticket_id = %record.ticket_id, "upsert failed: {}", e);
                StoreMetrics::record_error("upsert");
            }
        }
        result
    }

    fn write_prepared(&self, prepared: &PreparedTicket) -> Result<UpsertOutcome> {
        let record = &prepared.record;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existed = tx
            .query_row(
                "SELECT 1 FROM tickets WHERE ticket_id = ?1",
                params![record.ticket_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            "INSERT INTO tickets (ticket_id, subject, status, brand, requester, created_at, updated_at, first_reply_at, first_reply_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(ticket_id) DO UPDATE SET
                subject=excluded.subject,
                status=excluded.status,
                brand=excluded.brand,
                requester=excluded.requester,
                created_at=excluded.created_at,
                updated_at=excluded.updated_at,
                first_reply_at=excluded.first_reply_at,
                first_reply_minutes=excluded.first_reply_minutes",
            params![
                record.ticket_id,
                record.subject,
                record.status,
                record.brand,
                record.requester,
                record.created_at,
                record.updated_at,
                record.first_reply_at,
                record.first_reply_minutes_value(),
            ],
        )?;

        let mut appended = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO ticket_messages (ticket_id, author, body, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for message in &record.messages {
                appended += stmt.execute(params![
                    record.ticket_id,
                    message.author.as_deref().unwrap_or_default(),
                    message.body,
                    message.sent_at.as_deref().unwrap_or_default(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            ticket_id = %record.ticket_id,
            created = !existed,
            appended,
            "upserted ticket"
        );

        Ok(UpsertOutcome {
            ticket_id: record.ticket_id.clone(),
            created: !existed,
            messages_appended: appended,
            timestamp_fallbacks: prepared.timestamp_fallbacks,
        })
    }

    fn load_messages(conn: &Connection, ticket_id: &str) -> Result<Vec<TicketMessage>> {
        let mut stmt = conn.prepare(
            "SELECT author, body, sent_at FROM ticket_messages WHERE ticket_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![ticket_id], |row| {
            let author: String = row.get(0)?;
            let sent_at: String = row.get(2)?;
            Ok(TicketMessage {
                author: (!author.is_empty()).then_some(author),
                body: row.get(1)?,
                sent_at: (!sent_at.is_empty()).then_some(sent_at),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn all_messages(conn: &Connection) -> Result<HashMap<String, Vec<TicketMessage>>> {
        let mut stmt =
            conn.prepare("SELECT ticket_id, author, body, sent_at FROM ticket_messages ORDER BY id")?;
        let mut rows = stmt.query([])?;
        let mut by_ticket: HashMap<String, Vec<TicketMessage>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let ticket_id: String = row.get(0)?;
            let author: String = row.get(1)?;
            let sent_at: String = row.get(3)?;
            by_ticket.entry(ticket_id).or_default().push(TicketMessage {
                author: (!author.is_empty()).then_some(author),
                body: row.get(2)?,
                sent_at: (!sent_at.is_empty()).then_some(sent_at),
            });
        }
        Ok(by_ticket)
    }
}

const TICKET_COLUMNS: &str = "ticket_id, subject, status, brand, requester, created_at, updated_at, first_reply_at, first_reply_minutes";

fn ticket_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRecord> {
    let minutes: Option<f64> = row.get(8)?;
    Ok(TicketRecord {
        ticket_id: row.get(0)?,
        subject: row.get(1)?,
        status: row.get(2)?,
        brand: row.get(3)?,
        requester: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        first_reply_at: row.get(7)?,
        first_reply_minutes: minutes.and_then(serde_json::Number::from_f64).map(serde_json::Value::Number),
        messages: Vec::new(),
    })
}

impl TicketStore for SqliteTicketStore {
    fn upsert_ticket(&self, record: &TicketRecord) -> Result<UpsertOutcome> {
        self.upsert_ticket_at(record, &Local::now())
    }

    fn get_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>> {
        let conn = self.connect()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = ?1"),
                params![ticket_id],
                ticket_from_row,
            )
            .optional()?;

        match ticket {
            Some(mut ticket) => {
                ticket.messages = Self::load_messages(&conn, ticket_id)?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    fn list_tickets(&self) -> Result<Vec<TicketRecord>> {
        let conn = self.connect()?;
        let mut messages = Self::all_messages(&conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY ticket_id"
        ))?;
        let tickets = stmt
            .query_map([], ticket_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tickets
            .into_iter()
            .map(|mut ticket| {
                ticket.messages = messages.remove(&ticket.ticket_id).unwrap_or_default();
                ticket
            })
            .collect())
    }

    fn delete_ticket(&self, ticket_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM ticket_messages WHERE ticket_id = ?1",
            params![ticket_id],
        )?;
        let removed = conn.execute("DELETE FROM tickets WHERE ticket_id = ?1", params![ticket_id])?;
        StoreMetrics::record_delete(removed > 0);
        Ok(removed > 0)
    }

    fn count_tickets(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))?;
        StoreMetrics::set_ticket_count(count as usize);
        Ok(count as usize)
    }
}

/// In-memory store for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<Mutex<HashMap<String, TicketRecord>>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_ticket_at<Tz: TimeZone>(
        &self,
        record: &TicketRecord,
        now: &DateTime<Tz>,
    ) -> Result<UpsertOutcome> {
        let prepared = prepare_for_storage(record, now);
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());

        let created = !tickets.contains_key(&prepared.record.ticket_id);
        let mut existing = tickets
            .remove(&prepared.record.ticket_id)
            .map(|ticket| ticket.messages)
            .unwrap_or_default();

        let mut appended = 0;
        for message in &prepared.record.messages {
            if !existing.iter().any(|m| same_message(m, message)) {
                existing.push(message.clone());
                appended += 1;
            }
        }

        let ticket_id = prepared.record.ticket_id.clone();
        let mut stored = prepared.record;
        stored.messages = existing;
        tickets.insert(ticket_id.clone(), stored);

        Ok(UpsertOutcome {
            ticket_id,
            created,
            messages_appended: appended,
            timestamp_fallbacks: prepared.timestamp_fallbacks,
        })
    }
}

fn same_message(a: &TicketMessage, b: &TicketMessage) -> bool {
    a.author.as_deref().unwrap_or_default() == b.author.as_deref().unwrap_or_default()
        && a.body == b.body
        && a.sent_at.as_deref().unwrap_or_default() == b.sent_at.as_deref().unwrap_or_default()
}

impl TicketStore for InMemoryTicketStore {
    fn upsert_ticket(&self, record: &TicketRecord) -> Result<UpsertOutcome> {
        self.upsert_ticket_at(record, &Local::now())
    }

    fn get_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickets.get(ticket_id).cloned())
    }

    fn list_tickets(&self) -> Result<Vec<TicketRecord>> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<TicketRecord> = tickets.values().cloned().collect();
        all.sort_by(|a, b| a.ticket_id.cmp(&b.ticket_id));
        Ok(all)
    }

    fn delete_ticket(&self, ticket_id: &str) -> Result<bool> {
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickets.remove(ticket_id).is_some())
    }

    fn count_tickets(&self) -> Result<usize> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 15, 12, 0, 0)
            .unwrap()
    }

    fn sample() -> TicketRecord {
        TicketRecord {
            subject: Some("Refund".into()),
            status: Some("open".into()),
            brand: Some("shopify".into()),
            created_at: Some("Oct 13th, 2025 at 9:05 am".into()),
            updated_at: Some("Updated: garbage".into()),
            first_reply_at: Some("whenever".into()),
            messages: vec![
                TicketMessage {
                    author: Some("agent".into()),
                    body: "On it".into(),
                    sent_at: Some("2025-10-13T10:00:00Z".into()),
                },
                TicketMessage {
                    author: None,
                    body: "thanks".into(),
                    sent_at: Some("later".into()),
                },
            ],
            ..TicketRecord::new("T-1")
        }
    }

    #[test]
    fn test_prepare_for_storage() {
        let prepared = prepare_for_storage(&sample(), &now());
        let record = prepared.record;
        assert_eq!(record.created_at.as_deref(), Some("2025-10-13 09:05:00"));
        assert_eq!(record.updated_at.as_deref(), Some("2025-10-15 12:00:00"));
        assert_eq!(record.first_reply_at, None);
        assert_eq!(prepared.timestamp_fallbacks, 1);
        assert_eq!(record.messages[0].sent_at.as_deref(), Some("2025-10-13 10:00:00"));
        assert_eq!(record.messages[1].sent_at.as_deref(), Some("later"));
    }

    #[test]
    fn test_absent_timestamps_fall_back_to_now() {
        let prepared = prepare_for_storage(&TicketRecord::new("bare"), &now());
        assert_eq!(prepared.timestamp_fallbacks, 2);
        assert_eq!(prepared.record.created_at.as_deref(), Some("2025-10-15 12:00:00"));
        assert_eq!(prepared.record.updated_at.as_deref(), Some("2025-10-15 12:00:00"));
    }

    #[test]
    fn test_in_memory_upsert_appends_messages_once() {
        let store = InMemoryTicketStore::new();
        let first = store.upsert_ticket_at(&sample(), &now()).unwrap();
        assert!(first.created);
        assert_eq!(first.messages_appended, 2);

        let mut changed = sample();
        changed.status = Some("solved".into());
        changed.messages.push(TicketMessage {
            author: Some("agent".into()),
            body: "Refunded".into(),
            sent_at: None,
        });
        let second = store.upsert_ticket_at(&changed, &now()).unwrap();
        assert!(!second.created);
        assert_eq!(second.messages_appended, 1);

        let stored = store.get_ticket("T-1").unwrap().unwrap();
        assert_eq!(stored.status.as_deref(), Some("solved"));
        assert_eq!(stored.messages.len(), 3);
        assert_eq!(store.count_tickets().unwrap(), 1);

        assert!(store.delete_ticket("T-1").unwrap());
        assert!(!store.delete_ticket("T-1").unwrap());
        assert!(store.list_tickets().unwrap().is_empty());
    }
}
