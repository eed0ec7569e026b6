use super::{row_datetime, StoreConn};
use crate::{
    error::LedgerResult,
    event::{EventLogEntry, LedgerEvent},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id:         Some(row.get(0)?),
        created_at: row_datetime(row, 1)?,
        event_type: row.get(2)?,
        payload:    row.get(3)?,
    })
}

impl StoreConn<'_> {
    // ── Event log ─────────────────────────────────────────────────

    pub fn append_event(&self, at: DateTime<Utc>, event: &LedgerEvent) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (created_at, event_type, payload) VALUES (?1, ?2, ?3)",
            params![at.to_rfc3339(), event.type_name(), serde_json::to_string(event)?],
        )?;
        Ok(())
    }

    pub fn events_of_type(&self, event_type: &str) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, event_type, payload
             FROM event_log WHERE event_type = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![event_type], entry_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn recent_events(&self, limit: usize) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, event_type, payload
             FROM event_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], entry_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
