use super::{row_datetime, StoreConn};
use crate::{error::LedgerResult, records::Session};
use rusqlite::{params, OptionalExtension};

impl StoreConn<'_> {
    // ── Session (single slot) ─────────────────────────────────────

    /// Replace whatever session is active.
    pub fn put_session(&self, s: &Session) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO session (slot, token, user_id, created_at) VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(slot) DO UPDATE SET
                token = excluded.token,
                user_id = excluded.user_id,
                created_at = excluded.created_at",
            params![&s.token, &s.user_id, s.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn current_session(&self) -> LedgerResult<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT token, user_id, created_at FROM session WHERE slot = 1",
                [],
                |row| {
                    Ok(Session {
                        token:      row.get(0)?,
                        user_id:    row.get(1)?,
                        created_at: row_datetime(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn clear_session(&self) -> LedgerResult<()> {
        self.conn.execute("DELETE FROM session", [])?;
        Ok(())
    }
}
