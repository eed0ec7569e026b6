use super::{row_datetime, row_decimal, row_parsed, StoreConn};
use crate::{error::LedgerResult, records::Transaction};
use rusqlite::{params, OptionalExtension, Row};

const TX_COLUMNS: &str = "id, user_id, kind, amount, created_at, description, status, bundle_id";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id:          row.get(0)?,
        user_id:     row.get(1)?,
        kind:        row_parsed(row, 2)?,
        amount:      row_decimal(row, 3)?,
        created_at:  row_datetime(row, 4)?,
        description: row.get(5)?,
        status:      row_parsed(row, 6)?,
        bundle_id:   row.get(7)?,
    })
}

impl StoreConn<'_> {
    // ── Transactions (append-only) ────────────────────────────────

    pub fn append_transaction(&self, t: &Transaction) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (id, user_id, kind, amount, created_at, description, status, bundle_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &t.id,
                &t.user_id,
                t.kind.as_str(),
                t.amount.to_string(),
                t.created_at.to_rfc3339(),
                &t.description,
                t.status.as_str(),
                &t.bundle_id,
            ],
        )?;
        Ok(())
    }

    /// A user's transactions, newest first.
    pub fn transactions_for_user(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE user_id = ?1 ORDER BY seq DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], transaction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every transaction, newest first.
    pub fn all_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        let sql = format!("SELECT {TX_COLUMNS} FROM transactions ORDER BY seq DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], transaction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_transaction(&self, id: &str) -> LedgerResult<Option<Transaction>> {
        let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?1");
        let tx = self
            .conn
            .query_row(&sql, params![id], transaction_from_row)
            .optional()?;
        Ok(tx)
    }

    pub fn transaction_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(n)
    }
}
