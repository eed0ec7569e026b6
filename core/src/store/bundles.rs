use super::{row_decimal, row_parsed, StoreConn};
use crate::{error::LedgerResult, records::Bundle};
use rusqlite::{params, OptionalExtension, Row};

fn bundle_from_row(row: &Row<'_>) -> rusqlite::Result<Bundle> {
    Ok(Bundle {
        id:          row.get(0)?,
        provider:    row_parsed(row, 1)?,
        name:        row.get(2)?,
        price:       row_decimal(row, 3)?,
        data_amount: row.get(4)?,
        validity:    row.get(5)?,
        description: row.get(6)?,
        category:    row_parsed(row, 7)?,
    })
}

impl StoreConn<'_> {
    // ── Bundles ───────────────────────────────────────────────────

    pub fn insert_bundle(&self, b: &Bundle) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO bundles (id, provider, name, price, data_amount, validity, description, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &b.id,
                b.provider.as_str(),
                &b.name,
                b.price.to_string(),
                &b.data_amount,
                &b.validity,
                &b.description,
                b.category.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn find_bundle(&self, id: &str) -> LedgerResult<Option<Bundle>> {
        let bundle = self
            .conn
            .query_row(
                "SELECT id, provider, name, price, data_amount, validity, description, category
                 FROM bundles WHERE id = ?1",
                params![id],
                bundle_from_row,
            )
            .optional()?;
        Ok(bundle)
    }

    /// The catalog in insertion order.
    pub fn all_bundles(&self) -> LedgerResult<Vec<Bundle>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, provider, name, price, data_amount, validity, description, category
             FROM bundles ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], bundle_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Returns false when no bundle had that id.
    pub fn delete_bundle(&self, id: &str) -> LedgerResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM bundles WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    pub fn bundle_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM bundles", [], |row| row.get(0))?;
        Ok(n)
    }
}
