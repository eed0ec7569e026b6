use super::{row_datetime, row_decimal, row_json, row_parsed, StoreConn};
use crate::{
    error::{LedgerError, LedgerResult},
    records::User,
};
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, name, username, email, phone_number, role, password, api_key,
     wallet_balance, profit_balance, console_balance, parent_id,
     shop_name, shop_slug, shop_support_phone, shop_prices, agent_prices,
     created_at, version, extra";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id:                 row.get(0)?,
        name:               row.get(1)?,
        username:           row.get(2)?,
        email:              row.get(3)?,
        phone_number:       row.get(4)?,
        role:               row_parsed(row, 5)?,
        password:           row.get(6)?,
        api_key:            row.get(7)?,
        wallet_balance:     row_decimal(row, 8)?,
        profit_balance:     row_decimal(row, 9)?,
        console_balance:    row_decimal(row, 10)?,
        parent_id:          row.get(11)?,
        shop_name:          row.get(12)?,
        shop_slug:          row.get(13)?,
        shop_support_phone: row.get(14)?,
        shop_prices:        row_json(row, 15)?,
        agent_prices:       row_json(row, 16)?,
        created_at:         row_datetime(row, 17)?,
        version:            row.get(18)?,
        extra:              row_json(row, 19)?,
    })
}

impl StoreConn<'_> {
    // ── Users ─────────────────────────────────────────────────────

    pub fn insert_user(&self, u: &User) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO users (
                id, name, username, email, phone_number, role, password, api_key,
                wallet_balance, profit_balance, console_balance, parent_id,
                shop_name, shop_slug, shop_support_phone, shop_prices, agent_prices,
                created_at, version, extra
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20)",
            params![
                &u.id,
                &u.name,
                &u.username,
                &u.email,
                &u.phone_number,
                u.role.as_str(),
                &u.password,
                &u.api_key,
                u.wallet_balance.to_string(),
                u.profit_balance.to_string(),
                u.console_balance.to_string(),
                &u.parent_id,
                &u.shop_name,
                &u.shop_slug,
                &u.shop_support_phone,
                serde_json::to_string(&u.shop_prices)?,
                serde_json::to_string(&u.agent_prices)?,
                u.created_at.to_rfc3339(),
                u.version,
                serde_json::to_string(&u.extra)?,
            ],
        )?;
        Ok(())
    }

    /// Write every mutable field of `u`, provided nobody has written the
    /// row since `u` was read. Returns the new version stamp.
    pub fn save_user(&self, u: &User) -> LedgerResult<i64> {
        let changed = self.conn.execute(
            "UPDATE users SET
                name = ?1, phone_number = ?2, password = ?3, api_key = ?4,
                wallet_balance = ?5, profit_balance = ?6, console_balance = ?7,
                shop_name = ?8, shop_slug = ?9, shop_support_phone = ?10,
                shop_prices = ?11, agent_prices = ?12,
                version = version + 1
             WHERE id = ?13 AND version = ?14",
            params![
                &u.name,
                &u.phone_number,
                &u.password,
                &u.api_key,
                u.wallet_balance.to_string(),
                u.profit_balance.to_string(),
                u.console_balance.to_string(),
                &u.shop_name,
                &u.shop_slug,
                &u.shop_support_phone,
                serde_json::to_string(&u.shop_prices)?,
                serde_json::to_string(&u.agent_prices)?,
                &u.id,
                u.version,
            ],
        )?;
        if changed == 0 {
            return Err(LedgerError::Conflict { user_id: u.id.clone() });
        }
        Ok(u.version + 1)
    }

    /// Attach an owner edge after both rows exist (used by importers).
    pub fn link_parent(&self, user_id: &str, parent_id: &str) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE users SET parent_id = ?1, version = version + 1 WHERE id = ?2",
            params![parent_id, user_id],
        )?;
        Ok(())
    }

    pub fn find_user(&self, id: &str) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = self
            .conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?;
        Ok(user)
    }

    pub fn require_user(&self, id: &str) -> LedgerResult<User> {
        self.find_user(id)?
            .ok_or_else(|| LedgerError::not_found("user", id))
    }

    pub fn find_user_by_email(&self, email: &str) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)");
        let user = self
            .conn
            .query_row(&sql, params![email], user_from_row)
            .optional()?;
        Ok(user)
    }

    pub fn username_taken(&self, username: &str) -> LedgerResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE lower(username) = lower(?1)",
            params![username],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn find_user_by_api_key(&self, key: &str) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = ?1");
        let user = self
            .conn
            .query_row(&sql, params![key], user_from_row)
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_shop_slug(&self, slug: &str) -> LedgerResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(shop_slug) = lower(?1)
             ORDER BY created_at ASC LIMIT 1"
        );
        let user = self
            .conn
            .query_row(&sql, params![slug], user_from_row)
            .optional()?;
        Ok(user)
    }

    /// All users in registration order.
    pub fn all_users(&self) -> LedgerResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn agents_of(&self, owner_id: &str) -> LedgerResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE parent_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], user_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn user_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(n)
    }
}
