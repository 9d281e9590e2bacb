use anyhow::Result;
use expanse_types::models::Role;
use rusqlite::Row;
use uuid::Uuid;

use crate::models::{DirectoryRow, UserRow};
use crate::{Database, OptionalExt};

impl Database {
    /// Insert a user together with its `local` account row. The account's
    /// provider_account_id doubles as the stable external id the enrollment
    /// contract exchanges, and for local registrations that is the email.
    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO users (id, name, email, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, name, email, password_hash, role.as_str(), now],
            )?;
            tx.execute(
                "INSERT INTO accounts (id, user_id, provider, provider_account_id)
                 VALUES (?1, ?2, 'local', ?3)",
                rusqlite::params![Uuid::new_v4().to_string(), id, email],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, image, role, created_at
                 FROM users WHERE email = ?1",
                [email],
                map_user_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, image, role, created_at
                 FROM users WHERE id = ?1",
                [id],
                map_user_row,
            )
            .optional()
        })
    }

    /// Resolve a user through the accounts table by its provider account id.
    pub fn get_user_by_provider_account(&self, provider_account_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.name, u.email, u.password, u.image, u.role, u.created_at
                 FROM accounts a
                 JOIN users u ON u.id = a.user_id
                 WHERE a.provider_account_id = ?1",
                [provider_account_id],
                map_user_row,
            )
            .optional()
        })
    }

    /// Student-role users with their provider account ids, the list the
    /// enrollment screen consumes.
    pub fn list_student_directory(&self) -> Result<Vec<DirectoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.provider_account_id, u.name
                 FROM users u
                 JOIN accounts a ON a.user_id = u.id
                 WHERE u.role = ?1
                 ORDER BY u.name",
            )?;

            let rows = stmt
                .query_map([Role::Student.as_str()], |row| {
                    Ok(DirectoryRow {
                        provider_account_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Batch-map provider account ids to internal user ids. Ids with no
    /// account row are simply absent from the result.
    pub fn resolve_provider_accounts(&self, ids: &[String]) -> Result<Vec<(String, String)>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT provider_account_id, user_id FROM accounts WHERE provider_account_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}
