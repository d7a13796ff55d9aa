use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::AdminRow;

const ADMIN_COLUMNS: &str = "id, email, password, created_at";

impl Database {
    pub fn create_admin(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admins (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, now),
            )?;
            Ok(())
        })
    }

    pub fn get_admin_by_email(&self, email: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM admins WHERE email = ?1", ADMIN_COLUMNS);
            Ok(conn.query_row(&sql, [email], admin_from_row).optional()?)
        })
    }

    pub fn get_admin_by_id(&self, id: Uuid) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM admins WHERE id = ?1", ADMIN_COLUMNS);
            Ok(conn.query_row(&sql, [id], admin_from_row).optional()?)
        })
    }
}

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<AdminRow> {
    Ok(AdminRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use crate::queries::fixtures;

    #[test]
    fn admin_email_is_unique() {
        let db = fixtures::db();
        db.create_admin(Uuid::new_v4(), "root@example.com", "h", Utc::now()).unwrap();

        let err = db
            .create_admin(Uuid::new_v4(), "root@example.com", "h", Utc::now())
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let admin = db.get_admin_by_email("root@example.com").unwrap().unwrap();
        assert!(db.get_admin_by_id(admin.id).unwrap().is_some());
        assert!(db.get_admin_by_email("nobody@example.com").unwrap().is_none());
    }
}
