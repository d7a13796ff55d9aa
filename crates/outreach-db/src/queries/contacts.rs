use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::{ContactRow, ContactUpdate, NewContact};
use crate::queries::{
    CREATOR_COLUMNS, CREATOR_JOIN, ContactFilter, creator_at, tags_at, tags_json,
};

fn contact_select() -> String {
    format!(
        "SELECT x.id, x.workspace_id, x.name, x.phone_number, x.email, x.company, x.notes,
                x.tags, x.created_at, x.updated_at, {}
         FROM contacts x
         {}",
        CREATOR_COLUMNS, CREATOR_JOIN
    )
}

/// Matches contacts carrying any tag of the JSON array bound at `?{param}`.
fn any_tag_predicate(param: usize) -> String {
    format!(
        "EXISTS (SELECT 1 FROM contact_tags t
                 WHERE t.contact_id = x.id
                   AND t.tag IN (SELECT value FROM json_each(?{})))",
        param
    )
}

impl Database {
    pub fn create_contact(&self, contact: &NewContact) -> Result<()> {
        let tags = tags_json(&contact.tags)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO contacts (id, workspace_id, name, phone_number, email, company, notes,
                                       tags, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    contact.id,
                    contact.workspace_id,
                    contact.name,
                    contact.phone_number,
                    contact.email,
                    contact.company,
                    contact.notes,
                    tags,
                    contact.created_by,
                    contact.created_at,
                ],
            )?;
            replace_tags(&tx, contact.id, contact.workspace_id, &contact.tags)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_contact(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<ContactRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE x.workspace_id = ?1 AND x.id = ?2", contact_select());
            Ok(conn.query_row(&sql, (workspace_id, id), contact_from_row).optional()?)
        })
    }

    /// Newest first. `search` matches name, phone or email; `tags` is a union filter.
    pub fn list_contacts(
        &self,
        workspace_id: Uuid,
        filter: &ContactFilter,
    ) -> Result<(Vec<ContactRow>, u64)> {
        let tags = if filter.tags.is_empty() {
            None
        } else {
            Some(tags_json(&filter.tags)?)
        };
        self.with_conn(|conn| {
            let pattern = filter.list.pattern();
            let predicate = format!(
                "x.workspace_id = ?1
                 AND (?2 IS NULL OR x.name LIKE ?2 ESCAPE '\\'
                      OR x.phone_number LIKE ?2 ESCAPE '\\'
                      OR x.email LIKE ?2 ESCAPE '\\')
                 AND (?3 IS NULL OR {})",
                any_tag_predicate(3)
            );

            let sql = format!(
                "{} WHERE {} ORDER BY x.created_at DESC, x.rowid DESC LIMIT ?4 OFFSET ?5",
                contact_select(),
                predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    (
                        workspace_id,
                        &pattern,
                        &tags,
                        filter.list.limit,
                        filter.list.offset(),
                    ),
                    contact_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM contacts x WHERE {}", predicate),
                (workspace_id, &pattern, &tags),
                |r| r.get(0),
            )?;
            Ok((rows, total))
        })
    }

    /// Every contact in the workspace carrying at least one of `tags`.
    /// Each contact appears once, however many tags it matches.
    pub fn get_contacts_by_tags(&self, workspace_id: Uuid, tags: &[String]) -> Result<Vec<ContactRow>> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let tags = tags_json(tags)?;
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE x.workspace_id = ?1 AND {} ORDER BY x.created_at ASC, x.rowid ASC",
                contact_select(),
                any_tag_predicate(2)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((workspace_id, &tags), contact_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_contacts_by_tags(&self, workspace_id: Uuid, tags: &[String]) -> Result<u64> {
        if tags.is_empty() {
            return Ok(0);
        }
        let tags = tags_json(tags)?;
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM contacts x WHERE x.workspace_id = ?1 AND {}",
                any_tag_predicate(2)
            );
            Ok(conn.query_row(&sql, (workspace_id, &tags), |r| r.get(0))?)
        })
    }

    /// Whether `phone_number` is taken in the workspace, ignoring `exclude`.
    pub fn phone_number_exists(
        &self,
        workspace_id: Uuid,
        phone_number: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM contacts
                     WHERE workspace_id = ?1 AND phone_number = ?2 AND (?3 IS NULL OR id != ?3)",
                    (workspace_id, phone_number, exclude),
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    pub fn update_contact(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &ContactUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let tags = update.tags.as_deref().map(tags_json).transpose()?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE contacts SET
                    name = COALESCE(?3, name),
                    phone_number = COALESCE(?4, phone_number),
                    email = COALESCE(?5, email),
                    company = COALESCE(?6, company),
                    notes = CASE WHEN ?7 IS NULL THEN notes ELSE NULLIF(?7, '') END,
                    tags = COALESCE(?8, tags),
                    updated_at = ?9
                 WHERE workspace_id = ?1 AND id = ?2",
                rusqlite::params![
                    workspace_id,
                    id,
                    update.name,
                    update.phone_number,
                    update.email,
                    update.company,
                    update.notes,
                    tags,
                    now,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            if let Some(new_tags) = &update.tags {
                replace_tags(&tx, id, workspace_id, new_tags)?;
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn delete_contact(&self, workspace_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM contacts WHERE workspace_id = ?1 AND id = ?2",
                (workspace_id, id),
            )?;
            Ok(changed > 0)
        })
    }
}

fn replace_tags(conn: &Connection, contact_id: Uuid, workspace_id: Uuid, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM contact_tags WHERE contact_id = ?1", [contact_id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO contact_tags (contact_id, workspace_id, tag) VALUES (?1, ?2, ?3)",
    )?;
    for tag in tags {
        stmt.execute((contact_id, workspace_id, tag))?;
    }
    Ok(())
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        phone_number: row.get(3)?,
        email: row.get(4)?,
        company: row.get(5)?,
        notes: row.get(6)?,
        tags: tags_at(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        created_by: creator_at(row, 10)?,
    })
}
