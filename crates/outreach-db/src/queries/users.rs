use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use outreach_types::models::Role;

use crate::Database;
use crate::models::{MemberRow, MembershipRow, UserRow};
use crate::queries::{ListFilter, parse_at};

const USER_COLUMNS: &str = "id, name, email, password, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (id, name, email, password_hash, now),
            )?;
            Ok(())
        })
    }

    /// Creates a user already holding one membership, in one transaction.
    pub fn create_user_in_workspace(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        workspace_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, name, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                (id, name, email, password_hash, now),
            )?;
            let added = insert_membership(&tx, id, workspace_id, role, now)?;
            if added {
                tx.commit()?;
            }
            Ok(added)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
            let user = conn.query_row(&sql, [email], user_from_row).optional()?;
            user.map(|u| with_memberships(conn, u)).transpose()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
            let user = conn.query_row(&sql, [id], user_from_row).optional()?;
            user.map(|u| with_memberships(conn, u)).transpose()
        })
    }

    /// Newest first; `search` matches name or email.
    pub fn list_users(&self, filter: &ListFilter) -> Result<(Vec<UserRow>, u64)> {
        self.with_conn(|conn| {
            let pattern = filter.pattern();
            let sql = format!(
                "SELECT {} FROM users
                 WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\')
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((&pattern, filter.limit, filter.offset()), user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM users
                 WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\')",
                [&pattern],
                |r| r.get(0),
            )?;

            let users = rows
                .into_iter()
                .map(|u| with_memberships(conn, u))
                .collect::<Result<Vec<_>>>()?;
            Ok((users, total))
        })
    }

    /// Users holding no membership in `workspace_id`, for assignment pickers.
    pub fn list_users_not_in_workspace(
        &self,
        workspace_id: Uuid,
        filter: &ListFilter,
    ) -> Result<(Vec<UserRow>, u64)> {
        self.with_conn(|conn| {
            let pattern = filter.pattern();
            let predicate = "NOT EXISTS (SELECT 1 FROM memberships m
                                         WHERE m.user_id = users.id AND m.workspace_id = ?1)
                 AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\\' OR email LIKE ?2 ESCAPE '\\')";
            let sql = format!(
                "SELECT {} FROM users WHERE {} ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
                USER_COLUMNS, predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    (workspace_id, &pattern, filter.limit, filter.offset()),
                    user_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users WHERE {}", predicate),
                (workspace_id, &pattern),
                |r| r.get(0),
            )?;

            let users = rows
                .into_iter()
                .map(|u| with_memberships(conn, u))
                .collect::<Result<Vec<_>>>()?;
            Ok((users, total))
        })
    }

    /// Partial update; `None` leaves a field untouched. Returns false if the
    /// user does not exist.
    pub fn update_user(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    email = COALESCE(?3, email),
                    password = COALESCE(?4, password),
                    updated_at = ?5
                 WHERE id = ?1",
                (id, name, email, password_hash, now),
            )?;
            Ok(changed > 0)
        })
    }

    /// Memberships go with the user (ON DELETE CASCADE).
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Memberships --

    /// Returns false when the workspace does not exist.
    pub fn add_membership(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| insert_membership(conn, user_id, workspace_id, role, now))
    }

    pub fn remove_membership(&self, user_id: Uuid, workspace_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM memberships WHERE user_id = ?1 AND workspace_id = ?2",
                (user_id, workspace_id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Updates a member's display name and/or role. Returns false when the
    /// user is not a member of the workspace.
    pub fn update_workspace_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        name: Option<&str>,
        role: Option<Role>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let is_member = tx
                .query_row(
                    "SELECT 1 FROM memberships WHERE user_id = ?1 AND workspace_id = ?2",
                    (user_id, workspace_id),
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !is_member {
                return Ok(false);
            }

            if let Some(role) = role {
                tx.execute(
                    "UPDATE memberships SET role = ?3 WHERE user_id = ?1 AND workspace_id = ?2",
                    (user_id, workspace_id, role.as_str()),
                )?;
            }
            if let Some(name) = name {
                tx.execute(
                    "UPDATE users SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    (user_id, name, now),
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn list_workspace_members(
        &self,
        workspace_id: Uuid,
        filter: &ListFilter,
    ) -> Result<(Vec<MemberRow>, u64)> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, m.role, m.joined_at
                 FROM memberships m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.workspace_id = ?1
                 ORDER BY m.joined_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map((workspace_id, filter.limit, filter.offset()), member_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let total = count_members(conn, workspace_id)?;
            Ok((rows, total))
        })
    }

    pub fn get_workspace_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT u.id, u.name, u.email, m.role, m.joined_at
                     FROM memberships m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.workspace_id = ?1 AND m.user_id = ?2",
                    (workspace_id, user_id),
                    member_from_row,
                )
                .optional()?)
        })
    }

    pub fn count_workspace_members(&self, workspace_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| count_members(conn, workspace_id))
    }
}

fn insert_membership(
    conn: &Connection,
    user_id: Uuid,
    workspace_id: Uuid,
    role: Role,
    now: DateTime<Utc>,
) -> Result<bool> {
    // Copies the current workspace name; zero rows when the workspace is missing
    let changed = conn.execute(
        "INSERT INTO memberships (user_id, workspace_id, workspace_name, role, joined_at)
         SELECT ?1, id, name, ?3, ?4 FROM workspaces WHERE id = ?2",
        (user_id, workspace_id, role.as_str(), now),
    )?;
    Ok(changed > 0)
}

fn count_members(conn: &Connection, workspace_id: Uuid) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE workspace_id = ?1",
        [workspace_id],
        |r| r.get(0),
    )?)
}

fn with_memberships(conn: &Connection, mut user: UserRow) -> Result<UserRow> {
    let mut stmt = conn.prepare_cached(
        "SELECT workspace_id, workspace_name, role, joined_at
         FROM memberships
         WHERE user_id = ?1
         ORDER BY joined_at ASC",
    )?;
    user.memberships = stmt
        .query_map([user.id], |row| {
            Ok(MembershipRow {
                workspace_id: row.get(0)?,
                workspace_name: row.get(1)?,
                role: parse_at(row, 2)?,
                joined_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(user)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        memberships: Vec::new(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        user_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_at(row, 3)?,
        joined_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn memberships_are_loaded_with_the_user() {
        let db = fixtures::db();
        let w1 = fixtures::workspace(&db, "North");
        let w2 = fixtures::workspace(&db, "South");
        let uid = fixtures::member(&db, w1, "ana@example.com", Role::Editor);
        db.add_membership(uid, w2, Role::Viewer, Utc::now()).unwrap();

        let user = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(user.memberships.len(), 2);
        assert_eq!(user.membership(w1).unwrap().role, Role::Editor);
        assert_eq!(user.membership(w2).unwrap().workspace_name, "South");
    }

    #[test]
    fn membership_to_missing_workspace_is_rejected() {
        let db = fixtures::db();
        let uid = fixtures::user(&db, "bo@example.com");
        assert!(!db.add_membership(uid, Uuid::new_v4(), Role::Viewer, Utc::now()).unwrap());
    }

    #[test]
    fn deleting_a_user_drops_memberships() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "North");
        let uid = fixtures::member(&db, ws, "cy@example.com", Role::Viewer);
        assert_eq!(db.count_workspace_members(ws).unwrap(), 1);

        assert!(db.delete_user(uid).unwrap());
        assert_eq!(db.count_workspace_members(ws).unwrap(), 0);
    }

    #[test]
    fn not_in_workspace_excludes_members() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "North");
        fixtures::member(&db, ws, "in@example.com", Role::Viewer);
        let outsider = fixtures::user(&db, "out@example.com");

        let (users, total) = db
            .list_users_not_in_workspace(ws, &ListFilter::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].id, outsider);
    }

    #[test]
    fn member_update_changes_role_and_name() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "North");
        let uid = fixtures::member(&db, ws, "dee@example.com", Role::Viewer);

        assert!(db
            .update_workspace_member(ws, uid, Some("Dee"), Some(Role::Editor), Utc::now())
            .unwrap());
        let member = db.get_workspace_member(ws, uid).unwrap().unwrap();
        assert_eq!(member.role, Role::Editor);
        assert_eq!(member.name, "Dee");

        let other_ws = fixtures::workspace(&db, "South");
        assert!(!db
            .update_workspace_member(other_ws, uid, None, Some(Role::Editor), Utc::now())
            .unwrap());
    }
}
