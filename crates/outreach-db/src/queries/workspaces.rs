use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::WorkspaceRow;
use crate::queries::ListFilter;

/// Result of a workspace delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceDeletion {
    Deleted,
    NotFound,
    /// Members must be removed first.
    HasMembers(u64),
}

impl Database {
    pub fn create_workspace(&self, id: Uuid, name: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workspaces (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                (id, name, now),
            )?;
            Ok(())
        })
    }

    pub fn get_workspace(&self, id: Uuid) -> Result<Option<WorkspaceRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, created_at, updated_at FROM workspaces WHERE id = ?1",
                    [id],
                    workspace_from_row,
                )
                .optional()?)
        })
    }

    pub fn list_workspaces(&self, filter: &ListFilter) -> Result<(Vec<WorkspaceRow>, u64)> {
        self.with_conn(|conn| {
            let pattern = filter.pattern();
            let mut stmt = conn.prepare(
                "SELECT id, name, created_at, updated_at FROM workspaces
                 WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map((&pattern, filter.limit, filter.offset()), workspace_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM workspaces WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')",
                [&pattern],
                |r| r.get(0),
            )?;
            Ok((rows, total))
        })
    }

    /// Renames the workspace and every member's cached `workspace_name` in
    /// one transaction. Returns false if the workspace does not exist.
    pub fn rename_workspace(&self, id: Uuid, name: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE workspaces SET name = ?2, updated_at = ?3 WHERE id = ?1",
                (id, name, now),
            )?;
            if changed == 0 {
                return Ok(false);
            }
            let members = tx.execute(
                "UPDATE memberships SET workspace_name = ?2 WHERE workspace_id = ?1",
                (id, name),
            )?;
            tx.commit()?;

            tracing::debug!("Workspace {} renamed; {} memberships updated", id, members);
            Ok(true)
        })
    }

    /// Deletes a workspace that has no members left. Contacts, templates,
    /// campaigns and ledger entries of the workspace go with it.
    pub fn delete_workspace(&self, id: Uuid) -> Result<WorkspaceDeletion> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let exists = tx
                .query_row("SELECT 1 FROM workspaces WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(WorkspaceDeletion::NotFound);
            }

            let members: u64 = tx.query_row(
                "SELECT COUNT(*) FROM memberships WHERE workspace_id = ?1",
                [id],
                |r| r.get(0),
            )?;
            if members > 0 {
                return Ok(WorkspaceDeletion::HasMembers(members));
            }

            tx.execute("DELETE FROM workspaces WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(WorkspaceDeletion::Deleted)
        })
    }
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use outreach_types::models::Role;

    #[test]
    fn rename_propagates_to_every_membership() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "Old Name");
        let other = fixtures::workspace(&db, "Untouched");
        let a = fixtures::member(&db, ws, "a@example.com", Role::Editor);
        let b = fixtures::member(&db, ws, "b@example.com", Role::Viewer);
        db.add_membership(b, other, Role::Viewer, Utc::now()).unwrap();

        assert!(db.rename_workspace(ws, "New Name", Utc::now()).unwrap());

        for uid in [a, b] {
            let user = db.get_user_by_id(uid).unwrap().unwrap();
            assert_eq!(user.membership(ws).unwrap().workspace_name, "New Name");
        }
        let b_user = db.get_user_by_id(b).unwrap().unwrap();
        assert_eq!(b_user.membership(other).unwrap().workspace_name, "Untouched");
        assert_eq!(db.get_workspace(ws).unwrap().unwrap().name, "New Name");
    }

    #[test]
    fn rename_of_missing_workspace_reports_false() {
        let db = fixtures::db();
        assert!(!db.rename_workspace(Uuid::new_v4(), "x", Utc::now()).unwrap());
    }

    #[test]
    fn delete_requires_members_removed_first() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "North");
        let uid = fixtures::member(&db, ws, "a@example.com", Role::Editor);
        fixtures::contact(&db, ws, "9876543210", &["vip"]);

        assert_eq!(db.delete_workspace(ws).unwrap(), WorkspaceDeletion::HasMembers(1));
        assert!(db.get_workspace(ws).unwrap().is_some());

        db.remove_membership(uid, ws).unwrap();
        assert_eq!(db.delete_workspace(ws).unwrap(), WorkspaceDeletion::Deleted);
        assert!(db.get_workspace(ws).unwrap().is_none());
        assert_eq!(db.delete_workspace(ws).unwrap(), WorkspaceDeletion::NotFound);
    }

    #[test]
    fn list_searches_case_insensitively() {
        let db = fixtures::db();
        fixtures::workspace(&db, "Marketing");
        fixtures::workspace(&db, "Sales");

        let filter = ListFilter::new(None, None, Some("market".into()));
        let (rows, total) = db.list_workspaces(&filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].name, "Marketing");
    }
}
