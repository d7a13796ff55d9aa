use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::Database;
use crate::models::{NewTemplate, TemplateRow, TemplateUpdate};
use crate::queries::{CREATOR_COLUMNS, CREATOR_JOIN, TemplateFilter, creator_at, parse_at};

fn template_select() -> String {
    format!(
        "SELECT x.id, x.workspace_id, x.name, x.kind, x.body, x.image_url,
                x.created_at, x.updated_at, {}
         FROM message_templates x
         {}",
        CREATOR_COLUMNS, CREATOR_JOIN
    )
}

impl Database {
    pub fn create_template(&self, template: &NewTemplate) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO message_templates (id, workspace_id, name, kind, body, image_url,
                                                created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    template.id,
                    template.workspace_id,
                    template.name,
                    template.kind.as_str(),
                    template.body,
                    template.image_url,
                    template.created_by,
                    template.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_template(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<TemplateRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE x.workspace_id = ?1 AND x.id = ?2", template_select());
            Ok(conn.query_row(&sql, (workspace_id, id), template_from_row).optional()?)
        })
    }

    /// Whether another template in the workspace already uses `name`.
    pub fn template_name_exists(
        &self,
        workspace_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM message_templates
                     WHERE workspace_id = ?1 AND name = ?2 AND (?3 IS NULL OR id != ?3)",
                    (workspace_id, name, exclude),
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    pub fn list_templates(
        &self,
        workspace_id: Uuid,
        filter: &TemplateFilter,
    ) -> Result<(Vec<TemplateRow>, u64)> {
        self.with_conn(|conn| {
            let pattern = filter.list.pattern();
            let kind = filter.kind.map(|k| k.as_str());
            let predicate = "x.workspace_id = ?1
                 AND (?2 IS NULL OR x.name LIKE ?2 ESCAPE '\\' OR x.body LIKE ?2 ESCAPE '\\')
                 AND (?3 IS NULL OR x.kind = ?3)";

            let sql = format!(
                "{} WHERE {} ORDER BY x.created_at DESC, x.rowid DESC LIMIT ?4 OFFSET ?5",
                template_select(),
                predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    (
                        workspace_id,
                        &pattern,
                        kind,
                        filter.list.limit,
                        filter.list.offset(),
                    ),
                    template_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM message_templates x WHERE {}", predicate),
                (workspace_id, &pattern, kind),
                |r| r.get(0),
            )?;
            Ok((rows, total))
        })
    }

    pub fn update_template(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &TemplateUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let clear_image = matches!(update.image_url, Some(None));
            let image_url = update.image_url.clone().flatten();
            let changed = conn.execute(
                "UPDATE message_templates SET
                    name = COALESCE(?3, name),
                    kind = COALESCE(?4, kind),
                    body = COALESCE(?5, body),
                    image_url = CASE WHEN ?6 THEN NULL ELSE COALESCE(?7, image_url) END,
                    updated_at = ?8
                 WHERE workspace_id = ?1 AND id = ?2",
                rusqlite::params![
                    workspace_id,
                    id,
                    update.name,
                    update.kind.map(|k| k.as_str()),
                    update.body,
                    clear_image,
                    image_url,
                    now,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_template(&self, workspace_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM message_templates WHERE workspace_id = ?1 AND id = ?2",
                (workspace_id, id),
            )?;
            Ok(changed > 0)
        })
    }
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_at(row, 3)?,
        body: row.get(4)?,
        image_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        created_by: creator_at(row, 8)?,
    })
}
