use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use outreach_types::models::CampaignStatus;

use crate::Database;
use crate::models::{
    CampaignListRow, CampaignRow, CampaignTemplateRow, CampaignUpdate, NewCampaign,
};
use crate::queries::{
    CREATOR_COLUMNS, CREATOR_JOIN, CampaignFilter, creator_at, parse_at, tags_at, tags_json,
};

const CAMPAIGN_COLUMNS: &str = "x.id, x.workspace_id, x.name, x.target_tags, x.template_id,
     x.status, x.created_by, x.created_at, x.updated_at, x.launched_at";

/// Campaign columns, then template (10..15), creator (15..18) and ledger
/// aggregates (18, 19).
fn campaign_list_select() -> String {
    format!(
        "SELECT {}, t.id, t.name, t.kind, t.body, t.image_url, {},
                (SELECT COUNT(*) FROM campaign_messages m WHERE m.campaign_id = x.id),
                (SELECT COUNT(*) FROM campaign_messages m
                  WHERE m.campaign_id = x.id AND m.status = 'Sent')
         FROM campaigns x
         LEFT JOIN message_templates t ON t.id = x.template_id AND t.workspace_id = x.workspace_id
         {}",
        CAMPAIGN_COLUMNS, CREATOR_COLUMNS, CREATOR_JOIN
    )
}

impl Database {
    pub fn create_campaign(&self, campaign: &NewCampaign) -> Result<()> {
        let tags = tags_json(&campaign.target_tags)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO campaigns (id, workspace_id, name, target_tags, template_id,
                                        status, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    campaign.id,
                    campaign.workspace_id,
                    campaign.name,
                    tags,
                    campaign.template_id,
                    CampaignStatus::Draft.as_str(),
                    campaign.created_by,
                    campaign.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_campaign(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM campaigns x WHERE x.workspace_id = ?1 AND x.id = ?2",
                CAMPAIGN_COLUMNS
            );
            Ok(conn.query_row(&sql, (workspace_id, id), campaign_from_row).optional()?)
        })
    }

    /// Campaign with template, creator and ledger counts joined in.
    pub fn get_campaign_summary(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CampaignListRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE x.workspace_id = ?1 AND x.id = ?2",
                campaign_list_select()
            );
            Ok(conn.query_row(&sql, (workspace_id, id), campaign_list_from_row).optional()?)
        })
    }

    pub fn campaign_name_exists(
        &self,
        workspace_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM campaigns
                     WHERE workspace_id = ?1 AND name = ?2 AND (?3 IS NULL OR id != ?3)",
                    (workspace_id, name, exclude),
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    pub fn list_campaigns(
        &self,
        workspace_id: Uuid,
        filter: &CampaignFilter,
    ) -> Result<(Vec<CampaignListRow>, u64)> {
        self.with_conn(|conn| {
            let pattern = filter.list.pattern();
            let status = filter.status.map(|s| s.as_str());
            let predicate = "x.workspace_id = ?1
                 AND (?2 IS NULL OR x.name LIKE ?2 ESCAPE '\\')
                 AND (?3 IS NULL OR x.status = ?3)";

            let sql = format!(
                "{} WHERE {} ORDER BY x.created_at DESC, x.rowid DESC LIMIT ?4 OFFSET ?5",
                campaign_list_select(),
                predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    (
                        workspace_id,
                        &pattern,
                        status,
                        filter.list.limit,
                        filter.list.offset(),
                    ),
                    campaign_list_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM campaigns x WHERE {}", predicate),
                (workspace_id, &pattern, status),
                |r| r.get(0),
            )?;
            Ok((rows, total))
        })
    }

    /// Applies `update` only while the campaign is still a draft. Returns
    /// false when the campaign is missing or has left `Draft`.
    pub fn update_draft_campaign(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &CampaignUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let tags = update.target_tags.as_deref().map(tags_json).transpose()?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE campaigns SET
                    name = COALESCE(?3, name),
                    target_tags = COALESCE(?4, target_tags),
                    template_id = COALESCE(?5, template_id),
                    updated_at = ?6
                 WHERE workspace_id = ?1 AND id = ?2 AND status = 'Draft'",
                rusqlite::params![workspace_id, id, update.name, tags, update.template_id, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Compare-and-swap on `status`: moves the campaign from `from` to `to`
    /// only if it is still in `from`. `launched_at`, when given, is stamped
    /// in the same statement.
    pub fn transition_campaign(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        launched_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE campaigns SET
                    status = ?4,
                    launched_at = COALESCE(?5, launched_at),
                    updated_at = ?6
                 WHERE workspace_id = ?1 AND id = ?2 AND status = ?3",
                rusqlite::params![workspace_id, id, from.as_str(), to.as_str(), launched_at, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes a campaign unless it is mid-launch. Its ledger entries are kept.
    pub fn delete_campaign(&self, workspace_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM campaigns
                 WHERE workspace_id = ?1 AND id = ?2 AND status != 'Running'",
                (workspace_id, id),
            )?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        target_tags: tags_at(row, 3)?,
        template_id: row.get(4)?,
        status: parse_at(row, 5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        launched_at: row.get(9)?,
    })
}

fn campaign_list_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignListRow> {
    let template_id: Option<Uuid> = row.get(10)?;
    let template = match template_id {
        Some(id) => Some(CampaignTemplateRow {
            id,
            name: row.get(11)?,
            kind: parse_at(row, 12)?,
            body: row.get(13)?,
            image_url: row.get(14)?,
        }),
        None => None,
    };

    Ok(CampaignListRow {
        campaign: campaign_from_row(row)?,
        template,
        creator: creator_at(row, 15)?,
        messages_count: row.get(18)?,
        success_count: row.get(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{ListFilter, fixtures};

    fn draft(db: &Database, ws: Uuid, name: &str, template_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        db.create_campaign(&NewCampaign {
            id,
            workspace_id: ws,
            name: name.to_string(),
            target_tags: vec!["vip".into()],
            template_id,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        })
        .unwrap();
        id
    }

    #[test]
    fn status_transition_is_compare_and_swap() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let t = fixtures::template(&db, ws, "T", "Hello");
        let id = draft(&db, ws, "Spring", t);
        let now = Utc::now();

        let first = db
            .transition_campaign(ws, id, CampaignStatus::Draft, CampaignStatus::Running, Some(now), now)
            .unwrap();
        let second = db
            .transition_campaign(ws, id, CampaignStatus::Draft, CampaignStatus::Running, Some(now), now)
            .unwrap();
        assert!(first);
        assert!(!second);

        let row = db.get_campaign(ws, id).unwrap().unwrap();
        assert_eq!(row.status, CampaignStatus::Running);
        assert!(row.launched_at.is_some());
    }

    #[test]
    fn draft_update_refused_after_launch() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let t = fixtures::template(&db, ws, "T", "Hello");
        let id = draft(&db, ws, "Spring", t);

        let rename = CampaignUpdate {
            name: Some("Summer".into()),
            ..Default::default()
        };
        assert!(db.update_draft_campaign(ws, id, &rename, Utc::now()).unwrap());
        assert_eq!(db.get_campaign(ws, id).unwrap().unwrap().name, "Summer");

        let now = Utc::now();
        db.transition_campaign(ws, id, CampaignStatus::Draft, CampaignStatus::Completed, Some(now), now)
            .unwrap();
        let again = CampaignUpdate {
            name: Some("Autumn".into()),
            ..Default::default()
        };
        assert!(!db.update_draft_campaign(ws, id, &again, Utc::now()).unwrap());
        assert_eq!(db.get_campaign(ws, id).unwrap().unwrap().name, "Summer");
    }

    #[test]
    fn running_campaign_cannot_be_deleted() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let t = fixtures::template(&db, ws, "T", "Hello");
        let id = draft(&db, ws, "Spring", t);
        let now = Utc::now();
        db.transition_campaign(ws, id, CampaignStatus::Draft, CampaignStatus::Running, Some(now), now)
            .unwrap();

        assert!(!db.delete_campaign(ws, id).unwrap());
        db.transition_campaign(ws, id, CampaignStatus::Running, CampaignStatus::Completed, None, now)
            .unwrap();
        assert!(db.delete_campaign(ws, id).unwrap());
        assert!(db.get_campaign(ws, id).unwrap().is_none());
    }

    #[test]
    fn summary_survives_deleted_template() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let t = fixtures::template(&db, ws, "T", "Hello");
        let id = draft(&db, ws, "Spring", t);

        let summary = db.get_campaign_summary(ws, id).unwrap().unwrap();
        assert_eq!(summary.template.unwrap().body, "Hello");
        assert_eq!(summary.messages_count, 0);

        db.delete_template(ws, t).unwrap();
        let summary = db.get_campaign_summary(ws, id).unwrap().unwrap();
        assert!(summary.template.is_none());
        assert_eq!(summary.campaign.template_id, t);
    }

    #[test]
    fn list_filters_by_status_and_name() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let t = fixtures::template(&db, ws, "T", "Hello");
        draft(&db, ws, "Spring sale", t);
        let done = draft(&db, ws, "Winter sale", t);
        let now = Utc::now();
        db.transition_campaign(ws, done, CampaignStatus::Draft, CampaignStatus::Completed, Some(now), now)
            .unwrap();

        let filter = CampaignFilter {
            list: ListFilter::new(None, None, Some("sale".into())),
            status: Some(CampaignStatus::Draft),
        };
        let (rows, total) = db.list_campaigns(ws, &filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].campaign.name, "Spring sale");

        assert!(db.campaign_name_exists(ws, "Winter sale", None).unwrap());
        assert!(!db.campaign_name_exists(ws, "Winter sale", Some(done)).unwrap());
    }
}
