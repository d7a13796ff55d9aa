use anyhow::Result;
use chrono::NaiveDate;
use uuid::Uuid;

use outreach_types::models::TemplateKind;

use crate::Database;
use crate::models::CampaignRow;
use crate::queries::campaigns::campaign_from_row;

/// Inclusive day range. Timestamps are compared on their `YYYY-MM-DD` prefix.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

const RECENT_LIMIT: u32 = 5;
const TOP_TAGS_LIMIT: u32 = 5;

impl Database {
    /// Launched campaigns per launch day.
    pub fn campaigns_per_day(&self, workspace_id: Uuid, range: DateRange) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT substr(launched_at, 1, 10) AS day, COUNT(*)
                 FROM campaigns
                 WHERE workspace_id = ?1 AND launched_at IS NOT NULL
                   AND day BETWEEN ?2 AND ?3
                 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt
                .query_map((workspace_id, range.start, range.end), |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Ledger entries per day, split by whether an image went out.
    pub fn messages_per_day(
        &self,
        workspace_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<(String, TemplateKind, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT substr(sent_at, 1, 10) AS day,
                        message_image_url IS NOT NULL AS with_image,
                        COUNT(*)
                 FROM campaign_messages
                 WHERE workspace_id = ?1 AND day BETWEEN ?2 AND ?3
                 GROUP BY day, with_image ORDER BY day, with_image",
            )?;
            let rows = stmt
                .query_map((workspace_id, range.start, range.end), |r| {
                    let with_image: bool = r.get(1)?;
                    let kind = if with_image {
                        TemplateKind::TextAndImage
                    } else {
                        TemplateKind::Text
                    };
                    Ok((r.get(0)?, kind, r.get(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Distinct phone numbers messaged per day.
    pub fn contacts_reached_per_day(
        &self,
        workspace_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT substr(sent_at, 1, 10) AS day, COUNT(DISTINCT contact_phone_number)
                 FROM campaign_messages
                 WHERE workspace_id = ?1 AND day BETWEEN ?2 AND ?3
                 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt
                .query_map((workspace_id, range.start, range.end), |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn recent_campaigns(&self, workspace_id: Uuid) -> Result<Vec<CampaignRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT x.id, x.workspace_id, x.name, x.target_tags, x.template_id,
                        x.status, x.created_by, x.created_at, x.updated_at, x.launched_at
                 FROM campaigns x
                 WHERE x.workspace_id = ?1
                 ORDER BY x.created_at DESC, x.rowid DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((workspace_id, RECENT_LIMIT), campaign_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Tags carried by the most contacts, ties broken alphabetically.
    pub fn top_tags(&self, workspace_id: Uuid) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tag, COUNT(*) AS n
                 FROM contact_tags
                 WHERE workspace_id = ?1
                 GROUP BY tag ORDER BY n DESC, tag ASC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map((workspace_id, TOP_TAGS_LIMIT), |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CampaignMessageRow, NewCampaign};
    use crate::queries::fixtures;
    use chrono::{Duration, Utc};
    use outreach_types::models::{CampaignStatus, DeliveryStatus};

    fn today() -> DateRange {
        let day = Utc::now().date_naive();
        DateRange {
            start: day - Duration::days(1),
            end: day + Duration::days(1),
        }
    }

    #[test]
    fn top_tags_rank_by_contact_count() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        fixtures::contact(&db, ws, "9000000001", &["vip", "lead"]);
        fixtures::contact(&db, ws, "9000000002", &["vip"]);
        fixtures::contact(&db, ws, "9000000003", &["cold"]);

        let tags = db.top_tags(ws).unwrap();
        assert_eq!(tags[0], ("vip".to_string(), 2));
        assert_eq!(tags[1], ("cold".to_string(), 1));
        assert_eq!(tags[2], ("lead".to_string(), 1));
    }

    #[test]
    fn daily_series_count_ledger_and_launches() {
        let db = fixtures::db();
        let ws = fixtures::workspace(&db, "W");
        let template = fixtures::template(&db, ws, "T", "Hello");
        let campaign = Uuid::new_v4();
        db.create_campaign(&NewCampaign {
            id: campaign,
            workspace_id: ws,
            name: "C".into(),
            target_tags: vec!["vip".into()],
            template_id: template,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        })
        .unwrap();
        let now = Utc::now();
        db.transition_campaign(ws, campaign, CampaignStatus::Draft, CampaignStatus::Running, Some(now), now)
            .unwrap();

        let entry = |phone: &str, image: Option<&str>| CampaignMessageRow {
            id: Uuid::new_v4(),
            workspace_id: ws,
            campaign_id: campaign,
            contact_id: None,
            contact_phone_number: phone.to_string(),
            message_body: "Hello".into(),
            message_image_url: image.map(str::to_string),
            status: DeliveryStatus::Sent,
            sent_at: now,
        };
        let entries = vec![
            entry("9000000001", None),
            entry("9000000001", Some("https://cdn.example.com/a.png")),
            entry("9000000002", None),
        ];
        db.record_launch(ws, campaign, &entries, now).unwrap();

        let launched = db.campaigns_per_day(ws, today()).unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].1, 1);

        let messages = db.messages_per_day(ws, today()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!((messages[0].1, messages[0].2), (TemplateKind::Text, 2));
        assert_eq!((messages[1].1, messages[1].2), (TemplateKind::TextAndImage, 1));

        let reached = db.contacts_reached_per_day(ws, today()).unwrap();
        assert_eq!(reached[0].1, 2);

        let past = DateRange {
            start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
        };
        assert!(db.messages_per_day(ws, past).unwrap().is_empty());
        assert_eq!(db.recent_campaigns(ws).unwrap().len(), 1);
    }
}
