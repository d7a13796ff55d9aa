use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use outreach_types::models::CampaignStatus;

use crate::Database;
use crate::models::{CampaignMessageRow, LedgerEntryRow};
use crate::queries::parse_at;

impl Database {
    /// Appends the launch's ledger entries and moves the campaign from
    /// `Running` to `Completed` in one transaction.
    ///
    /// Returns whether the status moved; the entries are committed either
    /// way since the sends have already happened.
    pub fn record_launch(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
        messages: &[CampaignMessageRow],
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO campaign_messages (id, workspace_id, campaign_id, contact_id,
                                                    contact_phone_number, message_body,
                                                    message_image_url, status, sent_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for m in messages {
                    stmt.execute(rusqlite::params![
                        m.id,
                        m.workspace_id,
                        m.campaign_id,
                        m.contact_id,
                        m.contact_phone_number,
                        m.message_body,
                        m.message_image_url,
                        m.status.as_str(),
                        m.sent_at,
                    ])?;
                }
            }

            let changed = tx.execute(
                "UPDATE campaigns SET status = ?3, updated_at = ?4
                 WHERE workspace_id = ?1 AND id = ?2 AND status = ?5",
                rusqlite::params![
                    workspace_id,
                    campaign_id,
                    CampaignStatus::Completed.as_str(),
                    now,
                    CampaignStatus::Running.as_str(),
                ],
            )?;
            tx.commit()?;

            tracing::debug!(
                "Recorded {} ledger entries for campaign {}",
                messages.len(),
                campaign_id
            );
            Ok(changed > 0)
        })
    }

    /// Full ledger of one campaign in send order, with the contact's current
    /// name when the contact still exists.
    pub fn get_campaign_ledger(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<LedgerEntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.workspace_id, m.campaign_id, m.contact_id,
                        m.contact_phone_number, m.message_body, m.message_image_url,
                        m.status, m.sent_at, c.name
                 FROM campaign_messages m
                 LEFT JOIN contacts c ON c.id = m.contact_id
                 WHERE m.workspace_id = ?1 AND m.campaign_id = ?2
                 ORDER BY m.sent_at ASC, m.rowid ASC",
            )?;
            let rows = stmt
                .query_map((workspace_id, campaign_id), |row| {
                    Ok(LedgerEntryRow {
                        message: message_from_row(row)?,
                        contact_name: row.get(9)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignMessageRow> {
    Ok(CampaignMessageRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        campaign_id: row.get(2)?,
        contact_id: row.get(3)?,
        contact_phone_number: row.get(4)?,
        message_body: row.get(5)?,
        message_image_url: row.get(6)?,
        status: parse_at(row, 7)?,
        sent_at: row.get(8)?,
    })
}
