//! Campaign lifecycle: draft edits, launch, copy, delete and reads.
//!
//! The only concurrency control is the compare-and-swap on `status` in the
//! store. Whichever launch flips `Draft` first owns the campaign; every other
//! caller gets `InvalidState` before anything is sent.

use std::sync::Arc;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use tracing::{error, info, warn};
use uuid::Uuid;

use outreach_db::models::{
    CampaignMessageRow, CampaignRow, CampaignUpdate, ContactRow, NewCampaign,
};
use outreach_db::{CampaignFilter, Database, is_unique_violation};
use outreach_types::api::{
    CampaignDetail, CampaignListItem, CampaignView, CopyCampaignRequest, CreateCampaignRequest,
    LaunchSummary, Paginated, Pagination, SendStats, UpdateCampaignRequest,
};
use outreach_types::models::{CampaignStatus, DeliveryStatus};

use crate::error::ApiError;
use crate::sender::{MessageSender, OutboundMessage};
use crate::state::blocking;
use crate::validate;
use crate::views;

const NOT_FOUND: &str = "Campaign not found";
const TEMPLATE_NOT_FOUND: &str = "Message template not found";
const DUPLICATE_NAME: &str = "A campaign with this name already exists";
const NOT_DRAFT_LAUNCH: &str = "Only draft campaigns can be launched";
const NOT_DRAFT_UPDATE: &str = "Only draft campaigns can be updated";
const NOT_DELETABLE: &str = "A running campaign cannot be deleted";

pub struct CampaignEngine {
    db: Arc<Database>,
    sender: Arc<dyn MessageSender>,
    send_concurrency: usize,
}

impl CampaignEngine {
    pub const DEFAULT_SEND_CONCURRENCY: usize = 8;

    pub fn new(db: Arc<Database>, sender: Arc<dyn MessageSender>, send_concurrency: usize) -> Self {
        Self {
            db,
            sender,
            send_concurrency: send_concurrency.max(1),
        }
    }

    pub async fn create(
        &self,
        workspace_id: Uuid,
        created_by: Uuid,
        req: CreateCampaignRequest,
    ) -> Result<CampaignView, ApiError> {
        let name = validate::required(req.name, "Campaign name is required")?;
        let target_tags = target_tags(req.target_tags)?;
        let template_id = req
            .template_id
            .ok_or_else(|| ApiError::validation("Template is required"))?;

        let new = NewCampaign {
            id: Uuid::new_v4(),
            workspace_id,
            name,
            target_tags,
            template_id,
            created_by,
            created_at: Utc::now(),
        };
        let row = blocking(&self.db, move |db| insert_draft(db, &new)).await?;
        info!("Campaign {} created in workspace {}", row.id, workspace_id);

        let preview = self.preview_count(workspace_id, row.target_tags.clone()).await;
        Ok(views::campaign(row, preview))
    }

    pub async fn update(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        req: UpdateCampaignRequest,
    ) -> Result<CampaignView, ApiError> {
        let update = CampaignUpdate {
            name: validate::non_blank(req.name, "Campaign name cannot be empty")?,
            target_tags: req.target_tags.map(|t| target_tags(Some(t))).transpose()?,
            template_id: req.template_id,
        };

        let row = blocking(&self.db, move |db| {
            let existing = db
                .get_campaign(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
            if existing.status != CampaignStatus::Draft {
                return Err(ApiError::invalid_state(NOT_DRAFT_UPDATE));
            }
            if let Some(name) = &update.name {
                if db.campaign_name_exists(workspace_id, name, Some(id))? {
                    return Err(ApiError::conflict(DUPLICATE_NAME));
                }
            }
            if let Some(template_id) = update.template_id {
                if db.get_template(workspace_id, template_id)?.is_none() {
                    return Err(ApiError::not_found(TEMPLATE_NOT_FOUND));
                }
            }

            let applied = db
                .update_draft_campaign(workspace_id, id, &update, Utc::now())
                .map_err(|e| unique_as_conflict(e, DUPLICATE_NAME))?;
            if !applied {
                // Launched between the read and the write.
                return Err(ApiError::invalid_state(NOT_DRAFT_UPDATE));
            }
            db.get_campaign(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))
        })
        .await?;
        info!("Campaign {} updated", id);

        let preview = self.preview_count(workspace_id, row.target_tags.clone()).await;
        Ok(views::campaign(row, preview))
    }

    /// New draft with the source's tags and template. Without a name the copy
    /// is called "<source> (Copy)".
    pub async fn copy(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        created_by: Uuid,
        req: CopyCampaignRequest,
    ) -> Result<CampaignView, ApiError> {
        let name = validate::non_blank(req.name, "Campaign name cannot be empty")?;

        let row = blocking(&self.db, move |db| {
            let source = db
                .get_campaign(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
            let new = NewCampaign {
                id: Uuid::new_v4(),
                workspace_id,
                name: name.unwrap_or_else(|| format!("{} (Copy)", source.name)),
                target_tags: source.target_tags,
                template_id: source.template_id,
                created_by,
                created_at: Utc::now(),
            };
            insert_draft(db, &new)
        })
        .await?;
        info!("Campaign {} copied to {}", id, row.id);

        let preview = self.preview_count(workspace_id, row.target_tags.clone()).await;
        Ok(views::campaign(row, preview))
    }

    /// Removes the campaign record. Running campaigns are refused; the ledger
    /// is left in place.
    pub async fn delete(&self, workspace_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        blocking(&self.db, move |db| {
            let existing = db
                .get_campaign(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
            if existing.status == CampaignStatus::Running {
                return Err(ApiError::invalid_state(NOT_DELETABLE));
            }
            if !db.delete_campaign(workspace_id, id)? {
                return Err(delete_refusal(db, workspace_id, id)?);
            }
            Ok(())
        })
        .await?;
        info!("Campaign {} deleted", id);
        Ok(())
    }

    pub async fn get(&self, workspace_id: Uuid, id: Uuid) -> Result<CampaignDetail, ApiError> {
        blocking(&self.db, move |db| {
            let summary = db
                .get_campaign_summary(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
            let ledger = db.get_campaign_ledger(workspace_id, id)?;
            let stats = views::ledger_stats(&ledger);
            Ok(CampaignDetail {
                campaign: views::campaign_detail_body(summary, stats),
                messages: ledger.into_iter().map(views::ledger_entry).collect(),
            })
        })
        .await
    }

    pub async fn list(
        &self,
        workspace_id: Uuid,
        filter: CampaignFilter,
    ) -> Result<Paginated<CampaignListItem>, ApiError> {
        blocking(&self.db, move |db| {
            let (rows, total) = db.list_campaigns(workspace_id, &filter)?;
            Ok(Paginated {
                data: rows.into_iter().map(views::campaign_list_item).collect(),
                pagination: Pagination::new(filter.list.page, filter.list.limit, total),
            })
        })
        .await
    }

    /// Targets every contact carrying any of the campaign's tags, sends the
    /// template to each and records one ledger entry per contact.
    pub async fn launch(&self, workspace_id: Uuid, id: Uuid) -> Result<LaunchSummary, ApiError> {
        let campaign = blocking(&self.db, move |db| {
            db.get_campaign(workspace_id, id)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND))
        })
        .await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(ApiError::invalid_state(NOT_DRAFT_LAUNCH));
        }

        let tags = campaign.target_tags.clone();
        let contacts = blocking(&self.db, move |db| {
            Ok(db.get_contacts_by_tags(workspace_id, &tags)?)
        })
        .await?;

        let launched_at = Utc::now();
        if contacts.is_empty() {
            self.transition(workspace_id, id, CampaignStatus::Completed, launched_at)
                .await?;
            info!("Campaign {} matched no contacts; completed without sending", id);
            return Ok(LaunchSummary {
                id,
                status: CampaignStatus::Completed,
                launched_at,
                stats: SendStats::default(),
            });
        }

        self.transition(workspace_id, id, CampaignStatus::Running, launched_at)
            .await?;
        info!("Campaign {} running: {} contacts targeted", id, contacts.len());

        // Detached: dropping the request must not stop a Running campaign.
        let run = tokio::spawn(run_launch(
            self.db.clone(),
            self.sender.clone(),
            self.send_concurrency,
            campaign,
            contacts,
        ));
        let stats = run.await.map_err(|e| {
            error!("Launch task for campaign {} did not finish: {}", id, e);
            ApiError::Internal(e.into())
        })??;

        Ok(LaunchSummary {
            id,
            status: CampaignStatus::Completed,
            launched_at,
            stats,
        })
    }

    /// Draft -> `to`, or `InvalidState` when another launch got there first.
    async fn transition(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        to: CampaignStatus,
        launched_at: chrono::DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let won = blocking(&self.db, move |db| {
            Ok(db.transition_campaign(
                workspace_id,
                id,
                CampaignStatus::Draft,
                to,
                Some(launched_at),
                Utc::now(),
            )?)
        })
        .await?;
        if !won {
            warn!("Campaign {} left Draft before this launch could claim it", id);
            return Err(ApiError::invalid_state(NOT_DRAFT_LAUNCH));
        }
        Ok(())
    }

    /// Advisory audience size. Never fails the calling operation.
    async fn preview_count(&self, workspace_id: Uuid, tags: Vec<String>) -> Option<u64> {
        let result = blocking(&self.db, move |db| {
            Ok(db.count_contacts_by_tags(workspace_id, &tags)?)
        })
        .await;
        match result {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Target contact preview failed: {}", e);
                None
            }
        }
    }
}

/// Sends to every targeted contact and writes the ledger. Runs detached from
/// the request once the campaign is `Running`.
async fn run_launch(
    db: Arc<Database>,
    sender: Arc<dyn MessageSender>,
    send_concurrency: usize,
    campaign: CampaignRow,
    contacts: Vec<ContactRow>,
) -> Result<SendStats, ApiError> {
    let (workspace_id, id, template_id) = (campaign.workspace_id, campaign.id, campaign.template_id);

    let template = match blocking(&db, move |db| Ok(db.get_template(workspace_id, template_id)?)).await
    {
        Ok(Some(t)) => t,
        Ok(None) => {
            error!("Campaign {} lost its template {} before sending", id, template_id);
            mark_failed(&db, workspace_id, id).await;
            return Err(ApiError::not_found(TEMPLATE_NOT_FOUND));
        }
        Err(e) => {
            mark_failed(&db, workspace_id, id).await;
            return Err(e);
        }
    };

    // Template is read once; every message carries this snapshot.
    let outbound: Vec<OutboundMessage> = contacts
        .iter()
        .map(|c| OutboundMessage {
            phone_number: c.phone_number.clone(),
            body: template.body.clone(),
            image_url: template.image_url.clone(),
        })
        .collect();

    let outcomes: Vec<DeliveryStatus> = stream::iter(outbound.clone())
        .map(|message| {
            let sender = sender.clone();
            async move { sender.send(&message).await }
        })
        .buffered(send_concurrency)
        .collect()
        .await;

    let sent_at = Utc::now();
    let ledger: Vec<CampaignMessageRow> = contacts
        .iter()
        .zip(outbound)
        .zip(outcomes)
        .map(|((contact, message), status)| CampaignMessageRow {
            id: Uuid::new_v4(),
            workspace_id,
            campaign_id: id,
            contact_id: Some(contact.id),
            contact_phone_number: message.phone_number,
            message_body: message.body,
            message_image_url: message.image_url,
            status,
            sent_at,
        })
        .collect();
    let stats = tally(&ledger);

    let recorded = blocking(&db, move |db| {
        Ok(db.record_launch(workspace_id, id, &ledger, Utc::now())?)
    })
    .await;
    match recorded {
        Ok(true) => {}
        Ok(false) => {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "campaign {} left Running before its ledger was written",
                id
            )));
        }
        Err(e) => {
            error!("Failed to record ledger for campaign {}", id);
            mark_failed(&db, workspace_id, id).await;
            return Err(e);
        }
    }

    info!(
        "Campaign {} completed: {} sent, {} failed of {}",
        id, stats.sent, stats.failed, stats.total
    );
    Ok(stats)
}

async fn mark_failed(db: &Arc<Database>, workspace_id: Uuid, id: Uuid) {
    let result = blocking(db, move |db| {
        Ok(db.transition_campaign(
            workspace_id,
            id,
            CampaignStatus::Running,
            CampaignStatus::Failed,
            None,
            Utc::now(),
        )?)
    })
    .await;
    match result {
        Ok(true) => warn!("Campaign {} marked Failed", id),
        Ok(false) => warn!("Campaign {} was not Running; status left as is", id),
        Err(e) => error!("Could not mark campaign {} as Failed: {}", id, e),
    }
}

/// Why a delete matched no row: the campaign is gone, or it started running
/// after it was read.
fn delete_refusal(db: &Database, workspace_id: Uuid, id: Uuid) -> Result<ApiError, ApiError> {
    Ok(match db.get_campaign(workspace_id, id)? {
        Some(row) if row.status == CampaignStatus::Running => ApiError::invalid_state(NOT_DELETABLE),
        _ => ApiError::not_found(NOT_FOUND),
    })
}

fn target_tags(tags: Option<Vec<String>>) -> Result<Vec<String>, ApiError> {
    let tags = validate::normalize_tags(tags.unwrap_or_default());
    if tags.is_empty() {
        return Err(ApiError::validation("Target tags must be a non-empty array"));
    }
    Ok(tags)
}

fn insert_draft(db: &Database, new: &NewCampaign) -> Result<CampaignRow, ApiError> {
    if db.get_template(new.workspace_id, new.template_id)?.is_none() {
        return Err(ApiError::not_found(TEMPLATE_NOT_FOUND));
    }
    if db.campaign_name_exists(new.workspace_id, &new.name, None)? {
        return Err(ApiError::conflict(DUPLICATE_NAME));
    }
    db.create_campaign(new)
        .map_err(|e| unique_as_conflict(e, DUPLICATE_NAME))?;
    db.get_campaign(new.workspace_id, new.id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("campaign {} missing after insert", new.id)))
}

pub(crate) fn unique_as_conflict(err: anyhow::Error, message: &str) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::conflict(message)
    } else {
        ApiError::Internal(err)
    }
}

fn tally(ledger: &[CampaignMessageRow]) -> SendStats {
    let sent = ledger
        .iter()
        .filter(|m| m.status == DeliveryStatus::Sent)
        .count() as u64;
    let total = ledger.len() as u64;
    SendStats {
        total,
        sent,
        failed: total - sent,
    }
}
