//! Database row types. These map directly to SQLite rows and stay distinct
//! from the outreach-types API records so the storage layer owns its shape.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use outreach_types::models::{CampaignStatus, DeliveryStatus, Role, TemplateKind};

pub struct AdminRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

pub struct WorkspaceRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub workspace_id: Uuid,
    pub workspace_name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub memberships: Vec<MembershipRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn membership(&self, workspace_id: Uuid) -> Option<&MembershipRow> {
        self.memberships.iter().find(|m| m.workspace_id == workspace_id)
    }
}

/// A user as seen from one workspace's member list.
pub struct MemberRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Creator name/email resolved against users, then admins.
pub struct CreatorRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

pub struct ContactRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub company: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_by: CreatorRow,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewContact {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub company: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

pub struct TemplateRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
    pub image_url: Option<String>,
    pub created_by: CreatorRow,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewTemplate {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
    pub image_url: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

pub struct CampaignRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub target_tags: Vec<String>,
    pub template_id: Uuid,
    pub status: CampaignStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub launched_at: Option<DateTime<Utc>>,
}

/// Template fields joined onto a campaign; absent when the template is gone.
pub struct CampaignTemplateRow {
    pub id: Uuid,
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
    pub image_url: Option<String>,
}

/// A campaign with its template and creator joined in, plus send counts
/// aggregated from the ledger.
pub struct CampaignListRow {
    pub campaign: CampaignRow,
    pub template: Option<CampaignTemplateRow>,
    pub creator: CreatorRow,
    pub messages_count: u64,
    pub success_count: u64,
}

pub struct CampaignMessageRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub contact_phone_number: String,
    pub message_body: String,
    pub message_image_url: Option<String>,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}

/// Ledger entry joined with the contact it was sent to, if that contact
/// still exists.
pub struct LedgerEntryRow {
    pub message: CampaignMessageRow,
    pub contact_name: Option<String>,
}

/// Partial contact update; `None` leaves a field untouched. An empty
/// `notes` clears the notes.
#[derive(Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Partial template update; callers validate the merged result.
#[derive(Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub kind: Option<TemplateKind>,
    pub body: Option<String>,
    /// `Some(None)` clears the image.
    pub image_url: Option<Option<String>>,
}

/// Partial draft-campaign update.
#[derive(Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub target_tags: Option<Vec<String>>,
    pub template_id: Option<Uuid>,
}

pub struct NewCampaign {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub target_tags: Vec<String>,
    pub template_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
