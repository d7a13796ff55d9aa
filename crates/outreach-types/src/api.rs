use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CampaignStatus, DeliveryStatus, Role, TemplateKind, TokenRole, TokenType};

// -- JWT Claims --

/// Claims shared by both token kinds. Access tokens carry the workspace and
/// role; selection tokens carry only identity plus `tempAccess`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TokenRole>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temp_access: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: Uuid,
    pub name: String,
}

// -- Shared --

#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        let limit = limit.max(1);
        Self {
            current_page: page,
            total_pages: total_items.div_ceil(limit as u64) as u32,
            total_items,
            limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// `page`, `limit` and `search` as accepted by every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

/// Who created a record. Name and email are absent when the creator account
/// no longer exists.
#[derive(Debug, Clone, Serialize)]
pub struct CreatorRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub email: String,
    pub role: TokenRole,
    #[serde(rename = "type")]
    pub principal_type: TokenType,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub message: String,
    pub token: String,
    pub user: AdminProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub workspaces: Vec<MembershipSummary>,
}

/// Exactly one of `access_token` (single membership) or `temp_token`
/// (several memberships) is present.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelectWorkspaceRequest {
    pub workspace_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub workspace_id: Uuid,
    pub workspace: WorkspaceRef,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct SelectWorkspaceResponse {
    pub message: String,
    pub token: String,
    pub user: SelectedUser,
}

// -- Workspaces --

#[derive(Debug, Deserialize)]
pub struct WorkspaceRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub message: String,
    pub workspace: WorkspaceView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDetail {
    #[serde(flatten)]
    pub workspace: WorkspaceView,
    pub users_count: u64,
    pub users: Vec<WorkspaceMemberView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMemberView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceMemberResponse {
    pub message: String,
    pub user: WorkspaceMemberView,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkspaceUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignWorkspaceRequest {
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub workspaces: Vec<MembershipSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserView,
}

// -- Contacts --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    /// Comma-separated; a contact matches when it carries any of them.
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub company: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_by: CreatorRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub contact: ContactView,
}

// -- Message templates --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub body: String,
    pub image_url: Option<String>,
    pub created_by: CreatorRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub message: String,
    pub template: TemplateView,
}

// -- Campaigns --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    pub target_tags: Option<Vec<String>>,
    pub template_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub target_tags: Option<Vec<String>>,
    pub template_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CopyCampaignRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendStats {
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Returned by create, update and copy. `targetContactsCount` is an advisory
/// preview; it is `null` when it could not be computed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    pub id: Uuid,
    pub name: String,
    pub target_tags: Vec<String>,
    pub template_id: Uuid,
    pub status: CampaignStatus,
    pub target_contacts_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub message: String,
    pub campaign: CampaignView,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignListItem {
    pub id: Uuid,
    pub name: String,
    pub target_tags: Vec<String>,
    /// `None` when the template has been deleted since.
    pub template: Option<TemplateSummary>,
    pub status: CampaignStatus,
    pub created_by: CreatorRef,
    pub created_at: DateTime<Utc>,
    pub launched_at: Option<DateTime<Utc>>,
    pub messages_count: u64,
    pub success_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDetail {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub body: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetailBody {
    pub id: Uuid,
    pub name: String,
    pub target_tags: Vec<String>,
    pub template_id: Uuid,
    pub template: Option<TemplateDetail>,
    pub status: CampaignStatus,
    pub created_by: CreatorRef,
    pub created_at: DateTime<Utc>,
    pub launched_at: Option<DateTime<Utc>>,
    pub stats: SendStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerContact {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryView {
    pub id: Uuid,
    pub contact: LedgerContact,
    pub message_body: String,
    pub message_image_url: Option<String>,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    pub campaign: CampaignDetailBody,
    pub messages: Vec<LedgerEntryView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSummary {
    pub id: Uuid,
    pub status: CampaignStatus,
    pub launched_at: DateTime<Utc>,
    pub stats: SendStats,
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub message: String,
    pub campaign: LaunchSummary,
}

// -- Analytics --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTypeCount {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    pub tag: String,
    pub contact_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCampaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub target_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub launched_at: Option<DateTime<Utc>>,
}
