//! Store rows to wire records. Pure functions, no I/O.

use outreach_db::models::{
    CampaignListRow, CampaignRow, ContactRow, CreatorRow, LedgerEntryRow, MemberRow,
    MembershipRow, TemplateRow, UserRow, WorkspaceRow,
};
use outreach_types::api::{
    CampaignDetailBody, CampaignListItem, CampaignView, ContactView, CreatorRef, LedgerContact,
    LedgerEntryView, MembershipSummary, RecentCampaign, SendStats, TemplateDetail,
    TemplateSummary, TemplateView, UserView, WorkspaceMemberView, WorkspaceView,
};
use outreach_types::models::DeliveryStatus;

pub fn creator(row: CreatorRow) -> CreatorRef {
    CreatorRef {
        id: row.id,
        name: row.name,
        email: row.email,
    }
}

pub fn workspace(row: WorkspaceRow) -> WorkspaceView {
    WorkspaceView {
        id: row.id,
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn member(row: MemberRow) -> WorkspaceMemberView {
    WorkspaceMemberView {
        id: row.user_id,
        name: row.name,
        email: row.email,
        role: row.role,
        joined_at: row.joined_at,
    }
}

pub fn membership(row: &MembershipRow) -> MembershipSummary {
    MembershipSummary {
        id: row.workspace_id,
        name: row.workspace_name.clone(),
        role: row.role,
    }
}

pub fn user(row: UserRow) -> UserView {
    UserView {
        id: row.id,
        workspaces: row.memberships.iter().map(membership).collect(),
        name: row.name,
        email: row.email,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn contact(row: ContactRow) -> ContactView {
    ContactView {
        id: row.id,
        name: row.name,
        phone_number: row.phone_number,
        email: row.email,
        company: row.company,
        notes: row.notes,
        tags: row.tags,
        created_by: creator(row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn template(row: TemplateRow) -> TemplateView {
    TemplateView {
        id: row.id,
        name: row.name,
        kind: row.kind,
        body: row.body,
        image_url: row.image_url,
        created_by: creator(row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn campaign(row: CampaignRow, target_contacts_count: Option<u64>) -> CampaignView {
    CampaignView {
        id: row.id,
        name: row.name,
        target_tags: row.target_tags,
        template_id: row.template_id,
        status: row.status,
        target_contacts_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn campaign_list_item(row: CampaignListRow) -> CampaignListItem {
    let c = row.campaign;
    CampaignListItem {
        id: c.id,
        name: c.name,
        target_tags: c.target_tags,
        template: row.template.map(|t| TemplateSummary {
            id: t.id,
            name: t.name,
            kind: t.kind,
        }),
        status: c.status,
        created_by: creator(row.creator),
        created_at: c.created_at,
        launched_at: c.launched_at,
        messages_count: row.messages_count,
        success_count: row.success_count,
    }
}

/// Counts derived by scanning the ledger.
pub fn ledger_stats(entries: &[LedgerEntryRow]) -> SendStats {
    let sent = entries
        .iter()
        .filter(|e| e.message.status == DeliveryStatus::Sent)
        .count() as u64;
    let total = entries.len() as u64;
    SendStats {
        total,
        sent,
        failed: total - sent,
    }
}

pub fn campaign_detail_body(row: CampaignListRow, stats: SendStats) -> CampaignDetailBody {
    let c = row.campaign;
    CampaignDetailBody {
        id: c.id,
        name: c.name,
        target_tags: c.target_tags,
        template_id: c.template_id,
        template: row.template.map(|t| TemplateDetail {
            id: t.id,
            name: t.name,
            kind: t.kind,
            body: t.body,
            image_url: t.image_url,
        }),
        status: c.status,
        created_by: creator(row.creator),
        created_at: c.created_at,
        launched_at: c.launched_at,
        stats,
    }
}

pub fn ledger_entry(row: LedgerEntryRow) -> LedgerEntryView {
    let m = row.message;
    LedgerEntryView {
        id: m.id,
        contact: LedgerContact {
            id: m.contact_id,
            name: row.contact_name,
            phone_number: m.contact_phone_number,
        },
        message_body: m.message_body,
        message_image_url: m.message_image_url,
        status: m.status,
        sent_at: m.sent_at,
    }
}

pub fn recent_campaign(row: CampaignRow) -> RecentCampaign {
    RecentCampaign {
        id: row.id,
        name: row.name,
        status: row.status,
        target_tags: row.target_tags,
        created_at: row.created_at,
        launched_at: row.launched_at,
    }
}
