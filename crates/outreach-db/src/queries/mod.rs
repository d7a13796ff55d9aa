mod admins;
mod analytics;
mod campaign_messages;
mod campaigns;
mod contacts;
mod templates;
mod users;
mod workspaces;

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

use outreach_types::models::{CampaignStatus, TemplateKind};

use crate::models::CreatorRow;

pub use analytics::DateRange;
pub use workspaces::WorkspaceDeletion;

/// Paging plus free-text search shared by every list query.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl ListFilter {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>, search: Option<String>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// LIKE pattern for `search`, with `%`, `_` and `\` escaped.
    fn pattern(&self) -> Option<String> {
        self.search.as_deref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}

impl Default for ListFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub list: ListFilter,
    /// Union match: any listed tag qualifies. Empty means no tag filter.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub list: ListFilter,
    pub kind: Option<TemplateKind>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub list: ListFilter,
    pub status: Option<CampaignStatus>,
}

/// Resolves `created_by` against users first, then admins.
const CREATOR_JOIN: &str = "LEFT JOIN users cu ON cu.id = x.created_by
         LEFT JOIN admins ca ON ca.id = x.created_by";

const CREATOR_COLUMNS: &str = "x.created_by, cu.name, COALESCE(cu.email, ca.email)";

fn creator_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<CreatorRow> {
    Ok(CreatorRow {
        id: row.get(idx)?,
        name: row.get(idx + 1)?,
        email: row.get(idx + 2)?,
    })
}

/// Reads a TEXT column into any enum with a `FromStr` impl.
fn parse_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a JSON array-of-strings column.
fn tags_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn tags_json(tags: &[String]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(tags)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use outreach_types::models::{Role, TemplateKind};

    use crate::Database;
    use crate::models::{NewContact, NewTemplate};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn workspace(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_workspace(id, name, Utc::now()).unwrap();
        id
    }

    pub fn user(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(id, "Test User", email, "hash", Utc::now()).unwrap();
        id
    }

    pub fn member(db: &Database, workspace_id: Uuid, email: &str, role: Role) -> Uuid {
        let id = user(db, email);
        db.add_membership(id, workspace_id, role, Utc::now()).unwrap();
        id
    }

    pub fn contact(db: &Database, workspace_id: Uuid, phone: &str, tags: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        db.create_contact(&NewContact {
            id,
            workspace_id,
            name: format!("Contact {}", phone),
            phone_number: phone.to_string(),
            email: format!("{}@example.com", phone),
            company: "Acme".to_string(),
            notes: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        })
        .unwrap();
        id
    }

    pub fn template(db: &Database, workspace_id: Uuid, name: &str, body: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_template(&NewTemplate {
            id,
            workspace_id,
            name: name.to_string(),
            kind: TemplateKind::Text,
            body: body.to_string(),
            image_url: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        })
        .unwrap();
        id
    }
}
