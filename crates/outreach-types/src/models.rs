use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// wire and storage spellings are identical.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// Role a user holds inside one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Editor,
    Viewer,
}

string_enum!(Role, "role", { Editor => "Editor", Viewer => "Viewer" });

/// Campaign lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Running,
    Completed,
    Failed,
}

string_enum!(CampaignStatus, "campaign status", {
    Draft => "Draft",
    Running => "Running",
    Completed => "Completed",
    Failed => "Failed",
});

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome of a single send attempt, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

string_enum!(DeliveryStatus, "delivery status", { Sent => "Sent", Failed => "Failed" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    #[serde(rename = "Text")]
    Text,
    #[serde(rename = "Text & Image")]
    TextAndImage,
}

string_enum!(TemplateKind, "template type", {
    Text => "Text",
    TextAndImage => "Text & Image",
});

impl TemplateKind {
    pub fn requires_image(&self) -> bool {
        matches!(self, Self::TextAndImage)
    }
}

/// The `type` claim of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Admin,
    User,
    Temp,
}

/// The `role` claim of an access token. Admin tokens carry `"admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRole {
    #[serde(rename = "admin")]
    Admin,
    Editor,
    Viewer,
}

impl From<Role> for TokenRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Editor => TokenRole::Editor,
            Role::Viewer => TokenRole::Viewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_kind_uses_display_spelling() {
        assert_eq!(TemplateKind::TextAndImage.as_str(), "Text & Image");
        assert_eq!("Text & Image".parse::<TemplateKind>().unwrap(), TemplateKind::TextAndImage);
        assert_eq!(
            serde_json::to_string(&TemplateKind::TextAndImage).unwrap(),
            "\"Text & Image\""
        );
    }

    #[test]
    fn role_rejects_unknown_values() {
        let err = "Owner".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "unknown role 'Owner'");
        // Matching is case-sensitive
        assert!("editor".parse::<Role>().is_err());
    }

    #[test]
    fn token_role_serializes_admin_lowercase() {
        assert_eq!(serde_json::to_string(&TokenRole::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&TokenRole::from(Role::Editor)).unwrap(), "\"Editor\"");
        assert_eq!(serde_json::to_string(&TokenType::Temp).unwrap(), "\"temp\"");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!CampaignStatus::Draft.is_terminal());
        assert!(!CampaignStatus::Running.is_terminal());
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
    }
}
