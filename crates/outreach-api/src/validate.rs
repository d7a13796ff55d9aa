//! Input normalisation shared by the handlers and the campaign engine.

use outreach_types::models::{Role, TemplateKind};

use crate::error::ApiError;

/// Trims `value` and rejects it when missing or blank.
pub fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

/// Like `required`, but only for fields that were supplied.
pub fn non_blank(value: Option<String>, message: &str) -> Result<Option<String>, ApiError> {
    match value {
        Some(v) => required(Some(v), message).map(Some),
        None => Ok(None),
    }
}

/// Trimmed, blank-free, first occurrence wins. Matching stays case-sensitive.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Ten digits, the first of which is 6, 7, 8 or 9.
pub fn is_valid_phone(phone: &str) -> bool {
    let bytes = phone.as_bytes();
    bytes.len() == 10
        && matches!(bytes[0], b'6'..=b'9')
        && bytes.iter().all(u8::is_ascii_digit)
}

pub fn phone(value: String) -> Result<String, ApiError> {
    let value = value.trim().to_string();
    if !is_valid_phone(&value) {
        return Err(ApiError::validation(
            "Phone number must be 10 digits starting with 6, 7, 8 or 9",
        ));
    }
    Ok(value)
}

/// Lowercased; one `@` with something on both sides and a dot in the domain.
pub fn email(value: String) -> Result<String, ApiError> {
    let value = value.trim().to_lowercase();
    let ok = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !ok {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(value)
}

pub fn role(value: &str) -> Result<Role, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("Role must be either 'Editor' or 'Viewer'"))
}

pub fn template_kind(value: &str) -> Result<TemplateKind, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("Type must be either 'Text' or 'Text & Image'"))
}

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn password(value: Option<String>) -> Result<String, ApiError> {
    let value = value.ok_or_else(|| ApiError::validation("Password is required"))?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_rule() {
        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("6000000000"));
        assert!(!is_valid_phone("5876543210"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765432100"));
        assert!(!is_valid_phone("98765a3210"));
        assert!(!is_valid_phone("+919876543"));
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags([" vip", "lead", "vip ", "", "  ", "VIP"]);
        assert_eq!(tags, vec!["vip", "lead", "VIP"]);
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required(Some("   ".into()), "x").is_err());
        assert!(required(None, "x").is_err());
        assert_eq!(required(Some(" a ".into()), "x").unwrap(), "a");
        assert_eq!(non_blank(None, "x").unwrap(), None);
        assert!(non_blank(Some("".into()), "x").is_err());
    }

    #[test]
    fn email_is_normalised() {
        assert_eq!(email(" Jane@Example.COM ".into()).unwrap(), "jane@example.com");
        assert!(email("jane".into()).is_err());
        assert!(email("jane@localhost".into()).is_err());
        assert!(email("@example.com".into()).is_err());
    }

    #[test]
    fn roles_and_kinds_are_exact() {
        assert_eq!(role("Editor").unwrap(), Role::Editor);
        assert!(role("editor").is_err());
        assert!(role("Admin").is_err());
        assert_eq!(template_kind("Text & Image").unwrap(), TemplateKind::TextAndImage);
        assert!(template_kind("Image").is_err());
    }
}
