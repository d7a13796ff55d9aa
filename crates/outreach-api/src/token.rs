use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;
use uuid::Uuid;

use outreach_types::api::{Claims, WorkspaceRef};
use outreach_types::models::{TokenRole, TokenType};

/// Selection tokens live just long enough to pick a workspace.
pub const SELECTION_TOKEN_TTL_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token is of the wrong kind")]
    WrongKind,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Which credential a caller expects to be holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Workspace-scoped (or admin) credential for the protected API.
    Access,
    /// Short-lived, select-workspace-only credential.
    Selection,
}

/// Who a token is issued to.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
        }
    }

    /// Issues an access token. Admin tokens carry no workspace; user tokens
    /// must carry the workspace the role applies to.
    pub fn issue_access(
        &self,
        identity: &Identity,
        workspace: Option<&WorkspaceRef>,
        role: TokenRole,
        principal: TokenType,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            workspace_id: workspace.map(|w| w.id),
            workspace: workspace.cloned(),
            role: Some(role),
            token_type: principal,
            temp_access: false,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn issue_selection(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            email: identity.email.clone(),
            name: None,
            workspace_id: None,
            workspace: None,
            role: None,
            token_type: TokenType::Temp,
            temp_access: true,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SELECTION_TOKEN_TTL_SECS)).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?
            .claims;

        let is_selection = claims.token_type == TokenType::Temp || claims.temp_access;
        match expected {
            TokenKind::Access if is_selection => Err(TokenError::WrongKind),
            TokenKind::Selection if !is_selection => Err(TokenError::WrongKind),
            TokenKind::Selection => {
                if claims.token_type != TokenType::Temp || !claims.temp_access {
                    return Err(TokenError::Malformed);
                }
                Ok(claims)
            }
            TokenKind::Access => {
                let well_formed = match claims.token_type {
                    TokenType::Admin => claims.role == Some(TokenRole::Admin),
                    TokenType::User => {
                        claims.workspace_id.is_some()
                            && matches!(claims.role, Some(TokenRole::Editor | TokenRole::Viewer))
                    }
                    TokenType::Temp => false,
                };
                if !well_formed {
                    return Err(TokenError::Malformed);
                }
                Ok(claims)
            }
        }
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }
}
