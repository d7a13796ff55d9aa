use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;
use uuid::Uuid;

use outreach_db::Database;
use outreach_types::api::{Claims, WorkspaceRef};
use outreach_types::models::{Role, TokenType};

use crate::error::ApiError;
use crate::state::{AppState, blocking};
use crate::token::TokenKind;

/// Lets an admin act inside one workspace.
pub const WORKSPACE_HEADER: &str = "x-workspace-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Admin,
    User,
}

/// The authenticated caller, resolved against the store on every request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub kind: PrincipalKind,
    /// Role in `workspace`; admins have none.
    pub role: Option<Role>,
    pub workspace: Option<WorkspaceRef>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.kind == PrincipalKind::Admin
    }

    pub fn can_edit(&self) -> bool {
        self.is_admin() || self.role == Some(Role::Editor)
    }

    pub fn can_view(&self) -> bool {
        self.is_admin() || self.role.is_some()
    }

    /// Workspace every scoped operation runs in.
    pub fn workspace_id(&self) -> Result<Uuid, ApiError> {
        self.workspace.as_ref().map(|w| w.id).ok_or_else(|| {
            ApiError::validation(format!(
                "Workspace context required; admins must send the {} header",
                WORKSPACE_HEADER
            ))
        })
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
}

fn requested_workspace(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(WORKSPACE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::validation("Invalid workspace id in header"))
}

/// Verifies the access token, resolves the principal, re-checks workspace
/// membership and stores the `Principal` in request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = state.tokens.verify(&token, TokenKind::Access).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::unauthenticated("Invalid or expired token")
    })?;
    let requested = requested_workspace(req.headers())?;

    let principal = blocking(&state.db, move |db| resolve_principal(db, &claims, requested)).await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub(crate) fn resolve_principal(
    db: &Database,
    claims: &Claims,
    requested: Option<Uuid>,
) -> Result<Principal, ApiError> {
    match claims.token_type {
        TokenType::Admin => {
            let admin = db
                .get_admin_by_id(claims.id)?
                .ok_or_else(|| ApiError::unauthenticated("Admin account no longer exists"))?;
            let workspace = match requested {
                Some(id) => {
                    let ws = db
                        .get_workspace(id)?
                        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;
                    Some(WorkspaceRef {
                        id: ws.id,
                        name: ws.name,
                    })
                }
                None => None,
            };
            Ok(Principal {
                id: admin.id,
                email: admin.email,
                name: None,
                kind: PrincipalKind::Admin,
                role: None,
                workspace,
            })
        }
        TokenType::User => {
            let user = db
                .get_user_by_id(claims.id)?
                .ok_or_else(|| ApiError::unauthenticated("User account no longer exists"))?;
            let workspace_id = claims
                .workspace_id
                .ok_or_else(|| ApiError::unauthenticated("Invalid or expired token"))?;
            // Role comes from the store, so demotions apply before the token expires.
            let membership = user
                .membership(workspace_id)
                .ok_or_else(|| ApiError::forbidden("Workspace access revoked"))?;
            Ok(Principal {
                id: user.id,
                email: user.email.clone(),
                name: Some(user.name.clone()),
                kind: PrincipalKind::User,
                role: Some(membership.role),
                workspace: Some(WorkspaceRef {
                    id: workspace_id,
                    name: membership.workspace_name.clone(),
                }),
            })
        }
        TokenType::Temp => Err(ApiError::unauthenticated("Invalid or expired token")),
    }
}

fn principal(req: &Request) -> Result<&Principal, ApiError> {
    req.extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    if !principal(&req)?.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(next.run(req).await)
}

pub async fn require_editor(req: Request, next: Next) -> Result<Response, ApiError> {
    if !principal(&req)?.can_edit() {
        return Err(ApiError::forbidden("Editor access required"));
    }
    Ok(next.run(req).await)
}

pub async fn require_viewer(req: Request, next: Next) -> Result<Response, ApiError> {
    if !principal(&req)?.can_view() {
        return Err(ApiError::forbidden("Workspace access required"));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use outreach_types::models::TokenRole;

    fn claims_for(id: Uuid, token_type: TokenType, workspace_id: Option<Uuid>) -> Claims {
        Claims {
            id,
            email: "someone@example.com".into(),
            name: None,
            workspace_id,
            workspace: None,
            role: Some(TokenRole::Editor),
            token_type,
            temp_access: false,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn capabilities_follow_role() {
        let mut p = Principal {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            name: None,
            kind: PrincipalKind::User,
            role: Some(Role::Viewer),
            workspace: None,
        };
        assert!(p.can_view() && !p.can_edit() && !p.is_admin());

        p.role = Some(Role::Editor);
        assert!(p.can_view() && p.can_edit() && !p.is_admin());

        p.kind = PrincipalKind::Admin;
        p.role = None;
        assert!(p.can_view() && p.can_edit() && p.is_admin());
        assert!(matches!(p.workspace_id(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn revoked_membership_is_forbidden() {
        let db = Database::open_in_memory().unwrap();
        let ws = Uuid::new_v4();
        db.create_workspace(ws, "North", Utc::now()).unwrap();
        let uid = Uuid::new_v4();
        db.create_user(uid, "Jane", "jane@example.com", "hash", Utc::now()).unwrap();
        db.add_membership(uid, ws, Role::Viewer, Utc::now()).unwrap();

        let claims = claims_for(uid, TokenType::User, Some(ws));
        let p = resolve_principal(&db, &claims, None).unwrap();
        // The token says Editor; the store says Viewer.
        assert_eq!(p.role, Some(Role::Viewer));
        assert_eq!(p.workspace.unwrap().name, "North");

        db.remove_membership(uid, ws).unwrap();
        assert!(matches!(
            resolve_principal(&db, &claims, None),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn deleted_accounts_are_unauthenticated() {
        let db = Database::open_in_memory().unwrap();
        let claims = claims_for(Uuid::new_v4(), TokenType::Admin, None);
        assert!(matches!(
            resolve_principal(&db, &claims, None),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn admin_workspace_header_must_name_existing_workspace() {
        let db = Database::open_in_memory().unwrap();
        let admin = Uuid::new_v4();
        db.create_admin(admin, "root@example.com", "hash", Utc::now()).unwrap();
        let claims = claims_for(admin, TokenType::Admin, None);

        assert!(matches!(
            resolve_principal(&db, &claims, Some(Uuid::new_v4())),
            Err(ApiError::NotFound(_))
        ));

        let ws = Uuid::new_v4();
        db.create_workspace(ws, "South", Utc::now()).unwrap();
        let p = resolve_principal(&db, &claims, Some(ws)).unwrap();
        assert_eq!(p.workspace_id().unwrap(), ws);
        assert!(p.is_admin());
    }
}
