use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::HeaderMap};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use outreach_db::Database;
use outreach_types::api::{
    Ack, AdminLoginResponse, AdminProfile, LoginRequest, SelectWorkspaceRequest,
    SelectWorkspaceResponse, SelectedUser, UserLoginResponse, UserProfile, WorkspaceRef,
};
use outreach_types::models::{TokenRole, TokenType};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::{Principal, bearer_token};
use crate::state::{AppState, blocking};
use crate::token::{Identity, TokenError, TokenKind};
use crate::views;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Argon2id hash with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Creates the configured admin unless one with that email exists already.
pub fn seed_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<bool> {
    let email = email.trim().to_lowercase();
    if db.get_admin_by_email(&email)?.is_some() {
        return Ok(false);
    }
    let hash = hash_password(password)?;
    db.create_admin(Uuid::new_v4(), &email, &hash, Utc::now())?;
    info!("Seeded admin account {}", email);
    Ok(true)
}

fn credentials(req: LoginRequest) -> Result<(String, String), ApiError> {
    match (req.email, req.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Ok((email.trim().to_lowercase(), password))
        }
        _ => Err(ApiError::validation("Email and password are required")),
    }
}

fn signing_failed(e: TokenError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!(e))
}

pub async fn admin_login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<AdminLoginResponse>, ApiError> {
    let (email, password) = credentials(req)?;

    let login_email = email.clone();
    let admin = blocking(&state.db, move |db| {
        let admin = db.get_admin_by_email(&login_email)?;
        Ok(admin.filter(|a| verify_password(&password, &a.password)))
    })
    .await?
    .ok_or_else(|| {
        warn!("Failed admin login for {}", email);
        ApiError::unauthenticated(INVALID_CREDENTIALS)
    })?;

    let identity = Identity {
        id: admin.id,
        email: admin.email.clone(),
        name: None,
    };
    let token = state
        .tokens
        .issue_access(&identity, None, TokenRole::Admin, TokenType::Admin)
        .map_err(signing_failed)?;

    info!("Admin {} logged in", admin.email);
    Ok(Json(AdminLoginResponse {
        message: "Login successful".into(),
        token,
        user: AdminProfile {
            id: admin.id,
            email: admin.email,
            role: TokenRole::Admin,
            principal_type: TokenType::Admin,
        },
    }))
}

/// One membership yields an access token straight away; several yield a
/// selection token and the list to choose from.
pub async fn user_login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<UserLoginResponse>, ApiError> {
    let (email, password) = credentials(req)?;

    let login_email = email.clone();
    let user = blocking(&state.db, move |db| {
        let user = db.get_user_by_email(&login_email)?;
        Ok(user.filter(|u| verify_password(&password, &u.password)))
    })
    .await?
    .ok_or_else(|| {
        warn!("Failed user login for {}", email);
        ApiError::unauthenticated(INVALID_CREDENTIALS)
    })?;

    let identity = Identity {
        id: user.id,
        email: user.email.clone(),
        name: Some(user.name.clone()),
    };
    let profile = UserProfile {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        workspaces: user.memberships.iter().map(views::membership).collect(),
    };

    match user.memberships.as_slice() {
        [] => {
            info!("User {} has no workspace", user.email);
            Err(ApiError::forbidden("No workspace assigned. Contact admin."))
        }
        [only] => {
            let workspace = WorkspaceRef {
                id: only.workspace_id,
                name: only.workspace_name.clone(),
            };
            let token = state
                .tokens
                .issue_access(&identity, Some(&workspace), only.role.into(), TokenType::User)
                .map_err(signing_failed)?;
            info!("User {} logged in to workspace {}", user.email, workspace.id);
            Ok(Json(UserLoginResponse {
                message: "Login successful".into(),
                access_token: Some(token),
                temp_token: None,
                user: profile,
            }))
        }
        many => {
            let token = state
                .tokens
                .issue_selection(&identity)
                .map_err(signing_failed)?;
            info!("User {} must choose among {} workspaces", user.email, many.len());
            Ok(Json(UserLoginResponse {
                message: "Multiple workspaces found. Please select a workspace within 5 minutes"
                    .into(),
                access_token: None,
                temp_token: Some(token),
                user: profile,
            }))
        }
    }
}

/// Trades a selection token for an access token bound to one workspace.
pub async fn select_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<SelectWorkspaceRequest>,
) -> Result<Json<SelectWorkspaceResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let claims = state
        .tokens
        .verify(&token, TokenKind::Selection)
        .map_err(|e| {
            debug!("Rejected selection token: {}", e);
            ApiError::unauthenticated("Invalid or expired selection token")
        })?;
    let workspace_id = req
        .workspace_id
        .ok_or_else(|| ApiError::validation("Workspace ID is required"))?;

    let user_id = claims.id;
    let user = blocking(&state.db, move |db| Ok(db.get_user_by_id(user_id)?))
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User account no longer exists"))?;
    let membership = user
        .membership(workspace_id)
        .cloned()
        .ok_or_else(|| ApiError::forbidden("Access denied to this workspace"))?;

    let workspace = WorkspaceRef {
        id: membership.workspace_id,
        name: membership.workspace_name,
    };
    let identity = Identity {
        id: user.id,
        email: user.email.clone(),
        name: Some(user.name.clone()),
    };
    let token = state
        .tokens
        .issue_access(&identity, Some(&workspace), membership.role.into(), TokenType::User)
        .map_err(signing_failed)?;

    info!("User {} selected workspace {}", user.email, workspace.id);
    Ok(Json(SelectWorkspaceResponse {
        message: "Workspace selected successfully".into(),
        token,
        user: SelectedUser {
            id: user.id,
            name: user.name,
            email: user.email,
            workspace_id: workspace.id,
            workspace,
            role: membership.role,
        },
    }))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout(Extension(principal): Extension<Principal>) -> Json<Ack> {
    info!("{} logged out", principal.email);
    Json(Ack::new("Logged out successfully"))
}
