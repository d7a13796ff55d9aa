//! Admin-only user management. Users log in through `/auth/user/login`
//! and act inside the workspaces assigned here.

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use outreach_db::ListFilter;
use outreach_types::api::{
    Ack, AssignWorkspaceRequest, CreateUserRequest, PageQuery, Paginated, Pagination,
    UpdateUserRequest, UserResponse, UserView,
};
use outreach_types::models::Role;

use crate::auth::hash_password;
use crate::engine::unique_as_conflict;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams, optional_json};
use crate::state::{AppState, blocking};
use crate::validate;
use crate::views;

const NOT_FOUND: &str = "User not found";
const DUPLICATE_EMAIL: &str = "A user with this email already exists";

pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate::required(req.name, "Name is required")?;
    let email = validate::email(validate::required(req.email, "Email is required")?)?;
    let password = validate::password(req.password)?;
    let id = Uuid::new_v4();

    let user = blocking(&state.db, move |db| {
        if db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::conflict(DUPLICATE_EMAIL));
        }
        let hash = hash_password(&password)?;
        db.create_user(id, &name, &email, &hash, Utc::now())
            .map_err(|e| unique_as_conflict(e, DUPLICATE_EMAIL))?;
        db.get_user_by_id(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("User {} created", id);
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created successfully".into(),
            user: views::user(user),
        }),
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<UserView>>, ApiError> {
    let filter = ListFilter::new(query.page, query.limit, query.search);
    let page = blocking(&state.db, move |db| {
        let (rows, total) = db.list_users(&filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::user).collect(),
            pagination: Pagination::new(filter.page, filter.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<UserView>, ApiError> {
    let user = blocking(&state.db, move |db| {
        db.get_user_by_id(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;
    Ok(Json(views::user(user)))
}

/// Partial update. A new password is re-hashed; a new email must stay unique.
pub async fn update_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = validate::non_blank(req.name, "Name cannot be empty")?;
    let email = validate::non_blank(req.email, "Email cannot be empty")?
        .map(validate::email)
        .transpose()?;
    let password = match req.password {
        Some(p) => Some(validate::password(Some(p))?),
        None => None,
    };

    let user = blocking(&state.db, move |db| {
        if let Some(email) = &email {
            if let Some(other) = db.get_user_by_email(email)? {
                if other.id != id {
                    return Err(ApiError::conflict(DUPLICATE_EMAIL));
                }
            }
        }
        let hash = password.as_deref().map(hash_password).transpose()?;
        let updated = db
            .update_user(id, name.as_deref(), email.as_deref(), hash.as_deref(), Utc::now())
            .map_err(|e| unique_as_conflict(e, DUPLICATE_EMAIL))?;
        if !updated {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        db.get_user_by_id(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("User {} updated", id);
    Ok(Json(UserResponse {
        message: "User updated successfully".into(),
        user: views::user(user),
    }))
}

/// Removes the user and all of their memberships. Contacts, templates and
/// campaigns they created stay, with an unresolved creator.
pub async fn delete_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let deleted = blocking(&state.db, move |db| Ok(db.delete_user(id)?)).await?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("User {} deleted", id);
    Ok(Json(Ack::new("User deleted successfully")))
}

/// Grants a membership. The body is optional; the role defaults to Viewer.
pub async fn assign_workspace(
    State(state): State<AppState>,
    PathParams((user_id, workspace_id)): PathParams<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<UserResponse>, ApiError> {
    let req: AssignWorkspaceRequest = optional_json(&body)?;
    let role = match req.role.as_deref() {
        Some(r) => validate::role(r)?,
        None => Role::Viewer,
    };

    let user = blocking(&state.db, move |db| {
        let user = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        if user.membership(workspace_id).is_some() {
            return Err(ApiError::conflict(
                "User is already assigned to this workspace",
            ));
        }
        if !db.add_membership(user_id, workspace_id, role, Utc::now())? {
            return Err(ApiError::not_found("Workspace not found"));
        }
        db.get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("User {} assigned to workspace {} as {}", user_id, workspace_id, role);
    Ok(Json(UserResponse {
        message: "User assigned to workspace successfully".into(),
        user: views::user(user),
    }))
}

/// Revokes a membership. Tokens already issued for that workspace stop
/// working on their next request.
pub async fn remove_from_workspace(
    State(state): State<AppState>,
    PathParams((user_id, workspace_id)): PathParams<(Uuid, Uuid)>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state.db, move |db| {
        if db.get_user_by_id(user_id)?.is_none() {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        if !db.remove_membership(user_id, workspace_id)? {
            return Err(ApiError::not_found("User is not assigned to this workspace"));
        }
        db.get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("User {} removed from workspace {}", user_id, workspace_id);
    Ok(Json(UserResponse {
        message: "User removed from workspace successfully".into(),
        user: views::user(user),
    }))
}
