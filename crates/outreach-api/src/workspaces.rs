//! Admin-only workspace management, including workspace membership.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use outreach_db::{ListFilter, WorkspaceDeletion};
use outreach_types::api::{
    Ack, CreateWorkspaceUserRequest, PageQuery, Paginated, Pagination,
    UpdateWorkspaceUserRequest, UserView, WorkspaceDetail, WorkspaceMemberResponse,
    WorkspaceMemberView, WorkspaceRequest, WorkspaceResponse, WorkspaceView,
};
use outreach_types::models::Role;

use crate::auth::hash_password;
use crate::engine::unique_as_conflict;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::state::{AppState, blocking};
use crate::validate;
use crate::views;

const NOT_FOUND: &str = "Workspace not found";
const MEMBER_NOT_FOUND: &str = "User not found in this workspace";
const DUPLICATE_EMAIL: &str = "A user with this email already exists";

pub async fn create_workspace(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<WorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate::required(req.name, "Workspace name is required")?;
    let id = Uuid::new_v4();

    let workspace = blocking(&state.db, move |db| {
        db.create_workspace(id, &name, Utc::now())?;
        db.get_workspace(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Workspace {} created", id);
    Ok((
        StatusCode::CREATED,
        Json(WorkspaceResponse {
            message: "Workspace created successfully".into(),
            workspace: views::workspace(workspace),
        }),
    ))
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<WorkspaceView>>, ApiError> {
    let filter = ListFilter::new(query.page, query.limit, query.search);
    let page = blocking(&state.db, move |db| {
        let (rows, total) = db.list_workspaces(&filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::workspace).collect(),
            pagination: Pagination::new(filter.page, filter.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

/// The workspace with its member count and (up to the page cap) members.
pub async fn get_workspace(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<WorkspaceDetail>, ApiError> {
    let detail = blocking(&state.db, move |db| {
        let workspace = db
            .get_workspace(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        let filter = ListFilter::new(None, Some(ListFilter::MAX_LIMIT), None);
        let (members, users_count) = db.list_workspace_members(id, &filter)?;
        Ok(WorkspaceDetail {
            workspace: views::workspace(workspace),
            users_count,
            users: members.into_iter().map(views::member).collect(),
        })
    })
    .await?;
    Ok(Json(detail))
}

/// Renaming also rewrites every member's cached workspace name.
pub async fn update_workspace(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(req): JsonBody<WorkspaceRequest>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    let name = validate::required(req.name, "Workspace name is required")?;

    let workspace = blocking(&state.db, move |db| {
        if !db.rename_workspace(id, &name, Utc::now())? {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        db.get_workspace(id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Workspace {} renamed to {}", id, workspace.name);
    Ok(Json(WorkspaceResponse {
        message: "Workspace updated successfully".into(),
        workspace: views::workspace(workspace),
    }))
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    match blocking(&state.db, move |db| Ok(db.delete_workspace(id)?)).await? {
        WorkspaceDeletion::Deleted => {
            info!("Workspace {} deleted", id);
            Ok(Json(Ack::new("Workspace deleted successfully")))
        }
        WorkspaceDeletion::NotFound => Err(ApiError::not_found(NOT_FOUND)),
        WorkspaceDeletion::HasMembers(n) => Err(ApiError::conflict(format!(
            "Workspace still has {} member(s); remove them before deleting it",
            n
        ))),
    }
}

// ── Members ─────────────────────────────────────────────────────────────

/// Adds a user to the workspace. An unknown email creates the user first;
/// a known one is attached with the requested role.
pub async fn add_workspace_user(
    State(state): State<AppState>,
    PathParams(workspace_id): PathParams<Uuid>,
    JsonBody(req): JsonBody<CreateWorkspaceUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate::email(validate::required(req.email, "Email is required")?)?;
    let role = match req.role.as_deref() {
        Some(r) => validate::role(r)?,
        None => Role::Viewer,
    };
    let name = req.name;
    let password = req.password;

    let member = blocking(&state.db, move |db| {
        if db.get_workspace(workspace_id)?.is_none() {
            return Err(ApiError::not_found(NOT_FOUND));
        }

        let now = Utc::now();
        let user_id = match db.get_user_by_email(&email)? {
            Some(user) => {
                if user.membership(workspace_id).is_some() {
                    return Err(ApiError::conflict(
                        "User is already a member of this workspace",
                    ));
                }
                if !db.add_membership(user.id, workspace_id, role, now)? {
                    return Err(ApiError::not_found(NOT_FOUND));
                }
                user.id
            }
            None => {
                let name = validate::required(name, "Name is required")?;
                let hash = hash_password(&validate::password(password)?)?;
                let id = Uuid::new_v4();
                let added = db
                    .create_user_in_workspace(id, &name, &email, &hash, workspace_id, role, now)
                    .map_err(|e| unique_as_conflict(e, DUPLICATE_EMAIL))?;
                if !added {
                    return Err(ApiError::not_found(NOT_FOUND));
                }
                id
            }
        };
        db.get_workspace_member(workspace_id, user_id)?
            .ok_or_else(|| ApiError::not_found(MEMBER_NOT_FOUND))
    })
    .await?;

    info!("User {} added to workspace {} as {}", member.user_id, workspace_id, member.role);
    Ok((
        StatusCode::CREATED,
        Json(WorkspaceMemberResponse {
            message: "User added to workspace successfully".into(),
            user: views::member(member),
        }),
    ))
}

pub async fn list_workspace_users(
    State(state): State<AppState>,
    PathParams(workspace_id): PathParams<Uuid>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<WorkspaceMemberView>>, ApiError> {
    let filter = ListFilter::new(query.page, query.limit, None);
    let page = blocking(&state.db, move |db| {
        if db.get_workspace(workspace_id)?.is_none() {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        let (rows, total) = db.list_workspace_members(workspace_id, &filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::member).collect(),
            pagination: Pagination::new(filter.page, filter.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

/// Users who are not yet members, for the "add member" picker.
pub async fn list_available_users(
    State(state): State<AppState>,
    PathParams(workspace_id): PathParams<Uuid>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Paginated<UserView>>, ApiError> {
    let filter = ListFilter::new(query.page, query.limit, query.search);
    let page = blocking(&state.db, move |db| {
        if db.get_workspace(workspace_id)?.is_none() {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        let (rows, total) = db.list_users_not_in_workspace(workspace_id, &filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::user).collect(),
            pagination: Pagination::new(filter.page, filter.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_workspace_user(
    State(state): State<AppState>,
    PathParams((workspace_id, user_id)): PathParams<(Uuid, Uuid)>,
) -> Result<Json<WorkspaceMemberView>, ApiError> {
    let member = blocking(&state.db, move |db| {
        db.get_workspace_member(workspace_id, user_id)?
            .ok_or_else(|| ApiError::not_found(MEMBER_NOT_FOUND))
    })
    .await?;
    Ok(Json(views::member(member)))
}

pub async fn update_workspace_user(
    State(state): State<AppState>,
    PathParams((workspace_id, user_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(req): JsonBody<UpdateWorkspaceUserRequest>,
) -> Result<Json<WorkspaceMemberResponse>, ApiError> {
    let name = validate::non_blank(req.name, "Name cannot be empty")?;
    let role = req.role.as_deref().map(validate::role).transpose()?;

    let member = blocking(&state.db, move |db| {
        let updated =
            db.update_workspace_member(workspace_id, user_id, name.as_deref(), role, Utc::now())?;
        if !updated {
            return Err(ApiError::not_found(MEMBER_NOT_FOUND));
        }
        db.get_workspace_member(workspace_id, user_id)?
            .ok_or_else(|| ApiError::not_found(MEMBER_NOT_FOUND))
    })
    .await?;

    info!("Member {} of workspace {} updated", user_id, workspace_id);
    Ok(Json(WorkspaceMemberResponse {
        message: "User updated successfully".into(),
        user: views::member(member),
    }))
}

pub async fn remove_workspace_user(
    State(state): State<AppState>,
    PathParams((workspace_id, user_id)): PathParams<(Uuid, Uuid)>,
) -> Result<Json<Ack>, ApiError> {
    let removed = blocking(&state.db, move |db| {
        Ok(db.remove_membership(user_id, workspace_id)?)
    })
    .await?;
    if !removed {
        return Err(ApiError::not_found(MEMBER_NOT_FOUND));
    }
    info!("User {} removed from workspace {}", user_id, workspace_id);
    Ok(Json(Ack::new("User removed from workspace successfully")))
}
