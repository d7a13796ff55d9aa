use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use outreach_db::models::{NewTemplate, TemplateUpdate};
use outreach_db::{ListFilter, TemplateFilter};
use outreach_types::api::{
    Ack, CreateTemplateRequest, Paginated, Pagination, TemplateQuery, TemplateResponse,
    TemplateView, UpdateTemplateRequest,
};
use outreach_types::models::TemplateKind;

use crate::engine::unique_as_conflict;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::middleware::Principal;
use crate::state::{AppState, blocking};
use crate::validate;
use crate::views;

const NOT_FOUND: &str = "Message template not found";
const DUPLICATE_NAME: &str = "A template with this name already exists";
const IMAGE_REQUIRED: &str = "Image URL is required for 'Text & Image' templates";

fn image_url(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<CreateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let name = validate::required(req.name, "Template name is required")?;
    let kind = validate::template_kind(&validate::required(req.kind, "Template type is required")?)?;
    let body = validate::required(req.body, "Message body is required")?;
    let image_url = match (kind, image_url(req.image_url)) {
        (TemplateKind::TextAndImage, None) => return Err(ApiError::validation(IMAGE_REQUIRED)),
        (TemplateKind::TextAndImage, url) => url,
        (TemplateKind::Text, _) => None,
    };

    let new = NewTemplate {
        id: Uuid::new_v4(),
        workspace_id,
        name,
        kind,
        body,
        image_url,
        created_by: principal.id,
        created_at: Utc::now(),
    };
    let template = blocking(&state.db, move |db| {
        if db.template_name_exists(new.workspace_id, &new.name, None)? {
            return Err(ApiError::conflict(DUPLICATE_NAME));
        }
        db.create_template(&new)
            .map_err(|e| unique_as_conflict(e, DUPLICATE_NAME))?;
        db.get_template(new.workspace_id, new.id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Template {} created in workspace {}", template.id, workspace_id);
    Ok((
        StatusCode::CREATED,
        Json(TemplateResponse {
            message: "Template created successfully".into(),
            template: views::template(template),
        }),
    ))
}

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<TemplateQuery>,
) -> Result<Json<Paginated<TemplateView>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(validate::template_kind)
        .transpose()?;
    let filter = TemplateFilter {
        list: ListFilter::new(query.page, query.limit, query.search),
        kind,
    };

    let page = blocking(&state.db, move |db| {
        let (rows, total) = db.list_templates(workspace_id, &filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::template).collect(),
            pagination: Pagination::new(filter.list.page, filter.list.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<TemplateView>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let template = blocking(&state.db, move |db| {
        db.get_template(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;
    Ok(Json(views::template(template)))
}

/// Partial update. The merged template must still satisfy the image rule.
pub async fn update_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(req): JsonBody<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let name = validate::non_blank(req.name, "Template name cannot be empty")?;
    let kind = validate::non_blank(req.kind, "Template type cannot be empty")?
        .map(|k| validate::template_kind(&k))
        .transpose()?;
    let body = validate::non_blank(req.body, "Message body cannot be empty")?;
    let requested_image = image_url(req.image_url);

    let template = blocking(&state.db, move |db| {
        let existing = db
            .get_template(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        if let Some(name) = &name {
            if db.template_name_exists(workspace_id, name, Some(id))? {
                return Err(ApiError::conflict(DUPLICATE_NAME));
            }
        }

        let merged_kind = kind.unwrap_or(existing.kind);
        let image_url = match merged_kind {
            TemplateKind::Text => Some(None),
            TemplateKind::TextAndImage => {
                if requested_image.is_none() && existing.image_url.is_none() {
                    return Err(ApiError::validation(IMAGE_REQUIRED));
                }
                requested_image.map(Some)
            }
        };

        let update = TemplateUpdate {
            name,
            kind,
            body,
            image_url,
        };
        db.update_template(workspace_id, id, &update, Utc::now())
            .map_err(|e| unique_as_conflict(e, DUPLICATE_NAME))?;
        db.get_template(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Template {} updated", id);
    Ok(Json(TemplateResponse {
        message: "Template updated successfully".into(),
        template: views::template(template),
    }))
}

/// Campaigns that reference the template keep their id; launching them
/// afterwards fails the campaign.
pub async fn delete_template(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let deleted = blocking(&state.db, move |db| Ok(db.delete_template(workspace_id, id)?)).await?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Template {} deleted", id);
    Ok(Json(Ack::new("Template deleted successfully")))
}
