use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use outreach_db::{CampaignFilter, ListFilter};
use outreach_types::api::{
    Ack, CampaignDetail, CampaignListItem, CampaignQuery, CampaignResponse, CopyCampaignRequest,
    CreateCampaignRequest, LaunchResponse, Paginated, UpdateCampaignRequest,
};
use outreach_types::models::CampaignStatus;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams, optional_json};
use crate::middleware::Principal;
use crate::state::AppState;

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let campaign = state.engine.create(workspace_id, principal.id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CampaignResponse {
            message: "Campaign created successfully".into(),
            campaign,
        }),
    ))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<CampaignQuery>,
) -> Result<Json<Paginated<CampaignListItem>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<CampaignStatus>()
                .map_err(|_| ApiError::validation(format!("Unknown campaign status '{}'", s)))
        })
        .transpose()?;
    let filter = CampaignFilter {
        list: ListFilter::new(query.page, query.limit, query.search),
        status,
    };
    Ok(Json(state.engine.list(workspace_id, filter).await?))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<CampaignDetail>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    Ok(Json(state.engine.get(workspace_id, id).await?))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(req): JsonBody<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let campaign = state.engine.update(workspace_id, id, req).await?;
    Ok(Json(CampaignResponse {
        message: "Campaign updated successfully".into(),
        campaign,
    }))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    state.engine.delete(workspace_id, id).await?;
    Ok(Json(Ack::new("Campaign deleted successfully")))
}

/// The body is optional; an empty one copies under the default name.
pub async fn copy_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let req: CopyCampaignRequest = optional_json(&body)?;
    let campaign = state.engine.copy(workspace_id, id, principal.id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CampaignResponse {
            message: "Campaign copied successfully".into(),
            campaign,
        }),
    ))
}

pub async fn launch_campaign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<LaunchResponse>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let campaign = state.engine.launch(workspace_id, id).await?;
    Ok(Json(LaunchResponse {
        message: "Campaign launched successfully".into(),
        campaign,
    }))
}
