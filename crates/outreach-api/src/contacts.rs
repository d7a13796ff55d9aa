use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use outreach_db::models::{ContactUpdate, NewContact};
use outreach_db::{ContactFilter, ListFilter};
use outreach_types::api::{
    Ack, ContactQuery, ContactResponse, ContactView, CreateContactRequest, Paginated, Pagination,
    UpdateContactRequest,
};

use crate::engine::unique_as_conflict;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::middleware::Principal;
use crate::state::{AppState, blocking};
use crate::validate;
use crate::views;

const NOT_FOUND: &str = "Contact not found";
const DUPLICATE_PHONE: &str = "A contact with this phone number already exists";

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<CreateContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let new = NewContact {
        id: Uuid::new_v4(),
        workspace_id,
        name: validate::required(req.name, "Name is required")?,
        phone_number: validate::phone(validate::required(
            req.phone_number,
            "Phone number is required",
        )?)?,
        email: validate::email(validate::required(req.email, "Email is required")?)?,
        company: validate::required(req.company, "Company is required")?,
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        tags: validate::normalize_tags(req.tags),
        created_by: principal.id,
        created_at: Utc::now(),
    };

    let contact = blocking(&state.db, move |db| {
        if db.phone_number_exists(new.workspace_id, &new.phone_number, None)? {
            return Err(ApiError::conflict(DUPLICATE_PHONE));
        }
        db.create_contact(&new)
            .map_err(|e| unique_as_conflict(e, DUPLICATE_PHONE))?;
        db.get_contact(new.workspace_id, new.id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Contact {} created in workspace {}", contact.id, workspace_id);
    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            message: "Contact created successfully".into(),
            contact: views::contact(contact),
        }),
    ))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<ContactQuery>,
) -> Result<Json<Paginated<ContactView>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let filter = ContactFilter {
        list: ListFilter::new(query.page, query.limit, query.search),
        tags: query
            .tags
            .as_deref()
            .map(|t| validate::normalize_tags(t.split(',')))
            .unwrap_or_default(),
    };

    let page = blocking(&state.db, move |db| {
        let (rows, total) = db.list_contacts(workspace_id, &filter)?;
        Ok(Paginated {
            data: rows.into_iter().map(views::contact).collect(),
            pagination: Pagination::new(filter.list.page, filter.list.limit, total),
        })
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<ContactView>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let contact = blocking(&state.db, move |db| {
        db.get_contact(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;
    Ok(Json(views::contact(contact)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(req): JsonBody<UpdateContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let update = ContactUpdate {
        name: validate::non_blank(req.name, "Name cannot be empty")?,
        phone_number: validate::non_blank(req.phone_number, "Phone number cannot be empty")?
            .map(validate::phone)
            .transpose()?,
        email: validate::non_blank(req.email, "Email cannot be empty")?
            .map(validate::email)
            .transpose()?,
        company: validate::non_blank(req.company, "Company cannot be empty")?,
        notes: req.notes.map(|n| n.trim().to_string()),
        tags: req.tags.map(validate::normalize_tags),
    };

    let contact = blocking(&state.db, move |db| {
        let existing = db
            .get_contact(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        if let Some(phone) = &update.phone_number {
            if *phone != existing.phone_number
                && db.phone_number_exists(workspace_id, phone, Some(id))?
            {
                return Err(ApiError::conflict(DUPLICATE_PHONE));
            }
        }
        let updated = db
            .update_contact(workspace_id, id, &update, Utc::now())
            .map_err(|e| unique_as_conflict(e, DUPLICATE_PHONE))?;
        if !updated {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        db.get_contact(workspace_id, id)?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    })
    .await?;

    info!("Contact {} updated", id);
    Ok(Json(ContactResponse {
        message: "Contact updated successfully".into(),
        contact: views::contact(contact),
    }))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let deleted = blocking(&state.db, move |db| Ok(db.delete_contact(workspace_id, id)?)).await?;
    if !deleted {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Contact {} deleted", id);
    Ok(Json(Ack::new("Contact deleted successfully")))
}
