//! Read-only dashboards over the current workspace. Day-bucketed reports
//! take an inclusive `startDate`/`endDate` range (YYYY-MM-DD, UTC).

use axum::{Extension, Json, extract::State};

use outreach_db::DateRange;
use outreach_types::api::{DailyCount, DailyTypeCount, DateRangeQuery, RecentCampaign, TagCount};

use crate::error::ApiError;
use crate::extract::QueryParams;
use crate::middleware::Principal;
use crate::state::{AppState, blocking};
use crate::views;

fn date_range(query: DateRangeQuery) -> Result<DateRange, ApiError> {
    if query.start_date > query.end_date {
        return Err(ApiError::validation("startDate must not be after endDate"));
    }
    Ok(DateRange {
        start: query.start_date,
        end: query.end_date,
    })
}

fn daily(rows: Vec<(String, u64)>) -> Vec<DailyCount> {
    rows.into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

pub async fn campaigns_per_day(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<DateRangeQuery>,
) -> Result<Json<Vec<DailyCount>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let range = date_range(query)?;
    let rows = blocking(&state.db, move |db| Ok(db.campaigns_per_day(workspace_id, range)?)).await?;
    Ok(Json(daily(rows)))
}

pub async fn messages_per_day(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<DateRangeQuery>,
) -> Result<Json<Vec<DailyTypeCount>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let range = date_range(query)?;
    let rows = blocking(&state.db, move |db| Ok(db.messages_per_day(workspace_id, range)?)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(date, kind, count)| DailyTypeCount { date, kind, count })
            .collect(),
    ))
}

pub async fn contacts_reached_per_day(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<DateRangeQuery>,
) -> Result<Json<Vec<DailyCount>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let range = date_range(query)?;
    let rows = blocking(&state.db, move |db| {
        Ok(db.contacts_reached_per_day(workspace_id, range)?)
    })
    .await?;
    Ok(Json(daily(rows)))
}

pub async fn recent_campaigns(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<RecentCampaign>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let rows = blocking(&state.db, move |db| Ok(db.recent_campaigns(workspace_id)?)).await?;
    Ok(Json(rows.into_iter().map(views::recent_campaign).collect()))
}

pub async fn top_tags(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let workspace_id = principal.workspace_id()?;
    let rows = blocking(&state.db, move |db| Ok(db.top_tags(workspace_id)?)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(tag, contact_count)| TagCount { tag, contact_count })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = date_range(DateRangeQuery {
            start_date: day("2024-03-02"),
            end_date: day("2024-03-01"),
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let single = date_range(DateRangeQuery {
            start_date: day("2024-03-01"),
            end_date: day("2024-03-01"),
        })
        .unwrap();
        assert_eq!(single.start, single.end);
    }
}
