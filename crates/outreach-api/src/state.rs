use std::sync::Arc;

use tracing::error;

use outreach_db::Database;

use crate::engine::CampaignEngine;
use crate::error::ApiError;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub tokens: TokenService,
    pub engine: CampaignEngine,
}

/// Runs a store call on the blocking pool.
pub async fn blocking<T, F>(db: &Arc<Database>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}
