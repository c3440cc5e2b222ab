pub mod admin;
pub mod auth;
pub mod error;
pub mod flags;
pub mod messages;
pub mod middleware;
pub mod moments;
pub mod participation;
pub mod photos;
pub mod profiles;
pub mod sos;

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use ember_db::Database;
use ember_db::error::StoreResult;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

/// Run a blocking DB call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal("task join error")
        })?
        .map_err(ApiError::from)
}

/// Stored ids are written by us, so a parse failure means row corruption;
/// degrade to the nil uuid rather than failing the whole listing.
pub(crate) fn uuid_or_nil(s: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", s, e);
        Uuid::default()
    })
}
