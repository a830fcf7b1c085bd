pub mod classifications;
pub mod middleware;
pub mod stats;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tracing::error;

use annota_db::{Database, SubmitError};
use annota_types::models::SubmitMode;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub submit_mode: SubmitMode,
}

/// All routes require a bearer token.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/classifications", post(classifications::classify))
        .route("/classifications/user", get(classifications::list_own))
        .route("/stats/user", get(stats::user_stats))
        .route("/stats/user/studies", get(stats::user_study_stats))
        .route("/stats/general", get(stats::general_stats))
        .route("/stats/consensus", get(stats::consensus))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}

/// Run blocking DB and engine work off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&AppStateInner) -> anyhow::Result<T> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| error_status(&e))
}

/// Typed submission errors become client errors, anything else is a 500.
fn error_status(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<SubmitError>() {
        Some(SubmitError::UnknownPost(_) | SubmitError::UnknownQuestion(_)) => StatusCode::NOT_FOUND,
        Some(_) => StatusCode::BAD_REQUEST,
        None => {
            error!("Request failed: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
