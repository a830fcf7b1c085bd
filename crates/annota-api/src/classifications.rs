use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use annota_types::api::{Claims, ClassifyRequest, ClassifyResponse};
use annota_types::models::SubmitMode;

use crate::{AppState, blocking};

/// Record the caller's categories for one (post, question).
///
/// In append mode a submission that adds nothing new is answered with 409,
/// the client then moves on to the next post.
pub async fn classify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ClassifyRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let mode = state.submit_mode;
    let user_id = claims.sub.to_string();

    let outcome = blocking(&state, move |st| {
        st.db
            .record_classification(&user_id, req.post_id, req.question_id, &req.category_ids, mode)
    })
    .await?;

    if mode == SubmitMode::Append && outcome.inserted == 0 {
        return Err(StatusCode::CONFLICT);
    }

    info!(
        "{} classified ({} removed, {} inserted)",
        claims.username, outcome.removed, outcome.inserted
    );

    Ok((
        StatusCode::CREATED,
        Json(ClassifyResponse {
            inserted: outcome.inserted,
            removed: outcome.removed,
        }),
    ))
}

pub async fn list_own(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub.to_string();
    let grouped = blocking(&state, move |st| st.db.classifications_for_user(&user_id)).await?;
    Ok(Json(grouped))
}
