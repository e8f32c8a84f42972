use axum::{extract::State, response::Redirect, routing::get, Router};
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, extract::ApiPath, state::AppState, store};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/participants/:participant_id/confirm",
        get(confirm_participant),
    )
}

/// Confirms one participant and sends them to their trip's page.
/// Repeated confirmations land on the same page without touching the store.
async fn confirm_participant(
    State(state): State<AppState>,
    ApiPath(participant_id): ApiPath<Uuid>,
) -> Result<Redirect, AppError> {
    let participant = store::find_participant(&state.db, participant_id)
        .await?
        .ok_or(AppError::NotFound("participant"))?;

    if !participant.is_confirmed && store::confirm_participant(&state.db, participant_id).await? {
        info!(
            %participant_id,
            trip_id = %participant.trip_id,
            "participant confirmed"
        );
    }

    Ok(Redirect::to(
        &state
            .config
            .web_base_url
            .join_path(&format!("trips/{}", participant.trip_id)),
    ))
}
