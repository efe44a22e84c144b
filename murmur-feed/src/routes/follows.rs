use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use murmur_shared::clients::db::checkout;
use murmur_shared::errors::AppResult;
use murmur_shared::types::{ApiResponse, ToggleConfirmed};

use crate::events::publisher;
use crate::services::interactions;
use crate::session::Session;
use crate::view_cache::ViewPath;
use crate::AppState;

// --- POST /follows/:id ---

pub async fn toggle_follow(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ToggleConfirmed>>> {
    let outcome = {
        let mut conn = checkout(&state.db)?;
        interactions::toggle_follow(&mut conn, &session, target_id)?
    };
    let user = session.require()?;

    state
        .view_cache
        .invalidate(&ViewPath::after_follow_toggled(&outcome.target_username))
        .await;
    publisher::publish_follow_toggled(&state.rabbitmq, user.id, target_id, outcome.active, outcome.count).await;

    Ok(Json(ApiResponse::ok(ToggleConfirmed {
        active: outcome.active,
        count: outcome.count,
    })))
}
