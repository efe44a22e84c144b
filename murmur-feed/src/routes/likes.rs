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

// --- POST /posts/:id/like ---

pub async fn toggle_like(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ToggleConfirmed>>> {
    let outcome = {
        let mut conn = checkout(&state.db)?;
        interactions::toggle_like(&mut conn, &session, post_id)?
    };
    let user = session.require()?;

    state
        .view_cache
        .invalidate(&ViewPath::after_like_toggled(
            post_id,
            outcome.parent_id,
            &outcome.author_username,
        ))
        .await;
    publisher::publish_like_toggled(&state.rabbitmq, user.id, post_id, outcome.active, outcome.count).await;

    Ok(Json(ApiResponse::ok(ToggleConfirmed {
        active: outcome.active,
        count: outcome.count,
    })))
}
