use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use murmur_shared::clients::db::checkout;
use murmur_shared::errors::AppResult;
use murmur_shared::types::event::payloads::PostKind;
use murmur_shared::types::ApiResponse;

use crate::events::publisher;
use crate::models::Post;
use crate::services::posts;
use crate::session::Session;
use crate::view_cache::ViewPath;
use crate::views::{self, PostThreadView, PostView};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedPost {
    pub id: Uuid,
}

// --- GET /timeline ---

pub async fn timeline(
    session: Session,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<PostView>>>> {
    let view = state
        .view_cache
        .read_through(&session, &ViewPath::Home, || {
            let mut conn = checkout(&state.db)?;
            let records = posts::timeline(&mut conn, &session, state.config.timeline_page_size)?;
            Ok(views::post_views(&records, Utc::now()))
        })
        .await?;

    Ok(Json(ApiResponse::ok(view)))
}

// --- GET /posts/:id ---

pub async fn post_detail(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PostThreadView>>> {
    let view = state
        .view_cache
        .read_through(&session, &ViewPath::Post(post_id), || {
            let mut conn = checkout(&state.db)?;
            let thread = posts::post_with_replies(&mut conn, post_id, &session)?
                .ok_or_else(posts::post_not_found)?;
            Ok(views::thread_view(&thread, Utc::now()))
        })
        .await?;

    Ok(Json(ApiResponse::ok(view)))
}

// --- POST /posts ---

pub async fn create_post(
    session: Session,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedPost>>)> {
    let post = {
        let mut conn = checkout(&state.db)?;
        posts::create_post(&mut conn, &session, &req.content)?
    };

    let author = session.require()?;
    state
        .view_cache
        .invalidate(&ViewPath::after_post_created(&author.username))
        .await;

    created(&state, post, PostKind::Post, None).await
}

// --- POST /posts/:id/replies ---

pub async fn create_reply(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(parent_id): Path<Uuid>,
    Json(req): Json<ContentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedPost>>)> {
    let post = {
        let mut conn = checkout(&state.db)?;
        posts::create_reply(&mut conn, &session, parent_id, &req.content)?
    };

    let author = session.require()?;
    state
        .view_cache
        .invalidate(&ViewPath::after_reply_created(parent_id, &author.username))
        .await;

    created(&state, post, PostKind::Reply, Some(parent_id)).await
}

// --- POST /posts/:id/quotes ---

pub async fn create_quote(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(quoted_id): Path<Uuid>,
    Json(req): Json<ContentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedPost>>)> {
    let post = {
        let mut conn = checkout(&state.db)?;
        posts::create_quote(&mut conn, &session, quoted_id, &req.content)?
    };

    let author = session.require()?;
    state
        .view_cache
        .invalidate(&ViewPath::after_quote_created(quoted_id, &author.username))
        .await;

    created(&state, post, PostKind::Quote, Some(quoted_id)).await
}

async fn created(
    state: &AppState,
    post: Post,
    kind: PostKind,
    target: Option<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedPost>>)> {
    tracing::info!(post_id = %post.id, author = %post.user_id, ?kind, "post created");
    publisher::publish_post_created(&state.rabbitmq, post.id, post.user_id, kind, target).await;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(CreatedPost { id: post.id }))))
}
