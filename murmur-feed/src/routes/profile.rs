use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::PgConnection;
use std::sync::Arc;

use murmur_shared::clients::db::checkout;
use murmur_shared::clients::storage::{validate_image, ImageKind};
use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::{ApiResponse, Paginated, PaginationParams};

use crate::events::publisher;
use crate::services::users::{self, ProfileImages, ProfileUpdate};
use crate::services::posts;
use crate::session::Session;
use crate::view_cache::ViewPath;
use crate::views::{self, PostView, ProfileEditView, ProfilePageView};
use crate::AppState;

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

fn load_profile_page(
    conn: &mut PgConnection,
    username: &str,
    session: &Session,
    page_size: i64,
) -> AppResult<ProfilePageView> {
    let record = users::user_by_username(conn, username)?.ok_or_else(user_not_found)?;

    let first_page = PaginationParams {
        page: 1,
        per_page: page_size.max(1) as u64,
    };
    let (records, _) = posts::user_posts(conn, record.user.id, session, &first_page)?;

    let is_own_profile = session.user_id() == Some(record.user.id);
    let is_following = !is_own_profile && users::is_following(conn, session, record.user.id)?;

    Ok(ProfilePageView {
        profile: views::profile_view(&record),
        posts: views::post_views(&records, Utc::now()),
        is_following,
        is_own_profile,
    })
}

// --- GET /profile ---

pub async fn own_profile(
    session: Session,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ProfilePageView>>> {
    let me = session.require()?;
    let mut conn = checkout(&state.db)?;
    let page = load_profile_page(&mut conn, &me.username, &session, state.config.timeline_page_size)?;
    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /users/:username ---

pub async fn profile_page(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<ProfilePageView>>> {
    let page = state
        .view_cache
        .read_through(&session, &ViewPath::Profile(username.clone()), || {
            let mut conn = checkout(&state.db)?;
            load_profile_page(&mut conn, &username, &session, state.config.timeline_page_size)
        })
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}

// --- GET /users/:username/posts ---

pub async fn user_posts(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<PostView>>>> {
    let mut conn = checkout(&state.db)?;
    let record = users::user_by_username(&mut conn, &username)?.ok_or_else(user_not_found)?;
    let (records, total) = posts::user_posts(&mut conn, record.user.id, &session, &params)?;

    let items = views::post_views(&records, Utc::now());
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

// --- GET /users/:username/edit ---

pub async fn edit_profile_view(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<ProfileEditView>>> {
    let me = session.require()?;
    let mut conn = checkout(&state.db)?;
    let record = users::user_by_username(&mut conn, &username)?.ok_or_else(user_not_found)?;

    if record.user.id != me.id {
        return Err(AppError::forbidden("you can only edit your own profile"));
    }
    Ok(Json(ApiResponse::ok(views::edit_view(&record.user))))
}

// --- PATCH /me/profile ---

struct ImageField {
    content_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct ProfileForm {
    display_name: Option<String>,
    bio: Option<String>,
    cover_image: Option<ImageField>,
    profile_image: Option<ImageField>,
}

fn form_error(e: MultipartError) -> AppError {
    rejected_form(e.status(), &e.body_text())
}

/// Bodies over the route limit surface here as 413 from the multipart reader.
fn rejected_form(status: StatusCode, reason: &str) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, "profile form is too large")
    } else {
        AppError::bad_request(format!("malformed profile form: {reason}"))
    }
}

async fn read_profile_form(multipart: &mut Multipart) -> AppResult<ProfileForm> {
    let mut form = ProfileForm::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "displayName" | "bio" => {
                let text = field.text().await.map_err(form_error)?;
                if name == "bio" {
                    form.bio = Some(text);
                } else {
                    form.display_name = Some(text);
                }
            }
            "coverImage" | "profileImage" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(form_error)?;

                // Browsers send an empty part when no file was picked.
                if data.is_empty() {
                    continue;
                }
                validate_image(&content_type, data.len())?;

                let image = ImageField {
                    content_type,
                    data: data.to_vec(),
                };
                if name == "coverImage" {
                    form.cover_image = Some(image);
                } else {
                    form.profile_image = Some(image);
                }
            }
            other => tracing::debug!(field = %other, "ignoring unknown profile form field"),
        }
    }

    Ok(form)
}

pub async fn update_profile(
    session: Session,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<ProfileEditView>>> {
    let me = session.require()?;

    let form = read_profile_form(&mut multipart).await?;
    let update = ProfileUpdate::parse(form.display_name.as_deref().unwrap_or_default(), form.bio.as_deref())?;

    let mut images = ProfileImages::default();
    if let Some(image) = form.cover_image {
        images.cover_image_url = Some(
            state
                .storage
                .upload_image(ImageKind::Cover, me.id, image.data, &image.content_type)
                .await?,
        );
    }
    if let Some(image) = form.profile_image {
        images.profile_image_url = Some(
            state
                .storage
                .upload_image(ImageKind::Profile, me.id, image.data, &image.content_type)
                .await?,
        );
    }

    let updated = {
        let mut conn = checkout(&state.db)?;
        users::update_profile(&mut conn, &session, update, images)?
    };

    for url in &updated.replaced_images {
        if let Err(e) = state.storage.delete_by_url(url).await {
            tracing::warn!(error = %e, url = %url, "failed to delete replaced image");
        }
    }

    state
        .view_cache
        .invalidate(&ViewPath::after_profile_updated(&updated.user.username))
        .await;
    publisher::publish_profile_updated(&state.rabbitmq, updated.user.id, &updated.user.username).await;

    Ok(Json(ApiResponse::ok(views::edit_view(&updated.user))))
}
