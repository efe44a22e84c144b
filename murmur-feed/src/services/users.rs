use chrono::Utc;
use diesel::dsl::exists;
use diesel::prelude::*;
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{ProfileChanges, User};
use crate::schema::{follows, posts, users};
use crate::services::validation;
use crate::session::Session;

/// A user with the counters shown on their profile.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub user: User,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
}

pub fn user_by_username(conn: &mut PgConnection, username: &str) -> AppResult<Option<ProfileRecord>> {
    let Some(user) = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let post_count = posts::table
        .filter(posts::user_id.eq(user.id))
        .count()
        .get_result::<i64>(conn)?;
    let follower_count = follows::table
        .filter(follows::following_id.eq(user.id))
        .count()
        .get_result::<i64>(conn)?;
    let following_count = follows::table
        .filter(follows::follower_id.eq(user.id))
        .count()
        .get_result::<i64>(conn)?;

    Ok(Some(ProfileRecord {
        user,
        post_count,
        follower_count,
        following_count,
    }))
}

/// Whether the caller follows `target_id`. Always false when anonymous.
pub fn is_following(conn: &mut PgConnection, session: &Session, target_id: Uuid) -> AppResult<bool> {
    let Some(viewer) = session.user_id() else {
        return Ok(false);
    };

    Ok(diesel::select(exists(follows::table.find((viewer, target_id)))).get_result(conn)?)
}

/// Validated text fields of the profile form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: String,
    /// `None` clears the bio.
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn parse(display_name: &str, bio: Option<&str>) -> AppResult<Self> {
        Ok(Self {
            display_name: validation::display_name(display_name)?.to_string(),
            bio: validation::bio(bio)?.map(str::to_string),
        })
    }
}

/// URLs of freshly uploaded images. Only present images replace stored ones.
#[derive(Debug, Clone, Default)]
pub struct ProfileImages {
    pub cover_image_url: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatedProfile {
    pub user: User,
    /// Image URLs that were stored before and have now been replaced.
    pub replaced_images: Vec<String>,
}

pub fn update_profile(
    conn: &mut PgConnection,
    session: &Session,
    update: ProfileUpdate,
    images: ProfileImages,
) -> AppResult<UpdatedProfile> {
    let caller = session.require()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let current = users::table
            .find(caller.id)
            .select(User::as_select())
            .for_update()
            .first::<User>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let mut replaced_images = Vec::new();
        if images.cover_image_url.is_some() {
            replaced_images.extend(current.cover_image_url.clone());
        }
        if images.profile_image_url.is_some() {
            replaced_images.extend(current.profile_image_url.clone());
        }

        let changes = ProfileChanges {
            display_name: update.display_name,
            bio: Some(update.bio),
            cover_image_url: images.cover_image_url,
            profile_image_url: images.profile_image_url,
            updated_at: Utc::now(),
        };

        let user = diesel::update(users::table.find(caller.id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result::<User>(conn)?;

        tracing::info!(user_id = %user.id, "profile updated");
        Ok(UpdatedProfile { user, replaced_images })
    })
}
