use diesel::prelude::*;
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewFollow, NewLike};
use crate::schema::{follows, likes, posts, users};
use crate::services::posts::post_not_found;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    pub active: bool,
    /// Likes on the post after the toggle.
    pub count: i64,
    /// Thread the post is shown in, when it is a reply.
    pub parent_id: Option<Uuid>,
    pub author_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowOutcome {
    pub active: bool,
    /// Followers of the target after the toggle.
    pub count: i64,
    pub target_username: String,
}

/// Likes the post if the caller has not, unlikes it otherwise.
///
/// The delete-then-insert runs in one transaction and the insert ignores
/// conflicts, so two concurrent toggles never surface a key violation.
pub fn toggle_like(conn: &mut PgConnection, session: &Session, post_id: Uuid) -> AppResult<LikeOutcome> {
    let user = session.require()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let (parent_id, author_username) = posts::table
            .inner_join(users::table)
            .filter(posts::id.eq(post_id))
            .select((posts::parent_id, users::username))
            .first::<(Option<Uuid>, String)>(conn)
            .optional()?
            .ok_or_else(post_not_found)?;

        let removed = diesel::delete(likes::table.find((user.id, post_id))).execute(conn)?;
        let active = if removed > 0 {
            false
        } else {
            diesel::insert_into(likes::table)
                .values(&NewLike { user_id: user.id, post_id })
                .on_conflict_do_nothing()
                .execute(conn)?;
            true
        };

        let count = likes::table
            .filter(likes::post_id.eq(post_id))
            .count()
            .get_result::<i64>(conn)?;

        tracing::debug!(post_id = %post_id, user_id = %user.id, active, count, "like toggled");
        Ok(LikeOutcome {
            active,
            count,
            parent_id,
            author_username,
        })
    })
}

pub fn toggle_follow(conn: &mut PgConnection, session: &Session, target_id: Uuid) -> AppResult<FollowOutcome> {
    let user = session.require()?;
    if user.id == target_id {
        return Err(AppError::new(ErrorCode::CannotFollowSelf, "you cannot follow yourself"));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let target_username = users::table
            .find(target_id)
            .select(users::username)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let removed = diesel::delete(follows::table.find((user.id, target_id))).execute(conn)?;
        let active = if removed > 0 {
            false
        } else {
            diesel::insert_into(follows::table)
                .values(&NewFollow {
                    follower_id: user.id,
                    following_id: target_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)?;
            true
        };

        let count = follows::table
            .filter(follows::following_id.eq(target_id))
            .count()
            .get_result::<i64>(conn)?;

        tracing::debug!(follower = %user.id, following = %target_id, active, count, "follow toggled");
        Ok(FollowOutcome {
            active,
            count,
            target_username,
        })
    })
}
