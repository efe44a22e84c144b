use std::collections::{HashMap, HashSet};

use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::PaginationParams;

use crate::models::{NewPost, Post, User};
use crate::schema::{likes, posts, users};
use crate::services::validation;
use crate::session::Session;

/// A post as it is displayed: with its author, counters, the caller's like
/// state and the quoted post, if any.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post: Post,
    pub author: User,
    pub like_count: i64,
    pub reply_count: i64,
    pub is_liked: bool,
    pub quoted: Option<QuotedRecord>,
}

#[derive(Debug, Clone)]
pub struct QuotedRecord {
    pub post: Post,
    pub author: User,
}

/// A post and its direct replies, oldest reply first.
#[derive(Debug, Clone)]
pub struct PostThread {
    pub post: PostRecord,
    pub replies: Vec<PostRecord>,
}

// --- Reads ---

/// Newest top-level posts.
pub fn timeline(conn: &mut PgConnection, session: &Session, limit: i64) -> AppResult<Vec<PostRecord>> {
    let rows = posts::table
        .filter(posts::parent_id.is_null())
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(limit)
        .select(Post::as_select())
        .load::<Post>(conn)?;

    hydrate(conn, rows, session.user_id())
}

/// One page of an author's top-level posts, newest first, plus the total.
pub fn user_posts(
    conn: &mut PgConnection,
    author_id: Uuid,
    session: &Session,
    page: &PaginationParams,
) -> AppResult<(Vec<PostRecord>, u64)> {
    let total: i64 = posts::table
        .filter(posts::user_id.eq(author_id))
        .filter(posts::parent_id.is_null())
        .count()
        .get_result(conn)?;

    let rows = posts::table
        .filter(posts::user_id.eq(author_id))
        .filter(posts::parent_id.is_null())
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(page.limit())
        .offset(page.offset())
        .select(Post::as_select())
        .load::<Post>(conn)?;

    Ok((hydrate(conn, rows, session.user_id())?, total.max(0) as u64))
}

pub fn post_with_replies(
    conn: &mut PgConnection,
    post_id: Uuid,
    session: &Session,
) -> AppResult<Option<PostThread>> {
    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .first::<Post>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let replies = posts::table
        .filter(posts::parent_id.eq(post_id))
        .order((posts::created_at.asc(), posts::id.asc()))
        .select(Post::as_select())
        .load::<Post>(conn)?;

    let mut records = hydrate(conn, std::iter::once(post).chain(replies).collect(), session.user_id())?;
    let head = records.remove(0);
    Ok(Some(PostThread { post: head, replies: records }))
}

/// Loads authors, quoted posts, counters and like state for `rows` with a
/// fixed number of queries, preserving the order of `rows`.
fn hydrate(conn: &mut PgConnection, rows: Vec<Post>, viewer: Option<Uuid>) -> AppResult<Vec<PostRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();

    let quoted_ids: Vec<Uuid> = rows.iter().filter_map(|p| p.quoted_post_id).collect();
    let quoted: HashMap<Uuid, Post> = if quoted_ids.is_empty() {
        HashMap::new()
    } else {
        posts::table
            .filter(posts::id.eq_any(&quoted_ids))
            .select(Post::as_select())
            .load::<Post>(conn)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let mut author_ids: Vec<Uuid> = rows
        .iter()
        .map(|p| p.user_id)
        .chain(quoted.values().map(|p| p.user_id))
        .collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<Uuid, User> = users::table
        .filter(users::id.eq_any(&author_ids))
        .select(User::as_select())
        .load::<User>(conn)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let like_counts: HashMap<Uuid, i64> = likes::table
        .filter(likes::post_id.eq_any(&ids))
        .group_by(likes::post_id)
        .select((likes::post_id, count_star()))
        .load::<(Uuid, i64)>(conn)?
        .into_iter()
        .collect();

    let reply_counts: HashMap<Uuid, i64> = posts::table
        .filter(posts::parent_id.eq_any(&ids))
        .group_by(posts::parent_id)
        .select((posts::parent_id, count_star()))
        .load::<(Option<Uuid>, i64)>(conn)?
        .into_iter()
        .filter_map(|(parent, n)| parent.map(|p| (p, n)))
        .collect();

    let liked: HashSet<Uuid> = match viewer {
        Some(viewer) => likes::table
            .filter(likes::user_id.eq(viewer))
            .filter(likes::post_id.eq_any(&ids))
            .select(likes::post_id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    rows.into_iter()
        .map(|post| {
            let author = authors
                .get(&post.user_id)
                .cloned()
                .ok_or_else(|| AppError::internal(format!("author of post {} is missing", post.id)))?;

            let quoted = post
                .quoted_post_id
                .and_then(|id| quoted.get(&id))
                .and_then(|q| {
                    authors.get(&q.user_id).map(|a| QuotedRecord {
                        post: q.clone(),
                        author: a.clone(),
                    })
                });

            Ok(PostRecord {
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                reply_count: reply_counts.get(&post.id).copied().unwrap_or(0),
                is_liked: liked.contains(&post.id),
                author,
                quoted,
                post,
            })
        })
        .collect()
}

fn post_exists(conn: &mut PgConnection, post_id: Uuid) -> AppResult<bool> {
    Ok(diesel::select(exists(posts::table.find(post_id))).get_result(conn)?)
}

// --- Writes ---

pub fn create_post(conn: &mut PgConnection, session: &Session, content: &str) -> AppResult<Post> {
    insert_post(conn, session, content, None, None)
}

pub fn create_reply(
    conn: &mut PgConnection,
    session: &Session,
    parent_id: Uuid,
    content: &str,
) -> AppResult<Post> {
    insert_post(conn, session, content, Some(parent_id), None)
}

pub fn create_quote(
    conn: &mut PgConnection,
    session: &Session,
    quoted_post_id: Uuid,
    content: &str,
) -> AppResult<Post> {
    insert_post(conn, session, content, None, Some(quoted_post_id))
}

fn insert_post(
    conn: &mut PgConnection,
    session: &Session,
    raw_content: &str,
    parent_id: Option<Uuid>,
    quoted_post_id: Option<Uuid>,
) -> AppResult<Post> {
    let author = session.require()?;
    let content = validation::post_content(raw_content)?;

    conn.transaction::<_, AppError, _>(|conn| {
        if let Some(target) = parent_id.or(quoted_post_id) {
            if !post_exists(conn, target)? {
                return Err(post_not_found());
            }
        }

        let new_post = NewPost {
            user_id: author.id,
            content,
            parent_id,
            quoted_post_id,
        };

        // A target deleted between the check and the insert trips the foreign key.
        diesel::insert_into(posts::table)
            .values(&new_post)
            .returning(Post::as_returning())
            .get_result::<Post>(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => post_not_found(),
                other => AppError::from(other),
            })
    })
}

pub(crate) fn post_not_found() -> AppError {
    AppError::new(ErrorCode::PostNotFound, "post not found")
}
