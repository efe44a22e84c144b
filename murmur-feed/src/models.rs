use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{follows, likes, posts, users};

// --- User ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub external_id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub display_name: &'a str,
    pub profile_image_url: Option<&'a str>,
}

/// Fields the identity provider may change. `None` leaves the column alone.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct IdentityPatch<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub username: Option<&'a str>,
    pub profile_image_url: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Profile form changes. `bio: Some(None)` clears the bio; image URLs are only
/// written when a new image was uploaded.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    pub display_name: String,
    pub bio: Option<Option<String>>,
    pub cover_image_url: Option<String>,
    pub profile_image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// --- Post ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub quoted_post_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub user_id: Uuid,
    pub content: &'a str,
    pub parent_id: Option<Uuid>,
    pub quoted_post_id: Option<Uuid>,
}

// --- Like ---

#[derive(Debug, Insertable)]
#[diesel(table_name = likes)]
pub struct NewLike {
    pub user_id: Uuid,
    pub post_id: Uuid,
}

// --- Follow ---

#[derive(Debug, Insertable)]
#[diesel(table_name = follows)]
pub struct NewFollow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
}
