//! JSON view models served to the page renderer, and the mapping from
//! hydrated records into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format::{self, DetailTime};
use crate::models::User;
use crate::services::posts::{PostRecord, PostThread, QuotedRecord};
use crate::services::users::ProfileRecord;

const AVATAR_FALLBACK: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorView {
    pub name: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedPostView {
    pub id: Uuid,
    pub user: AuthorView,
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub user: AuthorView,
    /// Relative age, e.g. "5m".
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub quoted_post: Option<QuotedPostView>,
    pub likes: i64,
    pub is_liked: bool,
    pub replies: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostThreadView {
    pub post: PostView,
    pub detail_time: DetailTime,
    pub replies: Vec<PostView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub user_id: Uuid,
    pub display_name: String,
    pub username: String,
    pub avatar: String,
    pub banner_image: Option<String>,
    pub bio: Option<String>,
    pub joined_date: String,
    pub post_count: i64,
    pub following: i64,
    pub followers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePageView {
    pub profile: ProfileView,
    pub posts: Vec<PostView>,
    pub is_following: bool,
    pub is_own_profile: bool,
}

/// Current values for the profile edit form; raw, not decorated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEditView {
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub cover_image_url: Option<String>,
    pub profile_image_url: Option<String>,
}

pub fn decorate_username(username: &str) -> String {
    format!("@{username}")
}

pub fn avatar_url(username: &str, profile_image_url: Option<&str>) -> String {
    match profile_image_url {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("{AVATAR_FALLBACK}{username}"),
    }
}

pub fn author_view(user: &User) -> AuthorView {
    AuthorView {
        name: user.display_name.clone(),
        username: decorate_username(&user.username),
        avatar: avatar_url(&user.username, user.profile_image_url.as_deref()),
    }
}

fn quoted_view(quoted: &QuotedRecord, now: DateTime<Utc>) -> QuotedPostView {
    QuotedPostView {
        id: quoted.post.id,
        user: author_view(&quoted.author),
        timestamp: format::relative_time(quoted.post.created_at, now),
        created_at: quoted.post.created_at,
        content: quoted.post.content.clone(),
    }
}

pub fn post_view(record: &PostRecord, now: DateTime<Utc>) -> PostView {
    PostView {
        id: record.post.id,
        user: author_view(&record.author),
        timestamp: format::relative_time(record.post.created_at, now),
        created_at: record.post.created_at,
        content: record.post.content.clone(),
        quoted_post: record.quoted.as_ref().map(|q| quoted_view(q, now)),
        likes: record.like_count,
        is_liked: record.is_liked,
        replies: record.reply_count,
    }
}

pub fn post_views(records: &[PostRecord], now: DateTime<Utc>) -> Vec<PostView> {
    records.iter().map(|r| post_view(r, now)).collect()
}

pub fn thread_view(thread: &PostThread, now: DateTime<Utc>) -> PostThreadView {
    PostThreadView {
        post: post_view(&thread.post, now),
        detail_time: format::detail_time(thread.post.post.created_at),
        replies: post_views(&thread.replies, now),
    }
}

pub fn profile_view(record: &ProfileRecord) -> ProfileView {
    let user = &record.user;
    ProfileView {
        user_id: user.id,
        display_name: user.display_name.clone(),
        username: decorate_username(&user.username),
        avatar: avatar_url(&user.username, user.profile_image_url.as_deref()),
        banner_image: user.cover_image_url.clone().filter(|u| !u.is_empty()),
        bio: user.bio.clone().filter(|b| !b.is_empty()),
        joined_date: format::joined_date(user.created_at),
        post_count: record.post_count,
        following: record.following_count,
        followers: record.follower_count,
    }
}

pub fn edit_view(user: &User) -> ProfileEditView {
    ProfileEditView {
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        bio: user.bio.clone(),
        cover_image_url: user.cover_image_url.clone(),
        profile_image_url: user.profile_image_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 11, 38, 0).unwrap()
    }

    fn user(username: &str, avatar: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            external_id: format!("ext_{username}"),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            display_name: username.to_uppercase(),
            bio: None,
            profile_image_url: avatar.map(Into::into),
            cover_image_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap(),
        }
    }

    fn post(author: &User, content: &str, age: Duration) -> Post {
        Post {
            id: Uuid::new_v4(),
            user_id: author.id,
            content: content.to_string(),
            parent_id: None,
            quoted_post_id: None,
            created_at: now() - age,
        }
    }

    #[test]
    fn avatar_falls_back_to_generated_image() {
        assert_eq!(
            avatar_url("alice", None),
            "https://api.dicebear.com/7.x/avataaars/svg?seed=alice"
        );
        assert_eq!(avatar_url("alice", Some("")), avatar_url("alice", None));
        assert_eq!(avatar_url("alice", Some("https://cdn/a.png")), "https://cdn/a.png");
    }

    #[test]
    fn post_view_maps_counts_and_quote() {
        let alice = user("alice", None);
        let bob = user("bob", Some("https://cdn/bob.png"));
        let original = post(&bob, "original", Duration::days(400));
        let mut quote = post(&alice, "look at this", Duration::minutes(5));
        quote.quoted_post_id = Some(original.id);

        let record = PostRecord {
            post: quote.clone(),
            author: alice.clone(),
            like_count: 3,
            reply_count: 2,
            is_liked: true,
            quoted: Some(QuotedRecord {
                post: original.clone(),
                author: bob.clone(),
            }),
        };

        let view = post_view(&record, now());
        assert_eq!(view.id, quote.id);
        assert_eq!(view.user.username, "@alice");
        assert_eq!(view.user.name, "ALICE");
        assert_eq!(view.timestamp, "5m");
        assert_eq!(view.likes, 3);
        assert_eq!(view.replies, 2);
        assert!(view.is_liked);

        let quoted = view.quoted_post.unwrap();
        assert_eq!(quoted.id, original.id);
        assert_eq!(quoted.user.avatar, "https://cdn/bob.png");
        assert_eq!(quoted.timestamp, "Sep 12, 2024");
    }

    #[test]
    fn thread_view_keeps_reply_order() {
        let alice = user("alice", None);
        let head = post(&alice, "head", Duration::hours(2));
        let replies: Vec<PostRecord> = (0..3)
            .map(|i| PostRecord {
                post: post(&alice, &format!("reply {i}"), Duration::minutes(90 - i * 10)),
                author: alice.clone(),
                like_count: 0,
                reply_count: 0,
                is_liked: false,
                quoted: None,
            })
            .collect();

        let thread = PostThread {
            post: PostRecord {
                post: head,
                author: alice.clone(),
                like_count: 0,
                reply_count: 3,
                is_liked: false,
                quoted: None,
            },
            replies,
        };

        let view = thread_view(&thread, now());
        assert_eq!(view.detail_time.time, "9:38 AM");
        let contents: Vec<&str> = view.replies.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["reply 0", "reply 1", "reply 2"]);
        assert_eq!(view.post.replies, 3);
    }

    #[test]
    fn profile_view_formats_fields() {
        let mut alice = user("alice", None);
        alice.bio = Some(String::new());
        alice.cover_image_url = Some("https://cdn/cover.png".into());

        let view = profile_view(&ProfileRecord {
            user: alice,
            post_count: 7,
            follower_count: 2,
            following_count: 5,
        });

        assert_eq!(view.username, "@alice");
        assert_eq!(view.joined_date, "January 2024");
        assert_eq!(view.bio, None);
        assert_eq!(view.banner_image.as_deref(), Some("https://cdn/cover.png"));
        assert_eq!((view.post_count, view.followers, view.following), (7, 2, 5));
    }

    #[test]
    fn serialized_post_uses_snake_case() {
        let alice = user("alice", None);
        let record = PostRecord {
            post: post(&alice, "hello", Duration::seconds(5)),
            author: alice,
            like_count: 0,
            reply_count: 0,
            is_liked: false,
            quoted: None,
        };
        let value = serde_json::to_value(post_view(&record, now())).unwrap();
        assert_eq!(value["timestamp"], "now");
        assert_eq!(value["is_liked"], false);
        assert!(value["quoted_post"].is_null());
    }
}
