use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping all domain events.
///
/// Routing key format: `murmur.{domain}.{entity}.{action}`
/// Example: `murmur.feed.post.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

pub mod routing_keys {
    pub const FEED_POST_CREATED: &str = "murmur.feed.post.created";
    pub const FEED_POST_LIKED: &str = "murmur.feed.post.liked";
    pub const FEED_POST_UNLIKED: &str = "murmur.feed.post.unliked";
    pub const FEED_USER_FOLLOWED: &str = "murmur.feed.user.followed";
    pub const FEED_USER_UNFOLLOWED: &str = "murmur.feed.user.unfollowed";
    pub const FEED_PROFILE_UPDATED: &str = "murmur.feed.profile.updated";

    pub const IDENTITY_USER_SYNCED: &str = "murmur.identity.user.synced";
}

pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum PostKind {
        Post,
        Reply,
        Quote,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PostCreated {
        pub post_id: Uuid,
        pub author_id: Uuid,
        pub kind: PostKind,
        /// Parent for replies, quoted post for quotes.
        pub target_post_id: Option<Uuid>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LikeToggled {
        pub user_id: Uuid,
        pub post_id: Uuid,
        pub like_count: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FollowToggled {
        pub follower_id: Uuid,
        pub following_id: Uuid,
        pub follower_count: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProfileUpdated {
        pub user_id: Uuid,
        pub username: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SyncAction {
        Created,
        Updated,
        Deleted,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserSynced {
        pub external_id: String,
        pub user_id: Option<Uuid>,
        pub action: SyncAction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_user() {
        let user = Uuid::new_v4();
        let event = Event::new(
            "murmur-feed",
            routing_keys::FEED_POST_LIKED,
            payloads::LikeToggled { user_id: user, post_id: Uuid::new_v4(), like_count: 3 },
        )
        .with_user(user);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "murmur.feed.post.liked");
        assert_eq!(value["user_id"], user.to_string());
        assert_eq!(value["data"]["like_count"], 3);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_value(payloads::PostKind::Quote).unwrap(), "quote");
        assert_eq!(serde_json::to_value(payloads::SyncAction::Deleted).unwrap(), "deleted");
    }
}
