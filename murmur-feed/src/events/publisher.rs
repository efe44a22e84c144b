use uuid::Uuid;

use murmur_shared::clients::rabbitmq::RabbitMQClient;
use murmur_shared::types::event::{payloads, routing_keys, Event};

const SOURCE: &str = "murmur-feed";

pub async fn publish_post_created(
    rabbitmq: &RabbitMQClient,
    post_id: Uuid,
    author_id: Uuid,
    kind: payloads::PostKind,
    target_post_id: Option<Uuid>,
) {
    let event = Event::new(
        SOURCE,
        routing_keys::FEED_POST_CREATED,
        payloads::PostCreated {
            post_id,
            author_id,
            kind,
            target_post_id,
        },
    )
    .with_user(author_id);

    if let Err(e) = rabbitmq.publish(routing_keys::FEED_POST_CREATED, &event).await {
        tracing::error!(error = %e, "failed to publish post.created event");
    }
}

pub async fn publish_like_toggled(
    rabbitmq: &RabbitMQClient,
    user_id: Uuid,
    post_id: Uuid,
    liked: bool,
    like_count: i64,
) {
    let routing_key = if liked {
        routing_keys::FEED_POST_LIKED
    } else {
        routing_keys::FEED_POST_UNLIKED
    };

    let event = Event::new(
        SOURCE,
        routing_key,
        payloads::LikeToggled {
            user_id,
            post_id,
            like_count,
        },
    )
    .with_user(user_id);

    if let Err(e) = rabbitmq.publish(routing_key, &event).await {
        tracing::error!(error = %e, routing_key, "failed to publish like event");
    }
}

pub async fn publish_follow_toggled(
    rabbitmq: &RabbitMQClient,
    follower_id: Uuid,
    following_id: Uuid,
    following: bool,
    follower_count: i64,
) {
    let routing_key = if following {
        routing_keys::FEED_USER_FOLLOWED
    } else {
        routing_keys::FEED_USER_UNFOLLOWED
    };

    let event = Event::new(
        SOURCE,
        routing_key,
        payloads::FollowToggled {
            follower_id,
            following_id,
            follower_count,
        },
    )
    .with_user(follower_id);

    if let Err(e) = rabbitmq.publish(routing_key, &event).await {
        tracing::error!(error = %e, routing_key, "failed to publish follow event");
    }
}

pub async fn publish_profile_updated(rabbitmq: &RabbitMQClient, user_id: Uuid, username: &str) {
    let event = Event::new(
        SOURCE,
        routing_keys::FEED_PROFILE_UPDATED,
        payloads::ProfileUpdated {
            user_id,
            username: username.to_string(),
        },
    )
    .with_user(user_id);

    if let Err(e) = rabbitmq.publish(routing_keys::FEED_PROFILE_UPDATED, &event).await {
        tracing::error!(error = %e, "failed to publish profile.updated event");
    }
}

pub async fn publish_user_synced(
    rabbitmq: &RabbitMQClient,
    external_id: &str,
    user_id: Option<Uuid>,
    action: payloads::SyncAction,
) {
    let mut event = Event::new(
        SOURCE,
        routing_keys::IDENTITY_USER_SYNCED,
        payloads::UserSynced {
            external_id: external_id.to_string(),
            user_id,
            action,
        },
    );
    if let Some(id) = user_id {
        event = event.with_user(id);
    }

    if let Err(e) = rabbitmq.publish(routing_keys::IDENTITY_USER_SYNCED, &event).await {
        tracing::error!(error = %e, "failed to publish user.synced event");
    }
}
