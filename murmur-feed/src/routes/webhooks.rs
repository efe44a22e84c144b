use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use murmur_shared::clients::db::checkout;
use murmur_shared::errors::AppResult;
use murmur_shared::types::event::payloads::SyncAction;
use murmur_shared::types::ApiResponse;

use crate::events::publisher;
use crate::services::identity::{self, CreateOutcome};
use crate::view_cache::ViewPath;
use crate::webhook::IdentityEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// What a delivery did to the local users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Created(Uuid),
    AlreadyExists,
    Updated(Uuid),
    Deleted(Uuid),
    AlreadyDeleted,
    Unhandled(String),
}

impl SyncResult {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Created(_) => "User created successfully",
            Self::AlreadyExists => "User already exists",
            Self::Updated(_) => "User updated successfully",
            Self::Deleted(_) => "User deleted successfully",
            Self::AlreadyDeleted => "User already deleted",
            Self::Unhandled(_) => "Event type not handled",
        }
    }

    /// Every outcome is acknowledged with 200 so the provider stops retrying.
    pub fn into_ack(self) -> ApiResponse<WebhookAck> {
        let message = self.message();
        let ack = match self {
            Self::Created(id) | Self::Updated(id) | Self::Deleted(id) => WebhookAck {
                user_id: Some(id),
                event_type: None,
            },
            Self::AlreadyExists | Self::AlreadyDeleted => WebhookAck {
                user_id: None,
                event_type: None,
            },
            Self::Unhandled(event_type) => WebhookAck {
                user_id: None,
                event_type: Some(event_type),
            },
        };
        ApiResponse::ok_with_message(ack, message)
    }
}

// --- POST /webhooks/identity ---

pub async fn identity_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    if let Err(e) = state.webhook.verify(&headers, &body, chrono::Utc::now().timestamp()) {
        tracing::warn!(error = %e, "rejected identity webhook");
        return Err(e.into());
    }

    let result = apply(&state, IdentityEvent::parse(&body)?).await?;
    Ok(Json(result.into_ack()))
}

async fn apply(state: &AppState, event: IdentityEvent) -> AppResult<SyncResult> {
    match event {
        IdentityEvent::Created(profile) => {
            let outcome = {
                let mut conn = checkout(&state.db)?;
                identity::sync_created(&mut conn, &profile)?
            };

            match outcome {
                CreateOutcome::Created(user) => {
                    publisher::publish_user_synced(
                        &state.rabbitmq,
                        &profile.external_id,
                        Some(user.id),
                        SyncAction::Created,
                    )
                    .await;
                    Ok(SyncResult::Created(user.id))
                }
                CreateOutcome::AlreadyExists => Ok(SyncResult::AlreadyExists),
            }
        }

        IdentityEvent::Updated(profile) => {
            let updated = {
                let mut conn = checkout(&state.db)?;
                identity::sync_updated(&mut conn, &profile)?
            };

            state
                .view_cache
                .invalidate(&ViewPath::after_identity_changed(&[
                    updated.previous_username.as_str(),
                    updated.user.username.as_str(),
                ]))
                .await;
            publisher::publish_user_synced(
                &state.rabbitmq,
                &profile.external_id,
                Some(updated.user.id),
                SyncAction::Updated,
            )
            .await;

            Ok(SyncResult::Updated(updated.user.id))
        }

        IdentityEvent::Deleted { external_id } => {
            let deleted = {
                let mut conn = checkout(&state.db)?;
                identity::sync_deleted(&mut conn, &external_id)?
            };

            let Some(user) = deleted else {
                return Ok(SyncResult::AlreadyDeleted);
            };

            state
                .view_cache
                .invalidate(&ViewPath::after_identity_changed(&[user.username.as_str()]))
                .await;
            publisher::publish_user_synced(&state.rabbitmq, &external_id, Some(user.id), SyncAction::Deleted)
                .await;

            Ok(SyncResult::Deleted(user.id))
        }

        IdentityEvent::Unhandled(event_type) => {
            tracing::debug!(event_type = %event_type, "ignoring identity webhook");
            Ok(SyncResult::Unhandled(event_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack_json(result: SyncResult) -> serde_json::Value {
        serde_json::to_value(result.into_ack()).unwrap()
    }

    #[test]
    fn redelivered_create_is_acknowledged_without_user() {
        let value = ack_json(SyncResult::AlreadyExists);
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "User already exists");
        assert_eq!(value["data"], serde_json::json!({}));
    }

    #[test]
    fn applied_changes_carry_the_user_id() {
        let id = Uuid::new_v4();
        for (result, message) in [
            (SyncResult::Created(id), "User created successfully"),
            (SyncResult::Updated(id), "User updated successfully"),
            (SyncResult::Deleted(id), "User deleted successfully"),
        ] {
            let value = ack_json(result);
            assert_eq!(value["message"], message);
            assert_eq!(value["data"]["user_id"], id.to_string());
        }
    }

    #[test]
    fn repeated_delete_is_acknowledged() {
        let value = ack_json(SyncResult::AlreadyDeleted);
        assert_eq!(value["message"], "User already deleted");
        assert!(value["data"].get("user_id").is_none());
    }

    #[test]
    fn unknown_events_echo_their_type() {
        let value = ack_json(SyncResult::Unhandled("session.created".into()));
        assert_eq!(value["message"], "Event type not handled");
        assert_eq!(value["data"]["event_type"], "session.created");
    }
}
