use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use diesel::prelude::*;
use uuid::Uuid;

use murmur_shared::clients::db::checkout;
use murmur_shared::errors::{AppError, AppResult};
use murmur_shared::middleware::OptionalAuthUser;

use crate::schema::users;
use crate::AppState;

/// The local user behind a verified session token.
#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
}

/// The caller of the current request, resolved once and passed to every
/// service function that cares who is asking.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<SessionUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn for_user(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// Mutations call this before touching storage.
    pub fn require(&self) -> AppResult<&SessionUser> {
        self.user.as_ref().ok_or_else(AppError::authentication_required)
    }

    /// Maps an external identity to the local user. A verified token whose
    /// user has not been synced yet resolves to an anonymous session.
    pub fn resolve(conn: &mut PgConnection, external_id: &str) -> AppResult<Self> {
        let user = users::table
            .filter(users::external_id.eq(external_id))
            .select((users::id, users::username))
            .first::<SessionUser>(conn)
            .optional()?;

        if user.is_none() {
            tracing::debug!(external_id = %external_id, "session token has no local user yet");
        }
        Ok(Self { user })
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let OptionalAuthUser(auth) = OptionalAuthUser::from_request_parts(parts, state).await?;
        let Some(auth) = auth else {
            return Ok(Session::anonymous());
        };

        let mut conn = checkout(&state.db)?;
        Session::resolve(&mut conn, &auth.external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_shared::errors::ErrorCode;

    #[test]
    fn anonymous_session_requires_auth() {
        let err = Session::anonymous().require().unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::AuthenticationRequired));
    }

    #[test]
    fn user_session_exposes_id() {
        let id = Uuid::new_v4();
        let session = Session::for_user(SessionUser { id, username: "alice".into() });
        assert_eq!(session.user_id(), Some(id));
        assert_eq!(session.require().unwrap().username, "alice");
        assert!(!session.is_anonymous());
    }
}
