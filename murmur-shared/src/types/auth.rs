use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Session token claims issued by the identity provider.
///
/// `sub` is the provider's user id (the "external id"), not the local one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl Claims {
    pub fn new(external_id: impl Into<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: external_id.into(),
            iat: now,
            exp: now + duration_secs,
            sid: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// A caller whose token verified. Not yet resolved to a local user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub external_id: String,
    pub session_id: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            external_id: claims.sub,
            session_id: claims.sid,
        }
    }
}

/// HMAC secret used to verify session tokens.
#[derive(Clone)]
pub struct JwtSecret(pub String);

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret(..)")
    }
}

/// Anything that can hand the auth extractors the token secret.
pub trait JwtSecretSource {
    fn jwt_secret(&self) -> &str;
}

impl JwtSecretSource for JwtSecret {
    fn jwt_secret(&self) -> &str {
        &self.0
    }
}

impl<T: JwtSecretSource + ?Sized> JwtSecretSource for Arc<T> {
    fn jwt_secret(&self) -> &str {
        (**self).jwt_secret()
    }
}
