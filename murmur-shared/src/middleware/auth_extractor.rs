use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims, JwtSecretSource};

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: JwtSecretSource + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = validate_jwt(&token, state.jwt_secret())?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(AppError::authentication_required)?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "authorization header must use Bearer scheme"))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Anonymous callers and bad tokens both come through as `None`.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: JwtSecretSource + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(err) => {
                if parts.headers.contains_key("Authorization") {
                    tracing::debug!(error = %err, "ignoring unusable session token");
                }
                Ok(Self(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::JwtSecret;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token_for(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn parts_with(header: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/timeline");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn state() -> JwtSecret {
        JwtSecret(SECRET.to_string())
    }

    #[tokio::test]
    async fn valid_token_yields_external_id() {
        let token = token_for(&Claims::new("user_2abc", 3600), SECRET);
        let mut parts = parts_with(Some(format!("Bearer {token}")));

        let user = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap();
        assert_eq!(user.external_id, "user_2abc");
    }

    #[tokio::test]
    async fn missing_header_requires_authentication() {
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::AuthenticationRequired));
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let token = token_for(&Claims::new("user_2abc", 3600), "other-secret");
        let mut parts = parts_with(Some(format!("Bearer {token}")));

        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::TokenInvalid));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let claims = Claims::new("user_2abc", -3600);
        let err = validate_jwt(&token_for(&claims, SECRET), SECRET).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::TokenExpired));
    }

    #[tokio::test]
    async fn optional_user_swallows_bad_scheme() {
        let mut parts = parts_with(Some("Basic abc".into()));
        let OptionalAuthUser(user) = OptionalAuthUser::from_request_parts(&mut parts, &state())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
