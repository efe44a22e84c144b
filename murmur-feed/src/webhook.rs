//! Identity-provider webhooks: signature verification and payload parsing.
//!
//! Deliveries are signed with the Svix scheme:
//!
//!   svix-id:         msg_...
//!   svix-timestamp:  unix seconds
//!   svix-signature:  "v1,<base64> v1,<base64>"   (any entry may match)
//!
//! The signature is HMAC-SHA256 over `{id}.{timestamp}.{body}`, keyed with
//! the base64-decoded part of the `whsec_...` secret.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use murmur_shared::errors::{AppError, ErrorCode};

use crate::services::identity::IdentityProfile;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

/// Accepted clock skew between the provider and us, in seconds.
pub const TOLERANCE_SECS: i64 = 5 * 60;

const SECRET_PREFIX: &str = "whsec_";

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("webhook secret is not valid base64")]
    InvalidSecret,
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid timestamp header")]
    InvalidTimestamp,
    #[error("timestamp outside the tolerance window")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::new(ErrorCode::WebhookSignatureInvalid, format!("invalid signature: {err}"))
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookVerifier(***)")
    }
}

impl WebhookVerifier {
    pub fn from_secret(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = B64.decode(encoded).map_err(|_| SignatureError::InvalidSecret)?;
        Ok(Self { key })
    }

    /// Base64 signature of one delivery.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        B64.encode(self.mac(msg_id, timestamp, body))
    }

    fn mac(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }

    pub fn verify(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), SignatureError> {
        let msg_id = header(headers, HEADER_ID)?;
        let timestamp: i64 = header(headers, HEADER_TIMESTAMP)?
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let signatures = header(headers, HEADER_SIGNATURE)?;

        if (now - timestamp).abs() > TOLERANCE_SECS {
            return Err(SignatureError::Expired);
        }

        let expected = self.mac(msg_id, timestamp, body);
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .filter_map(|sig| B64.decode(sig).ok())
            .any(|candidate| bool::from(candidate.ct_eq(&expected)));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

// --- Payload ---

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeletedData {
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    Created(IdentityProfile),
    Updated(IdentityProfile),
    Deleted { external_id: String },
    Unhandled(String),
}

impl IdentityEvent {
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let envelope: Envelope = serde_json::from_slice(body).map_err(invalid_payload)?;

        match envelope.event_type.as_str() {
            "user.created" => Ok(Self::Created(user_profile(envelope.data)?)),
            "user.updated" => Ok(Self::Updated(user_profile(envelope.data)?)),
            "user.deleted" => {
                let data: DeletedData = serde_json::from_value(envelope.data).map_err(invalid_payload)?;
                Ok(Self::Deleted { external_id: data.id })
            }
            _ => Ok(Self::Unhandled(envelope.event_type)),
        }
    }
}

fn user_profile(data: serde_json::Value) -> Result<IdentityProfile, AppError> {
    let data: UserData = serde_json::from_value(data).map_err(invalid_payload)?;

    let email = data
        .email_addresses
        .into_iter()
        .next()
        .map(|e| e.email_address)
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::WebhookPayloadInvalid, "Email address not found"))?;

    Ok(IdentityProfile {
        external_id: data.id,
        email,
        username: data.username,
        first_name: data.first_name,
        last_name: data.last_name,
        image_url: data.image_url,
    })
}

fn invalid_payload(err: serde_json::Error) -> AppError {
    AppError::new(ErrorCode::WebhookPayloadInvalid, format!("malformed webhook payload: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const NOW: i64 = 1_760_700_000;

    fn signed_headers(verifier: &WebhookVerifier, timestamp: i64, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, HeaderValue::from_static("msg_p5jXN8AQM9LWM0D4loKWxJek"));
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_str(&timestamp.to_string()).unwrap());
        let sig = verifier.sign("msg_p5jXN8AQM9LWM0D4loKWxJek", timestamp, body);
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(&format!("v1,{sig}")).unwrap());
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let body = br#"{"type":"user.created","data":{}}"#;
        let headers = signed_headers(&verifier, NOW, body);

        verifier.verify(&headers, body, NOW).unwrap();
        verifier.verify(&headers, body, NOW + TOLERANCE_SECS).unwrap();
    }

    #[test]
    fn any_listed_signature_may_match() {
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let body = b"{}";
        let mut headers = signed_headers(&verifier, NOW, body);
        let good = headers[HEADER_SIGNATURE].to_str().unwrap().to_string();
        let rotated = format!("v1,c3RhbGUtc2lnbmF0dXJl {good}");
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(&rotated).unwrap());

        verifier.verify(&headers, body, NOW).unwrap();
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let headers = signed_headers(&verifier, NOW, b"original");

        assert!(matches!(
            verifier.verify(&headers, b"tampered", NOW),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn rejects_other_secret() {
        let signer = WebhookVerifier::from_secret("whsec_b3RoZXItc2VjcmV0").unwrap();
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let headers = signed_headers(&signer, NOW, b"{}");

        assert!(verifier.verify(&headers, b"{}", NOW).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let headers = signed_headers(&verifier, NOW - TOLERANCE_SECS - 1, b"{}");

        assert!(matches!(verifier.verify(&headers, b"{}", NOW), Err(SignatureError::Expired)));
    }

    #[test]
    fn rejects_missing_headers() {
        let verifier = WebhookVerifier::from_secret(SECRET).unwrap();
        let err = verifier.verify(&HeaderMap::new(), b"{}", NOW).unwrap_err();
        assert!(matches!(err, SignatureError::MissingHeader(HEADER_ID)));

        let app_err = AppError::from(err);
        assert_eq!(app_err.error_code(), Some(ErrorCode::WebhookSignatureInvalid));
    }

    #[test]
    fn bad_secret_is_reported() {
        assert!(matches!(
            WebhookVerifier::from_secret("whsec_not base64!"),
            Err(SignatureError::InvalidSecret)
        ));
    }

    #[test]
    fn parses_created_event() {
        let body = br#"{
            "type": "user.created",
            "data": {
                "id": "user_29w83sxmDNGwOuEthce5gg56FcC",
                "email_addresses": [{ "email_address": "alice@example.com", "id": "idn_1" }],
                "first_name": "Alice",
                "last_name": null,
                "username": null,
                "image_url": "https://img.example.com/alice.png"
            }
        }"#;

        let IdentityEvent::Created(profile) = IdentityEvent::parse(body).unwrap() else {
            panic!("expected a created event");
        };
        assert_eq!(profile.external_id, "user_29w83sxmDNGwOuEthce5gg56FcC");
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.display_name(), "Alice");
        assert_eq!(profile.avatar(), Some("https://img.example.com/alice.png"));
    }

    #[test]
    fn created_without_email_is_rejected() {
        let body = br#"{"type":"user.created","data":{"id":"user_1","email_addresses":[]}}"#;
        let err = IdentityEvent::parse(body).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::WebhookPayloadInvalid));
    }

    #[test]
    fn parses_deleted_and_unhandled() {
        let deleted = br#"{"type":"user.deleted","data":{"id":"user_1","deleted":true}}"#;
        assert_eq!(
            IdentityEvent::parse(deleted).unwrap(),
            IdentityEvent::Deleted { external_id: "user_1".into() }
        );

        let session = br#"{"type":"session.created","data":{"id":"sess_1"}}"#;
        assert_eq!(
            IdentityEvent::parse(session).unwrap(),
            IdentityEvent::Unhandled("session.created".into())
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = IdentityEvent::parse(b"not json").unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::WebhookPayloadInvalid));
    }
}
