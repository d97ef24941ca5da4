use std::collections::{HashMap, HashSet};

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts, Query};
use axum::http::request::Parts;
use chrono::{Duration, NaiveDateTime, Utc};
use ring::hmac;
use serde::Deserialize;
use thiserror::Error;

use crate::error::ApiError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Rejections of a signed request. Messages are returned verbatim to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing argument: user")]
    MissingUser,
    #[error("user is unknown")]
    UnknownUser,
    #[error("timestamp format: %Y-%m-%dT%H:%M:%S")]
    TimestampFormat,
    #[error("timestamp has expired")]
    Expired,
    #[error("signature is invalid")]
    InvalidSignature,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// API user name to the key its requests are signed with.
    pub users: HashMap<String, String>,
    /// Users allowed to see office contact details.
    pub internal_users: HashSet<String>,
    pub timestamp_expiry: Duration,
}

impl AuthConfig {
    /// Parse `user:key` pairs separated by commas.
    pub fn parse_users(raw: &str) -> Result<HashMap<String, String>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once(':') {
                Some((user, key)) if !user.trim().is_empty() && !key.trim().is_empty() => {
                    Ok((user.trim().to_string(), key.trim().to_string()))
                }
                _ => Err(format!("malformed API user entry {pair:?}, expected user:key")),
            })
            .collect()
    }

    pub fn parse_user_list(raw: &str) -> HashSet<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn verify(&self, params: &SignedParams) -> Result<SignedUser, SignatureError> {
        self.verify_at(params, Utc::now().naive_utc())
    }

    pub fn verify_at(
        &self,
        params: &SignedParams,
        now: NaiveDateTime,
    ) -> Result<SignedUser, SignatureError> {
        let user = params
            .user
            .as_deref()
            .filter(|user| !user.is_empty())
            .ok_or(SignatureError::MissingUser)?;
        let key = self.users.get(user).ok_or(SignatureError::UnknownUser)?;

        let raw_timestamp = params.timestamp.as_deref().unwrap_or_default();
        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| SignatureError::TimestampFormat)?;
        if (now - timestamp).abs() > self.timestamp_expiry {
            return Err(SignatureError::Expired);
        }

        let provided = params
            .signature
            .as_deref()
            .and_then(|signature| hex::decode(signature).ok())
            .ok_or(SignatureError::InvalidSignature)?;
        let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
        hmac::verify(&key, signed_message(user, raw_timestamp).as_bytes(), &provided)
            .map_err(|_| SignatureError::InvalidSignature)?;

        Ok(SignedUser {
            user: user.to_string(),
            internal: self.internal_users.contains(user),
        })
    }
}

fn signed_message(user: &str, timestamp: &str) -> String {
    format!("timestamp={timestamp}&user={user}")
}

/// Hex HMAC-SHA256 a caller must send as `signature`.
pub fn compute_signature(api_key: &str, user: &str, timestamp: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, api_key.as_bytes());
    let tag = hmac::sign(&key, signed_message(user, timestamp).as_bytes());
    hex::encode(tag.as_ref())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignedParams {
    pub user: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
}

/// An API consumer whose request signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub user: String,
    pub internal: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for SignedUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);
        let Query(params) = Query::<SignedParams>::try_from_uri(&parts.uri)
            .map_err(|err| ApiError::BadRequest(err.body_text()))?;

        Ok(config.verify(&params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            users: HashMap::from([
                ("labonneboite".to_string(), "secret".to_string()),
                ("partner".to_string(), "other".to_string()),
            ]),
            internal_users: HashSet::from(["labonneboite".to_string()]),
            timestamp_expiry: Duration::minutes(10),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-01T12:00:00", TIMESTAMP_FORMAT).unwrap()
    }

    fn signed(user: &str, timestamp: &str) -> SignedParams {
        SignedParams {
            user: Some(user.into()),
            timestamp: Some(timestamp.into()),
            signature: Some(compute_signature("secret", user, timestamp)),
        }
    }

    #[test]
    fn accepts_fresh_signature() {
        let user = config().verify_at(&signed("labonneboite", "2024-03-01T11:55:00"), now()).unwrap();
        assert_eq!(user.user, "labonneboite");
        assert!(user.internal);
    }

    #[test]
    fn rejects_in_order() {
        let config = config();

        let missing = SignedParams::default();
        assert_eq!(config.verify_at(&missing, now()), Err(SignatureError::MissingUser));

        let unknown = signed("unknown", "2024-03-01T12:00:00");
        assert_eq!(config.verify_at(&unknown, now()), Err(SignatureError::UnknownUser));

        let bad_format = signed("labonneboite", "2007");
        let err = config.verify_at(&bad_format, now()).unwrap_err();
        assert_eq!(err.to_string(), "timestamp format: %Y-%m-%dT%H:%M:%S");

        let expired = signed("labonneboite", "2024-03-01T11:40:00");
        assert_eq!(config.verify_at(&expired, now()), Err(SignatureError::Expired));

        let mut forged = signed("labonneboite", "2024-03-01T12:00:00");
        forged.signature = Some("x".into());
        assert_eq!(config.verify_at(&forged, now()), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn signature_is_bound_to_the_user_key() {
        // partner's key is "other", so a signature made with "secret" fails.
        let params = signed("partner", "2024-03-01T12:00:00");
        assert_eq!(config().verify_at(&params, now()), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn parses_user_lists() {
        let users = AuthConfig::parse_users("labonneboite:abc, partner:def").unwrap();
        assert_eq!(users.get("partner").map(String::as_str), Some("def"));
        assert!(AuthConfig::parse_users("nokey").is_err());
        assert!(AuthConfig::parse_users("").unwrap().is_empty());
    }
}
