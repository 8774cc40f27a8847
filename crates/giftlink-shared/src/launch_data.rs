//! Verification of the signed launch data a Mini App sends with every call.
//!
//! The platform signs the launch parameters with a key derived from the
//! bot token:
//!
//! ```text
//! secret_key = HMAC-SHA256(key = "WebAppData", msg = bot_token)
//! hash       = hex(HMAC-SHA256(key = secret_key, msg = check_string))
//! ```
//!
//! where `check_string` is every field except `hash`, sorted by key and
//! joined as `key=value` lines. Values are taken exactly as decoded from the
//! query string, never re-encoded.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use crate::constants::{
    AUTH_DATE_FIELD, HASH_FIELD, START_PARAM_FIELD, USER_FIELD, WEB_APP_DATA_KEY,
};
use crate::error::AuthError;
use crate::identity::UserClaims;

type HmacSha256 = Hmac<Sha256>;

/// Claims extracted from a verified launch string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchData {
    pub user: UserClaims,
    pub auth_date: Option<DateTime<Utc>>,
    pub start_param: Option<String>,
}

/// Verifies launch data against a bot token, optionally rejecting stale
/// payloads.
#[derive(Clone)]
pub struct LaunchDataVerifier {
    bot_token: String,
    max_age: Option<Duration>,
}

impl std::fmt::Debug for LaunchDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchDataVerifier")
            .field("bot_token", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl LaunchDataVerifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age: None,
        }
    }

    /// Reject payloads whose `auth_date` is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn verify(&self, raw: &str) -> Result<LaunchData, AuthError> {
        self.verify_at(raw, Utc::now())
    }

    /// Verify as if the current time were `now`.
    pub fn verify_at(&self, raw: &str, now: DateTime<Utc>) -> Result<LaunchData, AuthError> {
        // An empty token yields a key anyone can derive.
        if self.bot_token.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let mut fields = parse_fields(raw);

        let received = fields.remove(HASH_FIELD).ok_or(AuthError::MissingHash)?;
        let expected = compute_hash(&fields, &self.bot_token)?;

        let received = received.as_bytes();
        let expected = expected.as_bytes();
        if received.len() != expected.len() || received.ct_eq(expected).unwrap_u8() != 1 {
            return Err(AuthError::SignatureMismatch);
        }

        let auth_date = fields.get(AUTH_DATE_FIELD).map(|value| parse_auth_date(value));

        // Without a max age, `auth_date` is informational only.
        let auth_date = match self.max_age {
            Some(max_age) => {
                let issued = auth_date.ok_or(AuthError::MalformedAuthDate)??;
                let max_age = chrono::Duration::from_std(max_age)
                    .map_err(|_| AuthError::MalformedAuthDate)?;
                if now.signed_duration_since(issued) > max_age {
                    return Err(AuthError::Expired);
                }
                Some(issued)
            }
            None => auth_date.and_then(Result::ok),
        };

        let user_json = fields.get(USER_FIELD).ok_or(AuthError::MissingUser)?;
        let user: UserClaims = serde_json::from_str(user_json)
            .map_err(|e| AuthError::MalformedUser(e.to_string()))?;

        Ok(LaunchData {
            user,
            auth_date,
            start_param: fields.remove(START_PARAM_FIELD),
        })
    }
}

/// Verify `raw` against `bot_token` and return the embedded identity.
pub fn verify(raw: &str, bot_token: &str) -> Result<UserClaims, AuthError> {
    LaunchDataVerifier::new(bot_token)
        .verify(raw)
        .map(|data| data.user)
}

/// Produce a signed, URL-encoded launch string for `fields`.
///
/// Any `hash` entry in `fields` is replaced by the computed signature.
pub fn sign_launch_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String, AuthError> {
    let map: BTreeMap<String, String> = fields
        .iter()
        .filter(|(key, _)| *key != HASH_FIELD)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let hash = compute_hash(&map, bot_token)?;

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &map {
        serializer.append_pair(key, value);
    }
    serializer.append_pair(HASH_FIELD, &hash);
    Ok(serializer.finish())
}

/// Decode the query string. The last occurrence of a key wins.
fn parse_fields(raw: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(raw.trim().as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compute_hash(fields: &BTreeMap<String, String>, bot_token: &str) -> Result<String, AuthError> {
    let secret_key = hmac_sha256(WEB_APP_DATA_KEY, bot_token.as_bytes())?;
    let signature = hmac_sha256(&secret_key, check_string(fields).as_bytes())?;
    Ok(hex::encode(signature))
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| AuthError::SignatureMismatch)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn parse_auth_date(value: &str) -> Result<DateTime<Utc>, AuthError> {
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|_| AuthError::MalformedAuthDate)?;
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::MalformedAuthDate)
}
