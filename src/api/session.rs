//! Signed, client-side session cookie.
//!
//! The cookie value is `base64url(json) "." base64url(hmac_sha256(json))`.
//! Anything that fails to verify (bad signature, bad encoding, expired) is
//! read as an empty session: callers never see a decoding error.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::model::UserId;

pub const SESSION_COOKIE_NAME: &str = "postboard_session";
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const MIN_SECRET_KEY_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Per-browser session state. Names at most one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "uid", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(rename = "iat", default)]
    issued_at: i64,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Replace all state with a session naming `user_id`.
    pub(crate) fn bind(&mut self, user_id: UserId, now: i64) {
        *self = Self {
            user_id: Some(user_id),
            issued_at: now,
        };
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Error)]
pub enum SessionKeyError {
    #[error("session secret key must be at least {MIN_SECRET_KEY_LEN} bytes")]
    TooShort,
    #[error("invalid session secret key")]
    Invalid,
}

/// Signing key and cookie attributes for sessions.
#[derive(Clone)]
pub struct SessionConfig {
    mac: HmacSha256,
    ttl_seconds: i64,
    cookie_secure: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret_key", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl SessionConfig {
    /// # Errors
    /// Returns an error if the key is shorter than [`MIN_SECRET_KEY_LEN`].
    pub fn new(secret_key: &SecretString) -> Result<Self, SessionKeyError> {
        let key = secret_key.expose_secret().as_bytes();
        if key.len() < MIN_SECRET_KEY_LEN {
            return Err(SessionKeyError::TooShort);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| SessionKeyError::Invalid)?;
        Ok(Self {
            mac,
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: false,
        })
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    /// Serialize and sign `session` into a cookie value.
    #[must_use]
    pub fn encode(&self, session: &Session) -> String {
        // Serializing a struct of integers cannot fail.
        let payload = serde_json::to_vec(session).unwrap_or_default();
        let mut mac = self.mac.clone();
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(&payload),
            Base64UrlUnpadded::encode_string(&tag)
        )
    }

    /// Verify and parse a cookie value. Returns the empty session on any
    /// failure or when the session is older than the TTL.
    #[must_use]
    pub fn decode(&self, value: &str, now: i64) -> Session {
        let Some((payload, tag)) = value.split_once('.') else {
            debug!("session cookie is malformed");
            return Session::default();
        };
        let (Ok(payload), Ok(tag)) = (
            Base64UrlUnpadded::decode_vec(payload),
            Base64UrlUnpadded::decode_vec(tag),
        ) else {
            debug!("session cookie is not base64url");
            return Session::default();
        };

        let mut mac = self.mac.clone();
        mac.update(&payload);
        if mac.verify_slice(&tag).is_err() {
            debug!("session cookie signature mismatch");
            return Session::default();
        }

        let Ok(session) = serde_json::from_slice::<Session>(&payload) else {
            debug!("session cookie payload is invalid");
            return Session::default();
        };

        if session.issued_at.saturating_add(self.ttl_seconds) < now {
            debug!("session cookie expired");
            return Session::default();
        }

        session
    }

    /// Read the session from request headers.
    #[must_use]
    pub fn from_headers(&self, headers: &HeaderMap, now: i64) -> Session {
        extract_session_cookie(headers)
            .map(|value| self.decode(&value, now))
            .unwrap_or_default()
    }

    /// `Set-Cookie` value for `session`. An anonymous session clears the cookie.
    ///
    /// # Errors
    /// Returns an error if the cookie cannot be represented as a header value.
    pub fn set_cookie(&self, session: &Session) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = if session.is_anonymous() {
            format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
        } else {
            format!(
                "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                self.encode(session),
                self.ttl_seconds
            )
        };
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME {
                let val = val.trim();
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}
