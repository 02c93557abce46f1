//! Session tokens and request authentication.
//!
//! # Invariants
//! - Sessions are HS256 JWTs whose `sub` is the user id.
//! - A token is accepted from the `access_token` cookie or an
//!   `Authorization: Bearer` header, cookie first.
//! - The originating connection named by `x-sync-connection` is passed
//!   through unverified; the task service checks its owner.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uptask_core::{ConnectionId, IdentityStore, Principal, SqliteUserRepository, UserId};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "access_token";
pub const CONNECTION_HEADER: &str = "x-sync-connection";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Issues a session token for `user`.
    pub fn issue(&self, user: UserId) -> Result<String, ApiError> {
        let now = unix_now();
        let claims = Claims {
            sub: user.to_string(),
            iat: now,
            exp: now + self.inner.ttl.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
            .map_err(|err| ApiError::Internal(format!("failed to sign session: {err}")))
    }

    /// Returns the user named by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let data = decode::<Claims>(token, &self.inner.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|err| {
                debug!("event=session_verify module=auth status=denied reason={err}");
                ApiError::InvalidSession
            })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::InvalidSession)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Session token carried by the request, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// `Set-Cookie` value that stores a session.
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Resolves a session token to an existing account.
pub async fn authenticate(state: &AppState, token: Option<String>) -> Result<UserId, ApiError> {
    let token = token.ok_or(ApiError::Unauthenticated)?;
    let user = state.sessions.verify(&token)?;
    let exists = state
        .db
        .run(move |conn| Ok(SqliteUserRepository::new(conn).find_by_id(user)?.is_some()))
        .await?;
    if !exists {
        warn!("event=session_verify module=auth status=denied reason=unknown_user user_id={user}");
        return Err(ApiError::InvalidSession);
    }
    Ok(user)
}

/// Authenticated caller of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub connection: Option<ConnectionId>,
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id).with_connection(self.connection)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = authenticate(state, session_token(&parts.headers)).await?;
        let connection = parts
            .headers
            .get(CONNECTION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<ConnectionId>().ok());
        Ok(Self { id, connection })
    }
}

#[cfg(test)]
mod tests {
    use super::{clear_session_cookie, session_cookie, session_token, SessionKeys};
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use axum::http::{HeaderMap, HeaderValue};
    use std::time::Duration;
    use uuid::Uuid;

    const SECRET: &[u8] = b"0123456789abcdef0123";

    #[test]
    fn issued_token_verifies_to_same_user() {
        let keys = SessionKeys::new(SECRET, Duration::from_secs(3600));
        let user = Uuid::new_v4();
        let token = keys.issue(user).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), user);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let keys = SessionKeys::new(SECRET, Duration::from_secs(3600));
        let other = SessionKeys::new(b"another-secret-value", Duration::from_secs(3600));
        let token = other.issue(Uuid::new_v4()).unwrap();
        assert!(keys.verify(&token).is_err());
        assert!(keys.verify("garbage").is_err());
    }

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=from-cookie"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token="));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookies_carry_expected_attributes() {
        let set = session_cookie("abc", Duration::from_secs(60), true);
        assert!(set.starts_with("access_token=abc;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Max-Age=60"));
        assert!(set.ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
