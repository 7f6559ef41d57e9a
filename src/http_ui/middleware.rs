use bytes::Bytes;
use cookie::Cookie;
use hmac::{digest::InvalidLength, Hmac, Mac};
use http_body_util::Full;
use hyper::{header, HeaderMap, Response};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::auth::{SessionStore, UserId, UserStore};

use super::responses;

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Authentication context extracted from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID from session
    pub user_id: UserId,
    /// Email of the logged-in user
    pub email: String,
}

/// Session-based authentication gate.
///
/// The cookie carries `<token>.<signature>`; the signature is an HMAC of the
/// token under the server's session secret. Unsigned or tampered cookies are
/// treated as absent.
#[derive(Clone)]
pub struct SessionAuth {
    session_store: Arc<SessionStore>,
    user_store: Arc<UserStore>,
    mac: HmacSha256,
}

impl SessionAuth {
    pub fn new(
        session_store: Arc<SessionStore>,
        user_store: Arc<UserStore>,
        secret: &[u8],
    ) -> Result<Self, InvalidLength> {
        Ok(Self {
            session_store,
            user_store,
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    fn signature(&self, session_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(session_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn sign(&self, session_id: &str) -> String {
        format!("{}.{}", session_id, self.signature(session_id))
    }

    /// Returns the token from a signed cookie value if the signature matches
    fn unsign(&self, value: &str) -> Option<String> {
        let (session_id, signature) = value.rsplit_once('.')?;
        let expected = self.signature(session_id);
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Some(session_id.to_string())
        } else {
            tracing::debug!("Rejected session cookie with bad signature");
            None
        }
    }

    /// Extracts the verified session ID from the cookie header
    pub fn extract_session_id(&self, headers: &HeaderMap) -> Option<String> {
        let cookie_header = headers.get(header::COOKIE)?;
        let cookie_str = cookie_header.to_str().ok()?;

        for cookie_pair in cookie_str.split(';') {
            if let Ok(cookie) = Cookie::parse(cookie_pair.trim()) {
                if cookie.name() == SESSION_COOKIE_NAME {
                    return self.unsign(cookie.value());
                }
            }
        }

        None
    }

    /// Checks if the request has a valid session and returns user context
    #[tracing::instrument(skip(self, headers), fields(user_id))]
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<AuthContext> {
        let session_id = self.extract_session_id(headers)?;

        let user_id = self.session_store.get_session(&session_id)?;
        tracing::Span::current().record("user_id", user_id);

        match self.user_store.get_user_by_id(user_id) {
            Ok(Some(user)) => {
                tracing::debug!(user_id, "Authenticated user");
                Some(AuthContext {
                    user_id,
                    email: user.email,
                })
            }
            Ok(None) => {
                tracing::warn!(user_id, "Session valid but user not found");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error fetching user");
                None
            }
        }
    }

    /// Returns the unauthenticated response: 302 back to the home page
    pub fn login_redirect_response(&self) -> Response<Full<Bytes>> {
        responses::redirect("/")
    }

    /// Creates a signed session cookie
    pub fn create_session_cookie(&self, session_id: &str) -> String {
        let max_age = self.session_store.session_lifetime().as_secs() as i64;
        Cookie::build((SESSION_COOKIE_NAME, self.sign(session_id)))
            .path("/")
            .max_age(cookie::time::Duration::seconds(max_age))
            .http_only(true)
            .same_site(cookie::SameSite::Strict)
            .build()
            .to_string()
    }

    /// Creates a cookie that clears the session (for logout)
    pub fn clear_session_cookie(&self) -> String {
        Cookie::build((SESSION_COOKIE_NAME, ""))
            .path("/")
            .max_age(cookie::time::Duration::ZERO)
            .http_only(true)
            .same_site(cookie::SameSite::Strict)
            .build()
            .to_string()
    }
}

/// Helper to check if a path is public (doesn't require authentication)
pub fn is_public_path(path: &str) -> bool {
    matches!(path, "/" | "/register" | "/login" | "/logout" | "/health")
}
