use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, SessionStore, UserStore};
use crate::metrics::SharedMetrics;

use super::{
    forms,
    middleware::SessionAuth,
    responses,
    templates::{self, Notice},
    UiRequest,
};

const REGISTERED_MESSAGE: &str = "Registered! Please login.";
const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed.";
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
const LOGIN_ERROR_MESSAGE: &str = "Login error, please try again";

/// Handles GET / - login/register page, or straight to the vault
pub async fn handle_home(req: UiRequest, session_auth: Arc<SessionAuth>) -> Response<Full<Bytes>> {
    if session_auth.authenticate(req.headers()).is_some() {
        return responses::redirect("/vault");
    }

    responses::html_response(StatusCode::OK, templates::home_page(None))
}

/// Handles POST /register
#[tracing::instrument(skip_all, fields(email))]
pub async fn handle_register(
    req: UiRequest,
    user_store: Arc<UserStore>,
    metrics: SharedMetrics,
) -> Response<Full<Bytes>> {
    let fields = forms::parse_form(req.body());
    let email = fields.get("email").map(String::as_str).unwrap_or_default();
    let password = fields.get("password").map(String::as_str).unwrap_or_default();
    tracing::Span::current().record("email", email);

    let notice = match user_store.register(email, password).await {
        Ok(user) => {
            info!(user_id = user.user_id, "User registered");
            metrics.record_registration(true);
            Notice::Success(REGISTERED_MESSAGE)
        }
        Err(AuthError::DuplicateEmail) | Err(AuthError::InvalidInput(_)) => {
            debug!("Registration rejected");
            metrics.record_registration(false);
            Notice::Error(REGISTRATION_FAILED_MESSAGE)
        }
        Err(e) => {
            warn!(error = %e, "Registration error");
            metrics.record_registration(false);
            Notice::Error(REGISTRATION_FAILED_MESSAGE)
        }
    };

    responses::html_response(StatusCode::OK, templates::home_page(Some(notice)))
}

/// Handles POST /login - processes login form submission
#[tracing::instrument(skip_all, fields(email))]
pub async fn handle_login_submit(
    req: UiRequest,
    user_store: Arc<UserStore>,
    session_store: Arc<SessionStore>,
    session_auth: Arc<SessionAuth>,
    metrics: SharedMetrics,
) -> Response<Full<Bytes>> {
    let fields = forms::parse_form(req.body());
    let email = fields.get("email").map(String::as_str).unwrap_or_default();
    let password = fields.get("password").map(String::as_str).unwrap_or_default();
    tracing::Span::current().record("email", email);

    match user_store.verify(email, password).await {
        Ok(user) => {
            let session_id = session_store.create_session(user.user_id);
            metrics.record_login_attempt(true);
            info!(user_id = user.user_id, "User logged in");

            responses::redirect_with_cookie(
                "/vault",
                Some(session_auth.create_session_cookie(&session_id)),
            )
        }
        Err(AuthError::InvalidCredentials) => {
            metrics.record_login_attempt(false);
            warn!("Login failed");
            responses::html_response(
                StatusCode::OK,
                templates::home_page(Some(Notice::Error(INVALID_CREDENTIALS_MESSAGE))),
            )
        }
        Err(e) => {
            metrics.record_login_attempt(false);
            warn!(error = %e, "Login error");
            responses::html_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::home_page(Some(Notice::Error(LOGIN_ERROR_MESSAGE))),
            )
        }
    }
}

/// Handles GET /logout - destroys session and redirects home
#[tracing::instrument(skip_all)]
pub async fn handle_logout(
    req: UiRequest,
    session_store: Arc<SessionStore>,
    session_auth: Arc<SessionAuth>,
) -> Response<Full<Bytes>> {
    if let Some(session_id) = session_auth.extract_session_id(req.headers()) {
        if session_store.delete_session(&session_id) {
            debug!("Session logged out");
        }
    }

    responses::redirect_with_cookie("/", Some(session_auth.clear_session_cookie()))
}
