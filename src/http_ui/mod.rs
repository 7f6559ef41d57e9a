mod forms;
mod login;
mod middleware;
mod responses;
mod templates;
mod vault;

pub use middleware::{AuthContext, SessionAuth, SESSION_COOKIE_NAME};
pub use vault::{LinkRow, VaultPage};

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Body, Method, Request, Response, StatusCode};
use tracing::warn;

use crate::auth::{SessionStore, UserStore};
use crate::links::LinkStore;
use crate::metrics::SharedMetrics;

/// A request whose body has already been read into memory
pub type UiRequest = Request<Bytes>;

/// HTTP UI service: the login page, the per-user vault and the export
#[derive(Clone)]
pub struct VaultService {
    user_store: Arc<UserStore>,
    link_store: Arc<LinkStore>,
    session_store: Arc<SessionStore>,
    session_auth: Arc<SessionAuth>,
    metrics: SharedMetrics,
}

impl VaultService {
    pub fn new(
        user_store: Arc<UserStore>,
        link_store: Arc<LinkStore>,
        session_store: Arc<SessionStore>,
        session_auth: SessionAuth,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            user_store,
            link_store,
            session_store,
            session_auth: Arc::new(session_auth),
            metrics,
        }
    }

    /// Main request handler
    pub async fn handle_request<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<Full<Bytes>>, std::convert::Infallible>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                return Ok(responses::error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid request",
                    true,
                ));
            }
        };

        let result = self.route_request(Request::from_parts(parts, body)).await;
        Ok(result)
    }

    async fn route_request(&self, req: UiRequest) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        // Public routes (no auth required)
        if middleware::is_public_path(&path) {
            return match (&method, path.as_str()) {
                (&Method::GET, "/") => login::handle_home(req, self.session_auth.clone()).await,
                (&Method::POST, "/register") => {
                    login::handle_register(req, self.user_store.clone(), self.metrics.clone()).await
                }
                (&Method::POST, "/login") => {
                    login::handle_login_submit(
                        req,
                        self.user_store.clone(),
                        self.session_store.clone(),
                        self.session_auth.clone(),
                        self.metrics.clone(),
                    )
                    .await
                }
                (&Method::GET, "/logout") => {
                    login::handle_logout(req, self.session_store.clone(), self.session_auth.clone())
                        .await
                }
                (&Method::GET, "/health") => self.handle_health().await,
                _ => responses::not_found(true),
            };
        }

        // Protected routes - require authentication
        let auth_context = match self.session_auth.authenticate(req.headers()) {
            Some(ctx) => ctx,
            None => return self.session_auth.login_redirect_response(),
        };

        let wants_html = wants_html(&req);
        let links = self.link_store.as_ref();

        match (&method, path.as_str()) {
            (&Method::GET, "/vault") => {
                vault::handle_vault(&req, &auth_context, links, wants_html).await
            }
            (&Method::POST, "/add") => {
                vault::handle_add(&req, &auth_context, links, &self.metrics).await
            }
            (&Method::POST, "/update") => {
                vault::handle_update(&req, &auth_context, links, &self.metrics).await
            }
            (&Method::GET, path) if path.starts_with("/del/") => {
                let raw_id = path.trim_start_matches("/del/");
                vault::handle_delete(raw_id, &auth_context, links, &self.metrics).await
            }
            (&Method::GET, "/download") => vault::handle_download(&auth_context, links).await,
            _ => responses::not_found(wants_html),
        }
    }

    async fn handle_health(&self) -> Response<Full<Bytes>> {
        let health = serde_json::json!({
            "status": "healthy",
            "storage": "operational",
            "active_sessions": self.session_store.active_session_count(),
        });
        responses::json_response(StatusCode::OK, &health)
    }
}

/// Chooses between an HTML page and a JSON body for the response
fn wants_html(req: &UiRequest) -> bool {
    // An explicit format parameter wins over the Accept header
    match forms::query_param(req.uri(), "format").as_deref() {
        Some("json") => return false,
        Some("html") => return true,
        _ => {}
    }

    if let Some(accept) = req.headers().get("accept") {
        if let Ok(accept_str) = accept.to_str() {
            if accept_str.contains("text/html") {
                return true;
            }
            if accept_str.contains("application/json") {
                return false;
            }
        }
    }

    true
}
