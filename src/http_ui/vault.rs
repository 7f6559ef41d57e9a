use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::links::{self, LinkFields, LinkId, LinkRecord, LinkStore, Page, DEFAULT_PAGE_SIZE};
use crate::metastore::MetaError;
use crate::metrics::SharedMetrics;

use super::{forms, middleware::AuthContext, responses, templates, UiRequest};

/// One row of the vault listing
#[derive(Debug, Clone, Serialize)]
pub struct LinkRow {
    pub id: LinkId,
    pub title: String,
    pub url: String,
    pub description: String,
    pub created_at: u64,
}

impl From<LinkRecord> for LinkRow {
    fn from(link: LinkRecord) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
            description: link.description,
            created_at: link.created_at,
        }
    }
}

/// View model for GET /vault, rendered as HTML or JSON
#[derive(Debug, Clone, Serialize)]
pub struct VaultPage {
    pub email: String,
    pub links: Vec<LinkRow>,
    pub page: Page,
    pub total_links: usize,
}

/// Loads page `number` of the user's links
pub fn load_vault_page(
    link_store: &LinkStore,
    auth: &AuthContext,
    number: u64,
) -> Result<VaultPage, MetaError> {
    let window = links::paginate(0, number, DEFAULT_PAGE_SIZE);
    let (records, total) = link_store.list_links(auth.user_id, window.offset, window.limit)?;
    let page = links::paginate(total, number, DEFAULT_PAGE_SIZE);

    Ok(VaultPage {
        email: auth.email.clone(),
        links: records.into_iter().map(LinkRow::from).collect(),
        page,
        total_links: total,
    })
}

/// Handles GET /vault?page=N
pub async fn handle_vault(
    req: &UiRequest,
    auth: &AuthContext,
    link_store: &LinkStore,
    wants_html: bool,
) -> Response<Full<Bytes>> {
    let number = links::parse_page(forms::query_param(req.uri(), "page").as_deref());

    match load_vault_page(link_store, auth, number) {
        Ok(view) if wants_html => {
            responses::html_response(StatusCode::OK, templates::vault_page(&view))
        }
        Ok(view) => responses::json_response(StatusCode::OK, &view),
        Err(e) => store_error(e, wants_html),
    }
}

/// Handles POST /add
pub async fn handle_add(
    req: &UiRequest,
    auth: &AuthContext,
    link_store: &LinkStore,
    metrics: &SharedMetrics,
) -> Response<Full<Bytes>> {
    let fields = link_fields(forms::parse_form(req.body()));
    if fields.title.is_empty() || fields.url.is_empty() {
        warn!(user_id = auth.user_id, "Ignoring link without title or url");
        return responses::redirect("/vault");
    }

    match link_store.create_link(auth.user_id, fields) {
        Ok(link) => {
            debug!(user_id = auth.user_id, link_id = link.id, "Link added");
            metrics.record_link_operation("create", true);
            responses::redirect("/vault")
        }
        Err(e) => store_error(e, true),
    }
}

/// Handles POST /update
pub async fn handle_update(
    req: &UiRequest,
    auth: &AuthContext,
    link_store: &LinkStore,
    metrics: &SharedMetrics,
) -> Response<Full<Bytes>> {
    let mut form = forms::parse_form(req.body());
    let Some(id) = form.remove("id").and_then(|id| parse_link_id(&id)) else {
        warn!(user_id = auth.user_id, "Update with missing or malformed id");
        return responses::redirect("/vault");
    };

    let fields = link_fields(form);
    if fields.title.is_empty() || fields.url.is_empty() {
        warn!(user_id = auth.user_id, link_id = id, "Ignoring update without title or url");
        return responses::redirect("/vault");
    }

    match link_store.update_link(id, auth.user_id, fields) {
        Ok(matched) => {
            if !matched {
                warn!(user_id = auth.user_id, link_id = id, "Update matched no owned link");
            }
            metrics.record_link_operation("update", matched);
            responses::redirect("/vault")
        }
        Err(e) => store_error(e, true),
    }
}

/// Handles GET /del/:id
pub async fn handle_delete(
    raw_id: &str,
    auth: &AuthContext,
    link_store: &LinkStore,
    metrics: &SharedMetrics,
) -> Response<Full<Bytes>> {
    let Some(id) = parse_link_id(raw_id) else {
        warn!(user_id = auth.user_id, raw_id, "Delete with malformed id");
        return responses::redirect("/vault");
    };

    match link_store.delete_link(id, auth.user_id) {
        Ok(matched) => {
            if !matched {
                warn!(user_id = auth.user_id, link_id = id, "Delete matched no owned link");
            }
            metrics.record_link_operation("delete", matched);
            responses::redirect("/vault")
        }
        Err(e) => store_error(e, true),
    }
}

/// Handles GET /download
pub async fn handle_download(auth: &AuthContext, link_store: &LinkStore) -> Response<Full<Bytes>> {
    match links::export(link_store, auth.user_id) {
        Ok(text) => responses::text_attachment(links::EXPORT_FILENAME, text),
        Err(e) => store_error(e, true),
    }
}

fn link_fields(mut form: HashMap<String, String>) -> LinkFields {
    let mut take = |name: &str| form.remove(name).unwrap_or_default().trim().to_string();
    LinkFields {
        title: take("title"),
        url: take("url"),
        description: take("description"),
    }
}

fn parse_link_id(raw: &str) -> Option<LinkId> {
    raw.trim().parse().ok()
}

fn store_error(e: MetaError, wants_html: bool) -> Response<Full<Bytes>> {
    error!(error = %e, "Link store error");
    responses::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong, please try again",
        wants_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metastore::MemoryStore;
    use std::sync::Arc;

    fn ctx(user_id: u64) -> AuthContext {
        AuthContext {
            user_id,
            email: format!("user{}@example.com", user_id),
        }
    }

    fn add(store: &LinkStore, owner: u64, title: &str) -> LinkRecord {
        store
            .create_link(
                owner,
                LinkFields {
                    title: title.to_string(),
                    url: format!("https://{}.example", title),
                    description: String::new(),
                },
            )
            .unwrap()
    }

    #[test]
    fn test_load_vault_page_windows_and_counts() {
        let store = LinkStore::new(Arc::new(MemoryStore::new())).unwrap();
        for i in 0..45 {
            add(&store, 1, &format!("link{}", i));
        }
        add(&store, 2, "other");

        let view = load_vault_page(&store, &ctx(1), 2).unwrap();
        assert_eq!(view.total_links, 45);
        assert_eq!(view.page.total_pages, 3);
        assert_eq!(view.links.len(), 20);
        // Newest first: page 2 starts at the 21st newest
        assert_eq!(view.links[0].title, "link24");

        let view = load_vault_page(&store, &ctx(1), 3).unwrap();
        assert_eq!(view.links.len(), 5);

        let view = load_vault_page(&store, &ctx(1), 99).unwrap();
        assert!(view.links.is_empty());
        assert_eq!(view.page.number, 99);
    }

    #[test]
    fn test_load_vault_page_empty() {
        let store = LinkStore::new(Arc::new(MemoryStore::new())).unwrap();
        let view = load_vault_page(&store, &ctx(7), 1).unwrap();
        assert!(view.links.is_empty());
        assert_eq!(view.page.total_pages, 1);
        assert_eq!(view.email, "user7@example.com");
    }

    #[test]
    fn test_link_fields_are_trimmed() {
        let form = forms::parse_form(b"title=+Rust+&url=https%3A%2F%2Frust-lang.org&id=3");
        let fields = link_fields(form);
        assert_eq!(fields.title, "Rust");
        assert_eq!(fields.url, "https://rust-lang.org");
        assert_eq!(fields.description, "");
    }

    #[tokio::test]
    async fn test_update_reads_id_and_fields_from_one_form() {
        let store = LinkStore::new(Arc::new(MemoryStore::new())).unwrap();
        let link = add(&store, 1, "old");
        let metrics = SharedMetrics::new().unwrap();

        let body = format!("id={}&title=New&url=https%3A%2F%2Fnew.example&description=d", link.id);
        let req = hyper::Request::builder()
            .method("POST")
            .uri("/update")
            .body(Bytes::from(body))
            .unwrap();

        let response = handle_update(&req, &ctx(1), &store, &metrics).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let stored = store.get_link(link.id, 1).unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.url, "https://new.example");
        assert_eq!(stored.description, "d");
    }

    #[test]
    fn test_parse_link_id() {
        assert_eq!(parse_link_id("42"), Some(42));
        assert_eq!(parse_link_id(" 7 "), Some(7));
        assert_eq!(parse_link_id("abc"), None);
        assert_eq!(parse_link_id("-1"), None);
        assert_eq!(parse_link_id(""), None);
    }
}
