use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request, Response, StatusCode};

use link_vault::auth::{SessionStore, UserStore};
use link_vault::http_ui::{SessionAuth, VaultService};
use link_vault::links::LinkStore;
use link_vault::metastore::MemoryStore;
use link_vault::metrics::SharedMetrics;

fn service() -> VaultService {
    let store = Arc::new(MemoryStore::new());
    let user_store = Arc::new(UserStore::with_cost(store.clone(), 4).unwrap());
    let link_store = Arc::new(LinkStore::new(store).unwrap());
    let session_store = Arc::new(SessionStore::new());
    let session_auth =
        SessionAuth::new(session_store.clone(), user_store.clone(), b"integration-secret").unwrap();

    VaultService::new(
        user_store,
        link_store,
        session_store,
        session_auth,
        SharedMetrics::new().unwrap(),
    )
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: &str) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if !body.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

async fn send(
    svc: &VaultService,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: &str,
) -> Response<Full<Bytes>> {
    svc.handle_request(request(method, uri, cookie, body)).await.unwrap()
}

async fn body_string(response: Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response<Full<Bytes>>) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

async fn register(svc: &VaultService, email: &str, password: &str) -> String {
    let body = format!("email={}&password={}", urlencoding::encode(email), password);
    body_string(send(svc, Method::POST, "/register", None, &body).await).await
}

/// Logs in and returns the `session_id=...` pair to send back
async fn login(svc: &VaultService, email: &str, password: &str) -> String {
    let body = format!("email={}&password={}", urlencoding::encode(email), password);
    let response = send(svc, Method::POST, "/login", None, &body).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/vault");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn add_link(svc: &VaultService, cookie: &str, title: &str, url: &str, description: &str) {
    let body = format!(
        "title={}&url={}&description={}",
        urlencoding::encode(title),
        urlencoding::encode(url),
        urlencoding::encode(description)
    );
    let response = send(svc, Method::POST, "/add", Some(cookie), &body).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/vault");
}

async fn vault_json(svc: &VaultService, cookie: &str, page: u64) -> serde_json::Value {
    let uri = format!("/vault?page={}&format=json", page);
    let response = send(svc, Method::GET, &uri, Some(cookie), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_register_and_login_messages() {
    let svc = service();

    let page = body_string(send(&svc, Method::GET, "/", None, "").await).await;
    assert!(page.contains("action=\"/login\""));
    assert!(page.contains("action=\"/register\""));

    assert!(register(&svc, "alice@example.com", "secret").await.contains("Registered! Please login."));
    assert!(register(&svc, "alice@example.com", "other").await.contains("Registration failed."));

    let response = send(
        &svc,
        Method::POST,
        "/login",
        None,
        "email=alice%40example.com&password=wrong",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_string(response).await.contains("Invalid credentials"));

    let response = send(
        &svc,
        Method::POST,
        "/login",
        None,
        "email=nobody%40example.com&password=secret",
    )
    .await;
    assert!(body_string(response).await.contains("Invalid credentials"));
}

#[tokio::test]
async fn test_vault_requires_session() {
    let svc = service();

    for (method, path) in [
        (Method::GET, "/vault"),
        (Method::POST, "/add"),
        (Method::POST, "/update"),
        (Method::GET, "/del/1"),
        (Method::GET, "/download"),
    ] {
        let response = send(&svc, method, path, None, "").await;
        assert_eq!(response.status(), StatusCode::FOUND, "{}", path);
        assert_eq!(location(&response), "/");
    }

    let response = send(&svc, Method::GET, "/vault", Some("session_id=forged.abcdef"), "").await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_add_list_and_home_redirect() {
    let svc = service();
    register(&svc, "alice@example.com", "secret").await;
    let cookie = login(&svc, "alice@example.com", "secret").await;

    let response = send(&svc, Method::GET, "/", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/vault");

    add_link(&svc, &cookie, "First", "https://first.example", "one").await;
    add_link(&svc, &cookie, "Second", "https://second.example", "two words").await;
    // Missing url is ignored
    add_link(&svc, &cookie, "Broken", "", "").await;

    let view = vault_json(&svc, &cookie, 1).await;
    assert_eq!(view["email"], "alice@example.com");
    assert_eq!(view["total_links"], 2);
    assert_eq!(view["page"]["total_pages"], 1);
    assert_eq!(view["links"][0]["title"], "Second");
    assert_eq!(view["links"][0]["description"], "two words");
    assert_eq!(view["links"][1]["title"], "First");

    let html = body_string(send(&svc, Method::GET, "/vault", Some(&cookie), "").await).await;
    assert!(html.contains("Logged in as"));
    assert!(html.contains("alice@example.com"));
    assert!(html.contains("Page 1 of 1"));
    assert!(html.contains("https://second.example"));
}

#[tokio::test]
async fn test_pagination_over_http() {
    let svc = service();
    register(&svc, "alice@example.com", "secret").await;
    let cookie = login(&svc, "alice@example.com", "secret").await;

    for i in 0..45 {
        add_link(&svc, &cookie, &format!("link{}", i), "https://example.com", "").await;
    }

    let view = vault_json(&svc, &cookie, 2).await;
    assert_eq!(view["page"]["total_pages"], 3);
    assert_eq!(view["page"]["offset"], 20);
    assert_eq!(view["links"].as_array().unwrap().len(), 20);

    let view = vault_json(&svc, &cookie, 3).await;
    assert_eq!(view["links"].as_array().unwrap().len(), 5);

    let view = vault_json(&svc, &cookie, 10).await;
    assert!(view["links"].as_array().unwrap().is_empty());

    let response = send(&svc, Method::GET, "/vault?page=abc&format=json", Some(&cookie), "").await;
    let view: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(view["page"]["number"], 1);
}

#[tokio::test]
async fn test_update_and_delete_are_owner_scoped() {
    let svc = service();
    register(&svc, "alice@example.com", "secret").await;
    register(&svc, "bob@example.com", "hunter2").await;
    let alice = login(&svc, "alice@example.com", "secret").await;
    let bob = login(&svc, "bob@example.com", "hunter2").await;

    add_link(&svc, &alice, "Mine", "https://alice.example", "").await;
    let id = vault_json(&svc, &alice, 1).await["links"][0]["id"]
        .as_u64()
        .unwrap();

    assert_eq!(vault_json(&svc, &bob, 1).await["total_links"], 0);

    // Bob's attempts redirect like a success but change nothing
    let body = format!("id={}&title=Hijacked&url=https%3A%2F%2Fevil.example&description=", id);
    let response = send(&svc, Method::POST, "/update", Some(&bob), &body).await;
    assert_eq!(location(&response), "/vault");
    let response = send(&svc, Method::GET, &format!("/del/{}", id), Some(&bob), "").await;
    assert_eq!(location(&response), "/vault");

    let view = vault_json(&svc, &alice, 1).await;
    assert_eq!(view["total_links"], 1);
    assert_eq!(view["links"][0]["title"], "Mine");

    // Owner can update and delete
    let body = format!("id={}&title=Renamed&url=https%3A%2F%2Falice.example%2Fnew&description=d", id);
    send(&svc, Method::POST, "/update", Some(&alice), &body).await;
    let view = vault_json(&svc, &alice, 1).await;
    assert_eq!(view["links"][0]["title"], "Renamed");
    assert_eq!(view["links"][0]["url"], "https://alice.example/new");

    let response = send(&svc, Method::GET, "/del/not-a-number", Some(&alice), "").await;
    assert_eq!(location(&response), "/vault");

    send(&svc, Method::GET, &format!("/del/{}", id), Some(&alice), "").await;
    assert_eq!(vault_json(&svc, &alice, 1).await["total_links"], 0);
}

#[tokio::test]
async fn test_download_export() {
    let svc = service();
    register(&svc, "alice@example.com", "secret").await;
    let cookie = login(&svc, "alice@example.com", "secret").await;

    add_link(&svc, &cookie, "A", "https://a.example", "first").await;
    add_link(&svc, &cookie, "B", "https://b.example", "").await;

    let response = send(&svc, Method::GET, "/download", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=links.txt"
    );

    let expected = "LINK MANAGER EXPORT\n===================\n\n\
                    TITLE: B\nURL: https://b.example\nDESC: \n----------\n\
                    TITLE: A\nURL: https://a.example\nDESC: first\n----------\n";
    assert_eq!(body_string(response).await, expected);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let svc = service();
    register(&svc, "alice@example.com", "secret").await;
    let first = login(&svc, "alice@example.com", "secret").await;
    let second = login(&svc, "alice@example.com", "secret").await;
    assert_ne!(first, second);

    let response = send(&svc, Method::GET, "/logout", Some(&first), "").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let cleared = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let response = send(&svc, Method::GET, "/vault", Some(&first), "").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    // Other sessions of the same user are unaffected
    let response = send(&svc, Method::GET, "/vault", Some(&second), "").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Logging out without a session still redirects home
    let response = send(&svc, Method::GET, "/logout", None, "").await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_health_and_unknown_routes() {
    let svc = service();

    let response = send(&svc, Method::GET, "/health", None, "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["status"], "healthy");

    register(&svc, "alice@example.com", "secret").await;
    let cookie = login(&svc, "alice@example.com", "secret").await;
    let response = send(&svc, Method::GET, "/nowhere", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
