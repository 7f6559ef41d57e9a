use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;

use super::templates;

pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
    let mut resp = Response::new(Full::new(Bytes::from(json)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    resp
}

pub fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(html)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    resp
}

/// Plain-text file download
pub fn text_attachment(filename: &'static str, text: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(text)));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(value) = header::HeaderValue::from_str(&format!("attachment; filename={}", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    resp
}

/// 302 redirect to a fixed location
pub fn redirect(location: &'static str) -> Response<Full<Bytes>> {
    redirect_with_cookie(location, None)
}

/// 302 redirect that also sets (or clears) a cookie
pub fn redirect_with_cookie(location: &'static str, cookie: Option<String>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from("Redirecting")));
    *resp.status_mut() = StatusCode::FOUND;
    let headers = resp.headers_mut();
    headers.insert(header::LOCATION, header::HeaderValue::from_static(location));
    if let Some(cookie) = cookie {
        match header::HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unencodable cookie"),
        }
    }
    resp
}

pub fn error_response(status: StatusCode, message: &str, wants_html: bool) -> Response<Full<Bytes>> {
    if wants_html {
        html_response(status, templates::error_page(message))
    } else {
        let error = serde_json::json!({
            "error": message,
            "status": status.as_u16()
        });
        json_response(status, &error)
    }
}

pub fn not_found(wants_html: bool) -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found", wants_html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_sets_location_and_cookie() {
        let response = redirect_with_cookie("/vault", Some("session_id=abc; Path=/".to_string()));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/vault");
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            "session_id=abc; Path=/"
        );
    }

    #[test]
    fn test_text_attachment_headers() {
        let response = text_attachment("links.txt", "hello".to_string());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=links.txt"
        );
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[test]
    fn test_json_error_response() {
        let response = error_response(StatusCode::NOT_FOUND, "Not Found", false);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
