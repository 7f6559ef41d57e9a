use std::collections::HashMap;

use hyper::Uri;

/// Decodes one `application/x-www-form-urlencoded` component (`+` is a space).
fn decode_component(value: &str) -> String {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|v| v.into_owned())
        .unwrap_or(spaced)
}

/// Parses a urlencoded form body. Later duplicates win; pairs without `=`
/// map to an empty value.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let body = String::from_utf8_lossy(body);
    let mut fields = HashMap::new();

    for param in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        fields.insert(decode_component(key), decode_component(value));
    }

    fields
}

/// Returns the decoded value of query parameter `name`, if present.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    query.split('&').find_map(|param| {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        if decode_component(key) == name {
            Some(decode_component(value))
        } else {
            None
        }
    })
}
