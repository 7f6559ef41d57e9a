use crate::auth::UserId;
use crate::metastore::MetaError;

use super::{LinkRecord, LinkStore};

/// Filename offered for the download
pub const EXPORT_FILENAME: &str = "links.txt";

const EXPORT_HEADER: &str = "LINK MANAGER EXPORT\n===================\n\n";
const BLOCK_SEPARATOR: &str = "----------";

/// Exports all of `owner`'s links, newest first.
pub fn export(links: &LinkStore, owner: UserId) -> Result<String, MetaError> {
    Ok(format_export(&links.list_all(owner)?))
}

/// Formats links as fixed `TITLE:`/`URL:`/`DESC:` blocks in the given order.
pub fn format_export(links: &[LinkRecord]) -> String {
    let mut text = String::from(EXPORT_HEADER);
    for link in links {
        text.push_str("TITLE: ");
        text.push_str(&escape_field(&link.title));
        text.push_str("\nURL: ");
        text.push_str(&escape_field(&link.url));
        text.push_str("\nDESC: ");
        text.push_str(&escape_field(&link.description));
        text.push('\n');
        text.push_str(BLOCK_SEPARATOR);
        text.push('\n');
    }
    text
}

/// Keeps a value on a single line: backslash, newline and carriage return are
/// written as two-character escapes.
fn escape_field(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}
