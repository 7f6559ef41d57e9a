use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::vault::{LinkRow, VaultPage};

/// Inline status banner on the home page
#[derive(Debug, Clone, Copy)]
pub enum Notice<'a> {
    Success(&'a str),
    Error(&'a str),
}

/// Base HTML layout. `user_email` is set for logged-in pages and adds the
/// account bar.
fn layout(title: &str, content: Markup, user_email: Option<&str>) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(STYLES)) }
            }
            body {
                header {
                    h1 { "Link Vault" }
                    @if let Some(email) = user_email {
                        nav {
                            span class="user" { "Logged in as " strong { (email) } }
                            " | "
                            a href="/download" { "Download Backup (.txt)" }
                            " | "
                            a href="/logout" class="logout-link" { "Logout" }
                        }
                    }
                }
                main {
                    (content)
                }
                footer {
                    p { "link-vault v" (env!("CARGO_PKG_VERSION")) }
                }
            }
        }
    }
}

/// Login and registration forms
pub fn home_page(notice: Option<Notice<'_>>) -> String {
    let content = html! {
        div class="login-container" {
            @match notice {
                Some(Notice::Success(msg)) => {
                    div class="alert alert-success" { (msg) }
                }
                Some(Notice::Error(msg)) => {
                    div class="alert alert-error" { (msg) }
                }
                None => {}
            }

            div class="login-box" {
                h2 { "Login" }
                form method="POST" action="/login" {
                    div class="form-group" {
                        label for="login-email" { "Email" }
                        input type="email" id="login-email" name="email" required autofocus;
                    }
                    div class="form-group" {
                        label for="login-password" { "Password" }
                        input type="password" id="login-password" name="password" required;
                    }
                    button type="submit" class="btn btn-primary" { "Login" }
                }
            }

            div class="login-box" {
                h2 { "Register" }
                form method="POST" action="/register" {
                    div class="form-group" {
                        label for="register-email" { "Email" }
                        input type="email" id="register-email" name="email" required;
                    }
                    div class="form-group" {
                        label for="register-password" { "Password" }
                        input type="password" id="register-password" name="password" required;
                    }
                    button type="submit" class="btn btn-secondary" { "Register" }
                }
            }
        }
    };

    layout("Link Vault", content, None).into_string()
}

/// The paginated link listing with add/edit forms
pub fn vault_page(view: &VaultPage) -> String {
    let content = html! {
        div class="page-header" {
            h2 { "My Links" }
            span class="count" { (view.total_links) " link(s)" }
        }

        section class="form-container" {
            h3 { "Add Link" }
            form method="POST" action="/add" class="link-form" {
                input type="text" name="title" placeholder="Title" required;
                input type="url" name="url" placeholder="https://..." required;
                input type="text" name="description" placeholder="Description";
                button type="submit" class="btn btn-primary" { "Add" }
            }
        }

        section id="edit-section" class="form-container" hidden {
            h3 { "Edit Link" }
            form method="POST" action="/update" id="edit-form" class="link-form" {
                input type="hidden" name="id" id="edit-id";
                input type="text" name="title" id="edit-title" required;
                input type="url" name="url" id="edit-url" required;
                input type="text" name="description" id="edit-description";
                button type="submit" class="btn btn-primary" { "Save" }
                button type="button" id="edit-cancel" class="btn btn-secondary" { "Cancel" }
            }
        }

        input type="search" id="search" class="search" placeholder="Search this page...";

        @if view.links.is_empty() {
            p class="empty-state" { "No links yet" }
        } @else {
            table id="links" {
                thead {
                    tr {
                        th { "Title" }
                        th { "Description" }
                        th { "Added" }
                        th { "Actions" }
                    }
                }
                tbody {
                    @for link in &view.links {
                        (link_row(link))
                    }
                }
            }
        }

        div class="pagination" {
            @if view.page.has_prev() {
                a href={ "/vault?page=" (view.page.number - 1) } { "Prev" }
            }
            span { "Page " (view.page.number) " of " (view.page.total_pages) }
            @if view.page.has_next() {
                a href={ "/vault?page=" (view.page.number + 1) } { "Next" }
            }
        }

        script { (PreEscaped(SCRIPT)) }
    };

    layout("My Links - Link Vault", content, Some(&view.email)).into_string()
}

fn link_row(link: &LinkRow) -> Markup {
    html! {
        tr class="link-row"
            data-id=(link.id)
            data-title=(link.title)
            data-url=(link.url)
            data-description=(link.description) {
            td {
                a href=(safe_href(&link.url)) target="_blank" rel="noopener noreferrer" {
                    (link.title)
                }
                div class="url" { code { (link.url) } }
            }
            td { (link.description) }
            td { (format_unix_timestamp(link.created_at)) }
            td class="actions" {
                button type="button" class="btn btn-small edit-btn" { "Edit" }
                " "
                a href={ "/del/" (link.id) } class="btn btn-small btn-danger"
                    onclick="return confirm('Delete?')" { "Delete" }
            }
        }
    }
}

/// Error page
pub fn error_page(message: &str) -> String {
    let content = html! {
        div class="error-page" {
            h2 { "Error" }
            p { (message) }
            p {
                a href="/vault" { "← Back to my links" }
            }
        }
    };

    layout("Error - Link Vault", content, None).into_string()
}

// Helper functions

/// Only http(s) URLs become clickable
fn safe_href(url: &str) -> &str {
    let lower = url.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url
    } else {
        "#"
    }
}

fn format_unix_timestamp(unix_seconds: u64) -> String {
    let datetime = chrono::DateTime::from_timestamp(unix_seconds as i64, 0)
        .unwrap_or_default();
    datetime.format("%Y-%m-%d %H:%M UTC").to_string()
}

// Client-side search and edit form wiring. Values are read from data-*
// attributes, never spliced into the script.
const SCRIPT: &str = r#"
(function () {
    var search = document.getElementById('search');
    var rows = document.querySelectorAll('tr.link-row');
    search.addEventListener('input', function () {
        var needle = search.value.toLowerCase();
        rows.forEach(function (row) {
            var text = (row.dataset.title + ' ' + row.dataset.url + ' ' + row.dataset.description).toLowerCase();
            row.style.display = text.indexOf(needle) === -1 ? 'none' : '';
        });
    });

    var section = document.getElementById('edit-section');
    document.querySelectorAll('.edit-btn').forEach(function (btn) {
        btn.addEventListener('click', function () {
            var row = btn.closest('tr');
            document.getElementById('edit-id').value = row.dataset.id;
            document.getElementById('edit-title').value = row.dataset.title;
            document.getElementById('edit-url').value = row.dataset.url;
            document.getElementById('edit-description').value = row.dataset.description;
            section.hidden = false;
            section.scrollIntoView();
        });
    });
    document.getElementById('edit-cancel').addEventListener('click', function () {
        section.hidden = true;
    });
})();
"#;

// CSS Styles
const STYLES: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    color: #333;
    background: #f5f5f5;
    padding-bottom: 3rem;
}

header {
    background: #2c3e50;
    color: white;
    padding: 1rem 2rem;
    display: flex;
    justify-content: space-between;
    align-items: center;
}

header h1 {
    font-size: 1.5rem;
    font-weight: 600;
}

nav {
    font-size: 0.9rem;
}

nav a {
    color: #ecf0f1;
    text-decoration: none;
}

nav a:hover {
    text-decoration: underline;
}

main {
    max-width: 1100px;
    margin: 2rem auto;
    padding: 0 2rem;
}

footer {
    text-align: center;
    color: #999;
    font-size: 0.8rem;
    margin-top: 2rem;
}

.page-header {
    display: flex;
    justify-content: space-between;
    align-items: baseline;
    margin-bottom: 1rem;
}

.count {
    color: #7f8c8d;
    font-size: 0.9rem;
}

.form-container {
    background: white;
    padding: 1rem 1.5rem;
    border-radius: 4px;
    box-shadow: 0 1px 3px rgba(0,0,0,0.1);
    margin-bottom: 1rem;
}

.form-container h3 {
    font-size: 1rem;
    margin-bottom: 0.5rem;
}

.link-form {
    display: flex;
    gap: 0.5rem;
    flex-wrap: wrap;
}

.link-form input {
    flex: 1 1 12rem;
    padding: 0.5rem;
    border: 1px solid #ddd;
    border-radius: 4px;
}

.search {
    width: 100%;
    padding: 0.5rem;
    margin-bottom: 1rem;
    border: 1px solid #ddd;
    border-radius: 4px;
}

table {
    width: 100%;
    background: white;
    border-collapse: collapse;
    box-shadow: 0 1px 3px rgba(0,0,0,0.1);
}

th, td {
    padding: 0.75rem 1rem;
    text-align: left;
    border-bottom: 1px solid #eee;
    vertical-align: top;
}

th {
    background: #34495e;
    color: white;
    font-weight: 500;
}

tbody tr:hover {
    background: #f8f9fa;
}

tbody a {
    color: #2980b9;
    text-decoration: none;
}

.url code {
    font-size: 0.8rem;
    color: #7f8c8d;
    word-break: break-all;
}

.actions {
    white-space: nowrap;
}

.empty-state {
    text-align: center;
    color: #7f8c8d;
    padding: 3rem;
}

.pagination {
    display: flex;
    justify-content: center;
    gap: 1rem;
    margin-top: 1rem;
}

.error-page {
    text-align: center;
    padding: 3rem;
}

.error-page h2 {
    color: #c0392b;
    margin-bottom: 1rem;
}

.login-container {
    display: flex;
    flex-direction: column;
    align-items: center;
    gap: 1.5rem;
}

.login-box {
    background: white;
    padding: 2rem;
    border-radius: 4px;
    box-shadow: 0 1px 3px rgba(0,0,0,0.1);
    width: 100%;
    max-width: 400px;
}

.login-box h2 {
    margin-bottom: 1rem;
}

.form-group {
    margin-bottom: 1rem;
}

.form-group label {
    display: block;
    margin-bottom: 0.25rem;
    font-weight: 500;
}

.form-group input {
    width: 100%;
    padding: 0.5rem;
    border: 1px solid #ddd;
    border-radius: 4px;
}

.alert {
    padding: 0.75rem 1rem;
    border-radius: 4px;
    width: 100%;
    max-width: 400px;
}

.alert-error {
    background: #fdecea;
    color: #c0392b;
}

.alert-success {
    background: #eafaf1;
    color: #27ae60;
}

.btn {
    display: inline-block;
    padding: 0.5rem 1rem;
    border: none;
    border-radius: 4px;
    cursor: pointer;
    font-size: 0.9rem;
    text-decoration: none;
}

.btn-primary {
    background: #2980b9;
    color: white;
}

.btn-secondary {
    background: #95a5a6;
    color: white;
}

.btn-danger {
    background: #c0392b;
    color: white !important;
}

.btn-small {
    padding: 0.25rem 0.5rem;
    font-size: 0.8rem;
}
"#;
