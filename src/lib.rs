pub mod auth;
pub mod http_ui;
pub mod inspect;
pub mod links;
pub mod metastore;
pub mod metrics;
