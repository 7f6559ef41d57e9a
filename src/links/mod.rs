pub mod export;
pub mod link_store;
pub mod pagination;

pub use export::{export, format_export, EXPORT_FILENAME};
pub use link_store::{LinkFields, LinkId, LinkRecord, LinkStore};
pub use pagination::{paginate, parse_page, Page, DEFAULT_PAGE_SIZE};
