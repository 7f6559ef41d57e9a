pub mod session;
pub mod user_store;

pub use session::{SessionStore, DEFAULT_SESSION_LIFETIME};
pub use user_store::{AuthError, UserId, UserRecord, UserStore};
