use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::UserId;

/// Default session lifetime: 24 hours
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Token entropy in bytes; the hex token is twice as long
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: Instant,
}

impl Session {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Process-wide table of login sessions, keyed by opaque random tokens.
///
/// Clones share the same table. Nothing is persisted: a restart logs
/// everyone out.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_SESSION_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    pub fn session_lifetime(&self) -> Duration {
        self.lifetime
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a session for `user_id` and returns its token. Every call
    /// yields a fresh token, so one user may hold several sessions.
    pub fn create_session(&self, user_id: UserId) -> String {
        let token = new_token();
        let now = Instant::now();
        let expires_at = now.checked_add(self.lifetime).unwrap_or(now + DEFAULT_SESSION_LIFETIME);

        self.write().insert(token.clone(), Session { user_id, expires_at });
        debug!(user_id, "Created session");
        token
    }

    /// Resolves a token to its user, unless unknown or expired
    pub fn get_session(&self, token: &str) -> Option<UserId> {
        self.get_session_at(token, Instant::now())
    }

    fn get_session_at(&self, token: &str, now: Instant) -> Option<UserId> {
        self.read()
            .get(token)
            .filter(|session| session.is_live(now))
            .map(|session| session.user_id)
    }

    /// Removes a session. Returns whether one was removed; removing an
    /// unknown token is not an error.
    pub fn delete_session(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }

    /// Drops expired sessions and returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.is_live(now));
        before - sessions.len()
    }

    /// Number of unexpired sessions
    pub fn active_session_count(&self) -> usize {
        let now = Instant::now();
        self.read().values().filter(|session| session.is_live(now)).count()
    }

    /// Number of sessions still in the table, expired ones included
    pub fn total_session_count(&self) -> usize {
        self.read().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_resolves_to_user() {
        let store = SessionStore::new();
        let token = store.create_session(7);

        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.get_session(&token), Some(7));
        assert_eq!(store.get_session("not-a-session"), None);
        assert_eq!(store.active_session_count(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = SessionStore::new();
        let token = store.create_session(7);

        assert!(store.delete_session(&token));
        assert!(!store.delete_session(&token));
        assert_eq!(store.get_session(&token), None);
    }

    #[test]
    fn test_expired_sessions_stop_resolving_and_are_swept() {
        let store = SessionStore::with_lifetime(Duration::from_secs(60));
        let token = store.create_session(1);
        store.create_session(2);

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(store.get_session_at(&token, later), None);
        assert_eq!(store.get_session(&token), Some(1));

        assert_eq!(store.cleanup_expired_at(later), 2);
        assert_eq!(store.total_session_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_live_sessions() {
        let store = SessionStore::new();
        store.create_session(1);
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.total_session_count(), 1);
    }

    #[test]
    fn test_repeated_logins_get_distinct_tokens() {
        let store = SessionStore::new();
        let first = store.create_session(1);
        let second = store.create_session(1);

        assert_ne!(first, second);
        assert_eq!(store.get_session(&first), Some(1));
        assert_eq!(store.get_session(&second), Some(1));

        store.delete_session(&first);
        assert_eq!(store.get_session(&second), Some(1));
    }

    #[test]
    fn test_clones_share_table() {
        let store = SessionStore::new();
        let clone = store.clone();
        let token = store.create_session(3);
        assert_eq!(clone.get_session(&token), Some(3));
    }
}
