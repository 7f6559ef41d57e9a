use bcrypt::{hash, verify, DEFAULT_COST};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::metastore::{decode_id, encode_id, IdSequence, MetaError, Store, WriteBatch};

const USERS_TREE: &str = "_USERS";
const USERS_BY_EMAIL_TREE: &str = "_USERS_BY_EMAIL";
const USER_SEQUENCE: &str = "users";

pub type UserId = u64;

/// Errors raised by registration and login
#[derive(Debug)]
pub enum AuthError {
    DuplicateEmail,
    InvalidCredentials,
    InvalidInput(String),
    Hash(String),
    Store(MetaError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::DuplicateEmail => write!(f, "Email is already registered"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AuthError::Hash(msg) => write!(f, "Password hashing failed: {}", msg),
            AuthError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<MetaError> for AuthError {
    fn from(err: MetaError) -> Self {
        AuthError::Store(err)
    }
}

/// User record stored in the database
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct UserRecord {
    /// Primary key
    pub user_id: UserId,
    /// Login email, unique across users
    pub email: String,
    /// Bcrypt password hash
    pub password_hash: String,
    /// Account creation timestamp (seconds since UNIX epoch)
    pub created_at: u64,
}

impl UserRecord {
    /// Verifies a password against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        match verify(password, &self.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                error!("Password verification error: {}", e);
                false
            }
        }
    }

    /// Serializes the user record to bytes
    pub fn to_vec(&self) -> Result<Vec<u8>, MetaError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| MetaError::Codec(format!("Failed to serialize UserRecord: {}", e)))
    }

    /// Deserializes a user record from bytes
    pub fn from_slice(data: &[u8]) -> Result<Self, MetaError> {
        let (user, _len) = bincode::decode_from_slice(data, bincode::config::standard())
            .map_err(|e| MetaError::Codec(format!("Failed to deserialize UserRecord: {}", e)))?;
        Ok(user)
    }
}

/// Hashes a password with bcrypt at the given cost.
fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    hash(password, cost).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Credential store: user accounts keyed by id with a unique email index
pub struct UserStore {
    store: Arc<dyn Store>,
    ids: IdSequence,
    bcrypt_cost: u32,
    // Serializes the email uniqueness check with the insert.
    create_lock: Mutex<()>,
}

impl UserStore {
    /// Creates a user store hashing with bcrypt's default cost (12)
    pub fn new(store: Arc<dyn Store>) -> Result<Self, MetaError> {
        Self::with_cost(store, DEFAULT_COST)
    }

    /// Creates a user store with a custom bcrypt cost
    pub fn with_cost(store: Arc<dyn Store>, bcrypt_cost: u32) -> Result<Self, MetaError> {
        let ids = IdSequence::resume(store.as_ref(), USER_SEQUENCE, USERS_TREE)?;
        Ok(Self {
            store,
            ids,
            bcrypt_cost,
            create_lock: Mutex::new(()),
        })
    }

    /// Registers a new user.
    ///
    /// Fails with [`AuthError::DuplicateEmail`] if the email is taken.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(AuthError::InvalidInput("email is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }

        // Cheap rejection before paying for the hash
        if self.get_user_by_email(&email)?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))??;

        self.insert_user(email, password_hash)
    }

    fn insert_user(&self, email: String, password_hash: String) -> Result<UserRecord, AuthError> {
        let _guard = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());

        if self.get_user_by_email(&email)?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let user = UserRecord {
            user_id: self.ids.next_id(),
            email,
            password_hash,
            created_at: now_secs(),
        };
        debug!("Creating user: {}", user.user_id);

        let id_key = encode_id(user.user_id);
        let mut batch = WriteBatch::new();
        batch
            .insert(USERS_TREE, id_key.to_vec(), user.to_vec()?)
            .insert(USERS_BY_EMAIL_TREE, user.email.as_bytes().to_vec(), id_key.to_vec());
        self.ids.record(&mut batch, user.user_id);
        self.store.write_batch(batch)?;

        debug!("User created successfully: {}", user.user_id);
        Ok(user)
    }

    /// Verifies an email/password pair and returns the matching user.
    ///
    /// Unknown email and wrong password both yield
    /// [`AuthError::InvalidCredentials`].
    pub async fn verify(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let user = match self.get_user_by_email(email.trim())? {
            Some(user) => user,
            None => {
                debug!("Authentication failed: user not found: {}", email);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let password = password.to_string();
        let (user, valid) = tokio::task::spawn_blocking(move || {
            let valid = user.verify_password(&password);
            (user, valid)
        })
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?;

        if valid {
            Ok(user)
        } else {
            debug!("Authentication failed for user: {} (invalid password)", email);
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Gets a user by id
    pub fn get_user_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, MetaError> {
        let users_tree = self.store.tree_open(USERS_TREE)?;
        match users_tree.get(&encode_id(user_id))? {
            Some(data) => Ok(Some(UserRecord::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Gets a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, MetaError> {
        let email_tree = self.store.tree_open(USERS_BY_EMAIL_TREE)?;
        match email_tree.get(email.as_bytes())? {
            Some(id_bytes) => {
                let user_id = decode_id(&id_bytes)
                    .ok_or_else(|| MetaError::Codec("Invalid user id in email index".to_string()))?;
                let user = self.get_user_by_id(user_id)?;
                if user.is_none() {
                    warn!("Email index points at missing user: {}", user_id);
                }
                Ok(user)
            }
            None => Ok(None),
        }
    }

    /// Lists all users, oldest first
    pub fn list_users(&self) -> Result<Vec<UserRecord>, MetaError> {
        let users_tree = self.store.tree_open(USERS_TREE)?;
        let mut users = Vec::new();

        for key in users_tree.keys_with_prefix_rev(&[], 0, usize::MAX)?.into_iter().rev() {
            if let Some(value) = users_tree.get(&key)? {
                users.push(UserRecord::from_slice(&value)?);
            }
        }

        Ok(users)
    }

    /// Counts the number of users
    pub fn count_users(&self) -> Result<usize, MetaError> {
        self.store.num_keys(USERS_TREE)
    }
}

pub(crate) fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metastore::MemoryStore;

    fn test_store() -> UserStore {
        UserStore::with_cost(Arc::new(MemoryStore::new()), 4).unwrap()
    }

    #[test]
    fn test_user_record_password_verification() {
        let user = UserRecord {
            user_id: 1,
            email: "a@example.com".to_string(),
            password_hash: hash_password("password123", 4).unwrap(),
            created_at: 0,
        };

        assert!(user.verify_password("password123"));
        assert!(!user.verify_password("wrongpassword"));
    }

    #[test]
    fn test_user_record_serialization() {
        let user = UserRecord {
            user_id: 7,
            email: "a@example.com".to_string(),
            password_hash: "$2b$04$abc".to_string(),
            created_at: 1_700_000_000,
        };

        let deserialized = UserRecord::from_slice(&user.to_vec().unwrap()).unwrap();
        assert_eq!(user.user_id, deserialized.user_id);
        assert_eq!(user.email, deserialized.email);
        assert_eq!(user.created_at, deserialized.created_at);
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let users = test_store();
        let created = users.register("alice@example.com", "hunter2").await.unwrap();

        let verified = users.verify("alice@example.com", "hunter2").await.unwrap();
        assert_eq!(verified.user_id, created.user_id);
        assert_ne!(created.password_hash, "hunter2");

        assert!(matches!(
            users.verify("alice@example.com", "hunter3").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            users.verify("bob@example.com", "hunter2").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let users = test_store();
        users.register("alice@example.com", "one").await.unwrap();

        let second = users.register("alice@example.com", "two").await;
        assert!(matches!(second, Err(AuthError::DuplicateEmail)));

        // Surrounding whitespace does not make a new identity
        let third = users.register("  alice@example.com ", "three").await;
        assert!(matches!(third, Err(AuthError::DuplicateEmail)));

        assert_eq!(users.count_users().unwrap(), 1);
        assert!(users.verify("alice@example.com", "one").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let users = test_store();
        assert!(matches!(
            users.register("   ", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            users.register("a@example.com", "").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert_eq!(users.count_users().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_listed_in_order() {
        let users = test_store();
        let a = users.register("a@example.com", "pw").await.unwrap();
        let b = users.register("b@example.com", "pw").await.unwrap();
        assert!(b.user_id > a.user_id);

        let listed: Vec<String> = users.list_users().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(listed, vec!["a@example.com", "b@example.com"]);
        assert_eq!(users.get_user_by_id(a.user_id).unwrap().unwrap().email, "a@example.com");
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_keep_one_account() {
        let users = Arc::new(test_store());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let users = users.clone();
                tokio::spawn(async move {
                    users.register("race@example.com", &format!("pw{}", i)).await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AuthError::DuplicateEmail) => {}
                Err(e) => panic!("unexpected registration error: {}", e),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(users.count_users().unwrap(), 1);
        assert_eq!(users.list_users().unwrap().len(), 1);
    }
}
