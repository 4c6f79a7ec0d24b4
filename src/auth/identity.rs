//! Caller identities, user accounts and session / internal tokens.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::init::{InitError, Initializer};

/// What kind of caller an identity represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// An end user authenticated with a session token.
    User { admin: bool },
    /// A same-host application authenticated with its internal token.
    Application,
}

/// The resolved caller, attached to the request once the gate admits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: String,
    pub kind: IdentityKind,
}

impl Identity {
    pub fn user(name: impl Into<String>, admin: bool) -> Self {
        Self {
            principal: name.into(),
            kind: IdentityKind::User { admin },
        }
    }

    pub fn application(id: impl Into<String>) -> Self {
        Self {
            principal: id.into(),
            kind: IdentityKind::Application,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.kind, IdentityKind::User { admin: true })
    }
}

/// Errors from account operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("account store failure: {0}")]
    Backend(String),
}

/// Identity collaborator used by the auth routes and the gate.
pub trait IdentityStore: Send + Sync {
    /// Create a user account.
    fn register(&self, username: &str, password: &str, admin: bool)
        -> Result<Identity, IdentityError>;

    /// Check credentials and open a session, returning its bearer token.
    fn login(&self, username: &str, password: &str) -> Result<String, IdentityError>;

    /// Identity behind a session bearer token.
    fn session(&self, token: &str) -> Option<Identity>;

    /// Identity behind a pre-shared internal token.
    fn internal(&self, token: &str) -> Option<Identity>;
}

/// A user account as stored. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    password_hash: String,
    admin: bool,
}

fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::Backend(e.to_string()))
}

fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

/// In-memory identity store. Accounts are lost on restart; see [`FileIdentityStore`].
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, UserRecord>,
    sessions: DashMap<String, Identity>,
    applications: DashMap<String, Identity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an internal token for a same-host application.
    ///
    /// Hook for whatever launches applications next to the daemon; the
    /// daemon itself never calls it.
    pub fn register_application(&self, app_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.applications
            .insert(token.clone(), Identity::application(app_id));
        tracing::debug!(app_id, "Internal token issued");
        token
    }

    /// Number of user accounts.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn records(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.iter().map(|u| u.value().clone()).collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        records
    }

    fn restore(&self, record: UserRecord) {
        self.users.insert(record.username.clone(), record);
    }

    fn forget(&self, username: &str) {
        self.users.remove(username);
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn register(
        &self,
        username: &str,
        password: &str,
        admin: bool,
    ) -> Result<Identity, IdentityError> {
        if username.trim().is_empty() {
            return Err(IdentityError::InvalidInput("username must not be empty".into()));
        }
        if password.is_empty() {
            return Err(IdentityError::InvalidInput("password must not be empty".into()));
        }
        if self.users.contains_key(username) {
            return Err(IdentityError::UserExists(username.to_string()));
        }

        let password_hash = hash_password(password)?;
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(IdentityError::UserExists(username.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(UserRecord {
                    username: username.to_string(),
                    password_hash,
                    admin,
                });
                tracing::info!(username, admin, "User registered");
                Ok(Identity::user(username, admin))
            }
        }
    }

    fn login(&self, username: &str, password: &str) -> Result<String, IdentityError> {
        let (password_hash, admin) = self
            .users
            .get(username)
            .map(|u| (u.password_hash.clone(), u.admin))
            .ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(password, &password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        let token = Uuid::new_v4().simple().to_string();
        self.sessions
            .insert(token.clone(), Identity::user(username, admin));
        Ok(token)
    }

    fn session(&self, token: &str) -> Option<Identity> {
        self.sessions.get(token).map(|i| i.value().clone())
    }

    fn internal(&self, token: &str) -> Option<Identity> {
        self.applications.get(token).map(|i| i.value().clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountFile {
    users: Vec<UserRecord>,
}

/// Identity store whose accounts live in a JSON file in the work directory.
///
/// Sessions and internal tokens stay in memory. Accounts are loaded by the
/// [`Initializer`] step and the whole file is rewritten after each registration.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    inner: MemoryIdentityStore,
    writer: Mutex<()>,
}

impl FileIdentityStore {
    pub const FILE: &'static str = "accounts.json";

    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(Self::FILE),
            inner: MemoryIdentityStore::new(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn user_count(&self) -> usize {
        self.inner.user_count()
    }

    /// See [`MemoryIdentityStore::register_application`].
    pub fn register_application(&self, app_id: &str) -> String {
        self.inner.register_application(app_id)
    }

    fn load(&self) -> io::Result<usize> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let file: AccountFile = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let count = file.users.len();
        for record in file.users {
            self.inner.restore(record);
        }
        Ok(count)
    }

    fn persist(&self) -> io::Result<()> {
        let _guard = self.writer.lock().expect("account file mutex poisoned");
        let file = AccountFile {
            users: self.inner.records(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&staging, &self.path)
    }
}

impl Initializer for FileIdentityStore {
    fn name(&self) -> &str {
        "identity store"
    }

    fn initialize(&self) -> Result<(), InitError> {
        let count = self
            .load()
            .map_err(|e| InitError::new(self.name(), format!("{}: {e}", self.path.display())))?;
        tracing::debug!(path = %self.path.display(), users = count, "Accounts loaded");
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn register(
        &self,
        username: &str,
        password: &str,
        admin: bool,
    ) -> Result<Identity, IdentityError> {
        let identity = self.inner.register(username, password, admin)?;
        if let Err(e) = self.persist() {
            self.inner.forget(username);
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist accounts");
            return Err(IdentityError::Backend(e.to_string()));
        }
        Ok(identity)
    }

    fn login(&self, username: &str, password: &str) -> Result<String, IdentityError> {
        self.inner.login(username, password)
    }

    fn session(&self, token: &str) -> Option<Identity> {
        self.inner.session(token)
    }

    fn internal(&self, token: &str) -> Option<Identity> {
        self.inner.internal(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_login() {
        let store = MemoryIdentityStore::new();
        let identity = store.register("admin", "s3cret", true).unwrap();
        assert!(identity.is_admin());

        let token = store.login("admin", "s3cret").unwrap();
        assert_eq!(store.session(&token), Some(Identity::user("admin", true)));
    }

    #[test]
    fn passwords_stored_as_argon2() {
        let store = MemoryIdentityStore::new();
        store.register("admin", "s3cret", true).unwrap();
        let record = store.users.get("admin").unwrap();
        assert!(record.password_hash.starts_with("$argon2"));
        assert!(!record.password_hash.contains("s3cret"));
    }

    #[test]
    fn duplicate_users_rejected() {
        let store = MemoryIdentityStore::new();
        store.register("admin", "a", true).unwrap();
        assert_eq!(
            store.register("admin", "b", false),
            Err(IdentityError::UserExists("admin".into()))
        );
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn wrong_password_rejected() {
        let store = MemoryIdentityStore::new();
        store.register("admin", "right", true).unwrap();
        assert_eq!(
            store.login("admin", "wrong"),
            Err(IdentityError::InvalidCredentials)
        );
        assert_eq!(
            store.login("nobody", "right"),
            Err(IdentityError::InvalidCredentials)
        );
    }

    #[test]
    fn internal_tokens_do_not_open_sessions() {
        let store = MemoryIdentityStore::new();
        let token = store.register_application("dns-app");
        assert_eq!(store.internal(&token), Some(Identity::application("dns-app")));
        assert!(store.session(&token).is_none());
    }

    #[test]
    fn accounts_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path());
        store.initialize().unwrap();
        store.register("admin", "s3cret", true).unwrap();
        assert!(store.path().is_file());

        let reopened = FileIdentityStore::new(dir.path());
        reopened.initialize().unwrap();
        assert_eq!(reopened.user_count(), 1);
        let token = reopened.login("admin", "s3cret").unwrap();
        assert_eq!(reopened.session(&token), Some(Identity::user("admin", true)));
        assert_eq!(
            reopened.register("admin", "other", false),
            Err(IdentityError::UserExists("admin".into()))
        );
    }

    #[test]
    fn missing_account_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path());
        store.initialize().unwrap();
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn corrupt_account_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FileIdentityStore::FILE), "{not json").unwrap();
        let err = FileIdentityStore::new(dir.path()).initialize().unwrap_err();
        assert_eq!(err.step, "identity store");
    }

    #[test]
    fn unwritable_store_rolls_back_registration() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(&dir.path().join("missing"));
        assert!(matches!(
            store.register("admin", "s3cret", true),
            Err(IdentityError::Backend(_))
        ));
        assert_eq!(store.user_count(), 0);
    }
}
