//! Accounts and bearer-token sessions
//!
//! Passwords are stored as salted SHA-256 digests; sessions are random
//! UUID tokens held in memory until they expire or the process exits.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::AuthConfig;
use crate::models::{Account, Role};
use crate::store::{Store, StoreError};

/// An authenticated session attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub expires_at: Instant,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Result of looking up a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Valid(Session),
    Expired,
    Unknown,
}

/// Issued sessions keyed by token
pub struct Sessions {
    ttl: Duration,
    tokens: RwLock<HashMap<String, Session>>,
}

impl Sessions {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a new token for `account`, dropping every expired session
    pub fn issue(&self, account: &Account) -> String {
        self.issue_at(account, Instant::now())
    }

    fn issue_at(&self, account: &Account, now: Instant) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = Session {
            account_id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            expires_at: now + self.ttl,
        };

        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, s| s.expires_at > now);
        if tokens.len() < before {
            tracing::debug!(purged = before - tokens.len(), "expired sessions dropped");
        }
        tokens.insert(token.clone(), session);
        token
    }

    /// Look up a token, evicting it if it has expired
    pub fn lookup(&self, token: &str) -> TokenLookup {
        self.lookup_at(token, Instant::now())
    }

    fn lookup_at(&self, token: &str, now: Instant) -> TokenLookup {
        let session = match self.tokens.read().get(token) {
            Some(s) => s.clone(),
            None => return TokenLookup::Unknown,
        };

        if now >= session.expires_at {
            self.tokens.write().remove(token);
            return TokenLookup::Expired;
        }
        TokenLookup::Valid(session)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }
}

/// Fresh random salt as hex
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Hex SHA-256 of `salt || password`
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn verify_password(account: &Account, password: &str) -> bool {
    hash_password(&account.password_salt, password) == account.password_hash
}

/// Build an unsaved account with a hashed password
pub fn new_account(
    name: &str,
    email: &str,
    phone: Option<String>,
    password: &str,
    role: Role,
) -> Account {
    let salt = generate_salt();
    Account {
        id: 0,
        name: name.to_string(),
        email: email.to_string(),
        phone,
        password_hash: hash_password(&salt, password),
        password_salt: salt,
        role,
    }
}

/// Create the configured admin account if no account uses its email yet
pub fn seed_admin(store: &Store, cfg: &AuthConfig) -> Result<(), StoreError> {
    let (Some(email), Some(password)) = (&cfg.admin_email, &cfg.admin_password) else {
        return Ok(());
    };

    if store
        .accounts
        .find(|a| a.email.eq_ignore_ascii_case(email))
        .is_some()
    {
        return Ok(());
    }

    let admin = store
        .accounts
        .insert(new_account("admin", email, None, password, Role::Admin))?;
    tracing::info!(account_id = admin.id, email = %admin.email, "seeded admin account");
    Ok(())
}
