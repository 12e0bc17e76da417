// Application state module
// Shared runtime state handed to every request

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::types::Config;
use crate::auth::{self, Sessions};
use crate::store::{Store, StoreError};

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub sessions: Sessions,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,

    pub started_at: Instant,
}

impl AppState {
    /// Open the record store and build the shared state.
    ///
    /// Seeds the admin account when `auth.admin_email` and
    /// `auth.admin_password` are both configured.
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let store = Store::open(&config.storage)?;
        auth::seed_admin(&store, &config.auth)?;

        Ok(Self {
            cached_access_log: AtomicBool::new(config.logging.access_log),
            sessions: Sessions::new(config.auth.token_ttl_secs),
            store,
            config,
            started_at: Instant::now(),
        })
    }

    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}
