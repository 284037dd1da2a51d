use std::sync::Arc;

use going_security::{HashParams, PasswordError, PasswordService, SessionCookie, SessionStore, SessionStoreConfig};
use going_shared::config::AppConfig;

use crate::users::UserDirectory;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub passwords: Arc<PasswordService>,
    pub users: Arc<dyn UserDirectory>,
    pub cookie: SessionCookie,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionStore>,
        passwords: Arc<PasswordService>,
        users: Arc<dyn UserDirectory>,
        cookie: SessionCookie,
    ) -> Self {
        Self {
            sessions,
            passwords,
            users,
            cookie,
        }
    }

    /// Builds a fresh store and password service from configuration.
    pub fn from_config(config: &AppConfig, users: Arc<dyn UserDirectory>) -> Result<Self, PasswordError> {
        let passwords = PasswordService::new(HashParams::from(&config.hashing))?;
        let sessions = SessionStore::new(SessionStoreConfig::from(&config.session));
        Ok(Self::new(
            Arc::new(sessions),
            Arc::new(passwords),
            users,
            SessionCookie::from(&config.session),
        ))
    }
}
