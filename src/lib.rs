pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;

use crate::app::auth::AuthService;
use crate::app::csrf::CsrfTokens;
use crate::config::AppConfig;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub csrf: CsrfTokens,
    pub session_key: [u8; 32],
    pub session_ttl_hours: u64,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(db: Db, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            db,
            csrf: CsrfTokens::new(config.csrf_key)?,
            session_key: config.session_key,
            session_ttl_hours: config.session_ttl_hours,
            cookie_secure: config.cookie_secure,
        })
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.session_key, self.session_ttl_hours)
    }
}
