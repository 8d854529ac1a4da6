pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod gateway;

pub use db::DbPool;

use anyhow::Result;
use auth::SessionKeys;
use config::Config;
use crypto::TokenCodec;

/// Shared state of the backend API.
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub codec: TokenCodec,
    pub keys: SessionKeys,
}

impl AppState {
    /// Fails when no session secret is configured.
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let secret = config.require_secret()?;
        let codec = TokenCodec::from_secret(Some(secret))?;
        let keys = SessionKeys::new(secret, config.auth.token_ttl_minutes);

        Ok(Self {
            config,
            db,
            codec,
            keys,
        })
    }
}
