use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the backend API (`shopfloor serve`)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Port of the browser-facing gateway (`shopfloor gateway`)
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            gateway_port: default_gateway_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_gateway_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite:./data/shopfloor.db?mode=rwc`
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/shopfloor.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used both to sign session tokens and to derive the cookie
    /// encryption key. Never defaulted.
    #[serde(default)]
    pub secret: Option<String>,
    /// Lifetime of an issued session token in minutes (default: 12 hours)
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    /// Always mark the session cookie `Secure`, not only behind HTTPS proxies
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
            secure_cookies: false,
        }
    }
}

/// Upper bound for `auth.token_ttl_minutes` (one year).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 366 * 24 * 60;

fn default_token_ttl_minutes() -> i64 {
    12 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the backend API the gateway forwards to
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Static PWA manifest served at `/api/manifest`
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            manifest_path: default_manifest_path(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("public/manifest.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load the TOML file (if present) and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.check_token_ttl()?;
        Ok(config)
    }

    /// The token lifetime must be positive and at most [`MAX_TOKEN_TTL_MINUTES`].
    pub fn check_token_ttl(&self) -> Result<()> {
        let ttl = self.auth.token_ttl_minutes;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl) {
            anyhow::bail!(
                "auth.token_ttl_minutes must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_MINUTES,
                ttl
            );
        }
        Ok(())
    }

    /// Apply `DATABASE_URL`, `JWT_SECRET`, `BACKEND_URL`, `HOST`, `PORT` and
    /// `GATEWAY_PORT` on top of the file values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.secret = Some(secret);
        }
        if let Some(url) = lookup("BACKEND_URL") {
            self.gateway.backend_url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.api_port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        if let Some(port) = lookup("GATEWAY_PORT") {
            self.server.gateway_port = port
                .parse()
                .with_context(|| format!("GATEWAY_PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }

    /// The configured secret, or an error when none (or an empty one) is set.
    pub fn require_secret(&self) -> Result<&str> {
        match self.auth.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => anyhow::bail!("No auth secret configured (set JWT_SECRET or auth.secret)"),
        }
    }

    /// Sanity checks used by `shopfloor config check`. Returns warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.require_secret().is_err() {
            warnings.push("auth.secret is not set; serve and gateway will refuse to start".into());
        }
        if let Err(e) = self.check_token_ttl() {
            warnings.push(e.to_string());
        }
        if !self.gateway.backend_url.starts_with("http://")
            && !self.gateway.backend_url.starts_with("https://")
        {
            warnings.push(format!(
                "gateway.backend_url is not an http(s) URL: {}",
                self.gateway.backend_url
            ));
        }
        if !self.gateway.manifest_path.exists() {
            warn!(path = %self.gateway.manifest_path.display(), "Manifest file not found");
            warnings.push(format!(
                "gateway.manifest_path does not exist: {}",
                self.gateway.manifest_path.display()
            ));
        }
        warnings
    }
}
