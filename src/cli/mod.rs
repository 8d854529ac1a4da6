//! Command-line interface.
//!
//! - `serve` - Run the backend API
//! - `gateway` - Run the browser-facing gateway
//! - `user create` - Create a user account directly in the database
//! - `config check` - Validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::validation::parse_new_user;
use crate::auth::hash_password;
use crate::config::Config;
use crate::db::{self, CreateUserRequest, NewUser, User};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "shopfloor")]
#[command(author, version, about = "Workshop job-order and appointment service", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SHOPFLOOR_CONFIG", default_value = "shopfloor.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the backend API server
    Serve,

    /// Run the browser-facing gateway
    Gateway,

    /// User account management
    #[command(subcommand)]
    User(UserCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a user account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// administrator, job-controller, technician, service-advisor or superadmin
        #[arg(long)]
        role: String,
        /// Password (prefer the environment variable over the command line)
        #[arg(long, env = "SHOPFLOOR_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Technician level
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        picture_url: Option<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a management subcommand. `serve` and `gateway` are handled in main.rs.
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    match &cli.command {
        Commands::User(UserCommands::Create {
            name,
            email,
            role,
            password,
            level,
            picture_url,
        }) => {
            let request = CreateUserRequest {
                name: Some(name.clone()),
                email: Some(email.clone()),
                password: Some(password.clone()),
                role: Some(role.clone()),
                level: level.clone(),
                picture_url: picture_url.clone(),
                break_times: Vec::new(),
            };
            cmd_user_create(&config, request).await
        }
        Commands::Config(ConfigCommands::Check) => cmd_config_check(cli, &config),
        Commands::Serve | Commands::Gateway => Ok(()),
    }
}

async fn cmd_user_create(config: &Config, request: CreateUserRequest) -> Result<()> {
    let payload = parse_new_user(request).map_err(|e| {
        let details = e
            .fields()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, problems)| format!("{}: {}", field, problems.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        anyhow::anyhow!("Invalid user: {}", details)
    })?;

    let password_hash = hash_password(&payload.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    let pool = db::init(&config.database.url, config.database.max_connections).await?;
    let user = User::create(
        &pool,
        &NewUser {
            name: payload.name,
            email: payload.email,
            password_hash,
            role: payload.role,
            level: payload.level,
            picture_url: payload.picture_url,
            break_times: payload.break_times,
        },
    )
    .await
    .context("Failed to create user (is the email already taken?)")?;
    pool.close().await;

    println!("[OK] Created {} {} <{}>", user.role, user.name, user.email);
    println!("     ID: {}", user.id);
    Ok(())
}

fn cmd_config_check(cli: &Cli, config: &Config) -> Result<()> {
    println!("Checking configuration file: {}", cli.config.display());
    if !cli.config.exists() {
        println!("[!!] File not found; defaults and environment overrides are in effect");
    }
    println!();

    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Host:         {}", config.server.host);
    println!("  API Port:     {}", config.server.api_port);
    println!("  Gateway Port: {}", config.server.gateway_port);
    println!();
    println!("Database:");
    println!("  URL:          {}", config.database.url);
    println!("  Connections:  {}", config.database.max_connections);
    println!();
    println!("Auth:");
    println!(
        "  Secret:       {}",
        if config.require_secret().is_ok() {
            "Set"
        } else {
            "MISSING"
        }
    );
    println!("  Token TTL:    {} minutes", config.auth.token_ttl_minutes);
    println!(
        "  Secure cookies: {}",
        if config.auth.secure_cookies {
            "Always"
        } else {
            "Behind HTTPS proxy only"
        }
    );
    println!();
    println!("Gateway:");
    println!("  Backend URL:  {}", config.gateway.backend_url);
    println!("  Manifest:     {}", config.gateway.manifest_path.display());
    println!();

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("[OK] Configuration is valid");
        return Ok(());
    }

    println!("Warnings:");
    for warning in &warnings {
        println!("  [!!] {}", warning);
    }
    println!();

    if config.require_secret().is_err() {
        anyhow::bail!("Configuration is not usable: no auth secret");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "shopfloor",
            "user",
            "create",
            "--name",
            "Tess",
            "--email",
            "tess@example.com",
            "--role",
            "technician",
            "--password",
            "secret1",
        ])
        .unwrap();

        match cli.command {
            Commands::User(UserCommands::Create { role, level, .. }) => {
                assert_eq!(role, "technician");
                assert!(level.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("shopfloor.toml"));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["shopfloor"]).is_err());
    }
}
