// ============================================
// File: crates/sealpost-server/src/main.rs
// ============================================
//! # Sealpost Relay Entry Point
//!
//! ## Creation Reason
//! Main entry point for the sealpost relay binary.
//! Handles CLI parsing, logging setup, account provisioning and server
//! startup.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Account registration and token issuance
//! - Server execution
//!
//! ## Usage
//! ```bash
//! # Step 1: Generate a client key pair (the private half stays on the client)
//! sealpost-server keygen
//!
//! # Step 2: Register the account
//! sealpost-server register --username alice --public-key <BASE64>
//!
//! # Step 3: Start the relay
//! sealpost-server start
//!
//! # Other commands
//! sealpost-server token --user-id 1     # Issue a fresh token
//! sealpost-server validate              # Validate config file
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `register` and `token` need the file backend and a fixed token
//!   secret, otherwise nothing they produce outlives the command
//! - Tokens are printed to stdout; logs go to stderr
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroize;

use sealpost_common::IdentityId;
use sealpost_core::crypto::{IdentityKeyPair, IdentityPublicKey};
use sealpost_server::config::StorageBackend;
use sealpost_server::services::{open_storage, NewUser, TokenAuthenticator};
use sealpost_server::{Server, ServerConfig};

const DEFAULT_CONFIG_PATH: &str = "/etc/sealpost/server.toml";

// ============================================
// CLI Definition
// ============================================

/// Sealpost end-to-end encrypted messaging relay
///
/// Quick Start:
///   1. Run: sealpost-server keygen
///   2. Run: sealpost-server register --username <NAME> --public-key <KEY>
///   3. Run: sealpost-server start
#[derive(Parser, Debug)]
#[command(name = "sealpost-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Generate an X25519 identity key pair
    ///
    /// The private key belongs in the client's secret store; only the
    /// public key is registered with the relay.
    Keygen,

    /// Register an account
    Register {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Login name
        #[arg(short, long)]
        username: String,

        /// Base64 X25519 public key
        #[arg(short, long)]
        public_key: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// Issue a bearer token for an existing account
    Token {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Account id
        #[arg(short, long)]
        user_id: u64,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging("info");

    // Execute command
    let result = match cli.command {
        Commands::Start { config } => cmd_start(&config).await,
        Commands::Validate { config } => cmd_validate(&config).await,
        Commands::Keygen => cmd_keygen(),
        Commands::Register {
            config,
            username,
            public_key,
            admin,
        } => cmd_register(&config, username, &public_key, admin).await,
        Commands::Token { config, user_id } => cmd_token(&config, user_id).await,
    };

    // Handle errors
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the relay.
async fn cmd_start(config_path: &Path) -> anyhow::Result<()> {
    info!("Starting sealpost relay...");

    let config = load_or_default_config(config_path).await?;

    // Re-initialize logging with config level
    init_logging(&config.logging.level);

    info!("════════════════════════════════════════");
    info!("Listen:     {}", config.listen_addr());
    info!("Storage:    {:?}", config.storage.backend);
    info!("Token TTL:  {}s", config.auth.token_ttl_secs);
    info!("════════════════════════════════════════");

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Server will use default values.");
        return Ok(());
    }

    let config = ServerConfig::load(config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:            {}", config.listen_addr());
    println!();
    println!("Limits:");
    println!("   Max Connections:   {}", config.limits.max_connections);
    println!("   Max Frame:         {} bytes", config.limits.max_frame_bytes);
    println!("   Handshake Timeout: {}s", config.limits.handshake_timeout_secs);
    println!("   Idle Timeout:      {}s", config.limits.idle_timeout_secs);
    println!();
    println!("Auth:");
    println!(
        "   Token Secret:      {}",
        if config.auth.token_secret.is_some() { "configured" } else { "ephemeral" }
    );
    println!("   Token TTL:         {}s", config.auth.token_ttl_secs);
    println!();
    println!("Storage:");
    println!("   Backend:           {:?}", config.storage.backend);
    if let Some(path) = &config.storage.path {
        println!("   Path:              {}", path.display());
    }
    println!();

    Ok(())
}

/// Generates an identity key pair.
fn cmd_keygen() -> anyhow::Result<()> {
    use base64::Engine;

    let identity = IdentityKeyPair::generate();
    let mut secret = identity.to_bytes();
    let encoded = base64::engine::general_purpose::STANDARD.encode(secret);
    secret.zeroize();

    println!("Private Key:  {encoded}");
    println!("Public Key:   {}", identity.public_key().to_base64());
    println!("Fingerprint:  {}", identity.public_key().fingerprint());
    println!();
    println!("Keep the private key on the client. Register the public key with:");
    println!("   sealpost-server register --username <NAME> --public-key <PUBLIC KEY>");

    Ok(())
}

/// Registers an account and prints its first token.
async fn cmd_register(
    config_path: &Path,
    username: String,
    public_key: &str,
    admin: bool,
) -> anyhow::Result<()> {
    let config = load_provisioning_config(config_path).await?;
    let public_key =
        IdentityPublicKey::from_base64(public_key).context("public key is not a valid X25519 key")?;

    let storage = open_storage(&config.storage).await?;
    let user = storage
        .create_user(NewUser {
            username,
            public_key,
            is_admin: admin,
        })
        .await?;

    let authenticator = TokenAuthenticator::from_config(&config.auth, storage);
    let token = authenticator.issue(&user)?;

    println!("✅ Account registered");
    println!();
    println!("   User ID:   {}", user.id);
    println!("   Username:  {}", user.username);
    println!("   Admin:     {}", user.is_admin);
    println!("   Token:     {token}");
    println!();

    Ok(())
}

/// Issues a token for an existing account.
async fn cmd_token(config_path: &Path, user_id: u64) -> anyhow::Result<()> {
    let config = load_provisioning_config(config_path).await?;
    let storage = open_storage(&config.storage).await?;

    let Some(user) = storage.get_user(IdentityId::new(user_id)).await? else {
        bail!("no account with id {user_id}");
    };
    if user.disabled {
        bail!("account {} is disabled", user.username);
    }

    let authenticator = TokenAuthenticator::from_config(&config.auth, storage);
    println!("{}", authenticator.issue(&user)?);

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads config, or defaults with environment overrides if the file is
/// missing.
async fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path).await?)
    } else {
        info!("Config file not found, using defaults");
        let mut config = ServerConfig::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }
}

/// Loads config for commands whose output must outlive the process.
async fn load_provisioning_config(path: &Path) -> anyhow::Result<ServerConfig> {
    let config = load_or_default_config(path).await?;
    if config.storage.backend != StorageBackend::File {
        bail!("this command needs storage.backend = \"file\"");
    }
    if config.auth.token_secret.is_none() {
        bail!("this command needs auth.token_secret (or SEALPOST_TOKEN_SECRET)");
    }
    Ok(config)
}
