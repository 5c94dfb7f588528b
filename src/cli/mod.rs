use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::app::{app, AppState};
use crate::auth::{hash_password, Role, TokenCodec};
use crate::config::{config, StoreBackend};
use crate::database::models::NewUser;
use crate::database::PgStore;
use crate::services::UserError;

#[derive(Parser)]
#[command(name = "schoolsite-api")]
#[command(about = "Multi-tenant school site API server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to bind (overrides SCHOOLSITE_PORT / PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Storage backend: memory or postgres (overrides STORE_BACKEND)")]
        store: Option<StoreBackend>,
    },

    #[command(about = "Print an Argon2 hash for seeding a super admin by hand")]
    HashPassword { password: String },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, store } => serve(port, store).await,
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        }
    }
}

async fn serve(port: Option<u16>, store: Option<StoreBackend>) -> anyhow::Result<()> {
    let config = config();
    info!("Starting schoolsite API in {:?} mode", config.environment);

    let codec = TokenCodec::from_config(&config.security).context("token signing is not configured")?;

    let state = match store.unwrap_or(config.server.store) {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            AppState::in_memory(codec)
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            store.migrate().await.context("failed to apply schema")?;
            info!("Using PostgreSQL store");
            let store = Arc::new(store);
            AppState::new(store.clone(), store.clone(), store, codec)
        }
    };

    bootstrap_super_admin(&state).await?;

    let port = port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Schoolsite API listening on http://{}", bind_addr);
    axum::serve(listener, app(state, config)).await?;
    Ok(())
}

/// Creates the super admin named by `SUPER_ADMIN_EMAIL` and
/// `SUPER_ADMIN_PASSWORD` when no account with that email exists yet.
async fn bootstrap_super_admin(state: &AppState) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (std::env::var("SUPER_ADMIN_EMAIL"), std::env::var("SUPER_ADMIN_PASSWORD")) else {
        return Ok(());
    };
    if email.trim().is_empty() {
        bail!("SUPER_ADMIN_EMAIL is empty");
    }

    let created = state
        .users
        .create(NewUser {
            username: None,
            email,
            password,
            role: Some(Role::SuperAdmin),
            organization_id: None,
            permissions: None,
            name: Some("Super Admin".to_string()),
            phone: None,
            avatar: None,
            is_active: Some(true),
        })
        .await;

    match created {
        Ok(admin) => info!("Bootstrapped super admin {}", admin.id),
        Err(UserError::AlreadyExists) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
