use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod config;
mod content;
mod error;
mod state;

use crate::{auth::claims::Role, config::AppConfig, state::AppState};

#[derive(Debug, Parser)]
#[command(name = "portfolio-api", version, about = "Portfolio content API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create an account with the admin role.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "portfolio_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = Arc::new(AppConfig::from_env().context("load configuration")?);
    let db = state::connect(&config).await?;

    state::migrate(&db).await?;

    let app_state = AppState::from_pool(config.clone(), db)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = app::build_app(app_state);
            app::serve(app, &config).await
        }
        Command::CreateAdmin {
            username,
            email,
            password,
        } => {
            let user = auth::services::create_user(
                app_state.users.as_ref(),
                &username,
                &email,
                password,
                Role::Admin,
            )
            .await
            .context("create admin")?;
            tracing::info!(user_id = %user.id, username = %user.username, "admin account created");
            Ok(())
        }
    }
}
