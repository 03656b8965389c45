//! stagepass-roles - role upgrade / KYC verification service
//!
//! `stagepass-roles [serve]` runs the HTTP service (default).
//! `stagepass-roles create-account --email <e>` creates an account and prints its API token.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagepass_common::api::{generate_api_token, hash_api_token};
use stagepass_common::config::{
    resolve_config_path, resolve_root_folder, RootFolderInitializer, TomlConfig,
};
use stagepass_common::db::settings::DOCUMENT_MAX_BYTES_KEY;
use stagepass_common::db::{get_setting, init_database};
use stagepass_roles::db::accounts;
use stagepass_roles::documents::{DocumentStore, DEFAULT_MAX_BYTES};
use stagepass_roles::notify::{resolve_webhook_url, LogMailer, NotificationDispatcher};
use stagepass_roles::{build_router, AppState, RoleWorkflow, DEFAULT_PORT};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "stagepass-roles")]
#[command(about = "StagePass role upgrade and KYC verification service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "STAGEPASS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and KYC documents
    #[arg(short, long, env = "STAGEPASS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP port (overrides TOML)
    #[arg(short, long, env = "STAGEPASS_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve,

    /// Create an account and print its API token (shown only once)
    CreateAccount {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        display_name: String,

        /// Grant administrator privileges
        #[arg(long)]
        superuser: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // RUST_LOG wins over the TOML level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting StagePass Roles (stagepass-roles) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration file: {}", config_path.display());

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("✓ Database ready: {}", db_path.display());

    match args.command.unwrap_or(Command::Serve) {
        Command::CreateAccount {
            email,
            display_name,
            superuser,
        } => {
            let token = generate_api_token();
            let account = accounts::create_account(
                &pool,
                email.trim(),
                display_name.trim(),
                superuser,
                Some(&hash_api_token(&token)),
                stagepass_common::time::now(),
            )
            .await
            .context("Failed to create account")?;

            info!(account_id = account.id, superuser, "Account created");
            println!("Account #{} <{}> ({})", account.id, account.email, account.display_role());
            println!("API token (store it now, it is not shown again):");
            println!("{}", token);
            pool.close().await;
            Ok(())
        }
        Command::Serve => serve(args.port, config, initializer, pool).await,
    }
}

async fn serve(
    port_arg: Option<u16>,
    config: TomlConfig,
    initializer: RootFolderInitializer,
    pool: sqlx::SqlitePool,
) -> Result<()> {
    let webhook_url = resolve_webhook_url(&pool, config.notifications.webhook_url.as_deref())
        .await
        .context("Failed to read webhook setting")?;
    let dispatcher =
        NotificationDispatcher::from_config(&config.notifications, webhook_url, Arc::new(LogMailer))
            .context("Failed to set up notifications")?;

    let max_bytes = get_setting(&pool, DOCUMENT_MAX_BYTES_KEY)
        .await
        .context("Failed to read document size setting")?
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_BYTES);
    let documents = DocumentStore::new(initializer.root_folder().to_path_buf(), max_bytes);
    info!("KYC documents: {} (max {} bytes)", initializer.documents_path().display(), max_bytes);

    let workflow = RoleWorkflow::new(pool.clone(), dispatcher.clone(), documents);
    let app = build_router(AppState::new(pool.clone(), workflow));

    let port = port_arg.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("stagepass-roles listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(
        in_flight = dispatcher.in_flight(),
        "Waiting for pending notifications"
    );
    dispatcher.drain().await;
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
