use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagegate::{AppConfig, AppState, Buckets, ReviewEngine, build_router};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Review desk for signed transactions staged in an object store.
#[derive(Debug, Parser)]
#[command(name = "stagegate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Overrides APP_HOST
        #[arg(long)]
        host: Option<String>,
        /// Overrides APP_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the signature keys of pending transactions
    Pending,
    /// Rebuild the user index and print it
    RebuildIndex,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;

    let buckets = Buckets::open(config.store_backend, &config.review, &config.store_root)
        .await
        .context("failed to open buckets")?;
    let engine = Arc::new(ReviewEngine::new(
        config.review.clone(),
        buckets.staging,
        buckets.admin,
    ));

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, engine).await
        }
        Command::Pending => {
            for key in engine.list_pending().await? {
                println!("{key}");
            }
            Ok(())
        }
        Command::RebuildIndex => {
            let users = engine.user_index().rebuild().await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, engine: Arc<ReviewEngine>) -> Result<()> {
    let public_dir = config.public_dir.as_deref().filter(|dir| dir.is_dir());
    let app = build_router(AppState::new(engine), public_dir);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        address = %addr,
        backend = ?config.store_backend,
        store_root = %config.store_root.display(),
        admin_bucket = %config.review.admin_bucket,
        public_bucket = %config.review.public_bucket,
        region = %config.review.region,
        static_files = public_dir.is_some(),
        "review server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let signal = shutdown_signal().await;
            info!(signal, "shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "stagegate=info,tower_http=info";

/// `RUST_LOG` when it parses, the service default otherwise.
fn log_filter(from_env: Option<&str>) -> EnvFilter {
    from_env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_tracing() {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(log_filter(from_env.as_deref()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(err) => {
                error!(error = %err, "cannot listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
