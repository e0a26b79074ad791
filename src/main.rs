use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tallybot::analytics::EngagementAnalyzer;
use tallybot::bluesky::{BlueskyClient, SocialClient};
use tallybot::config::Config;
use tallybot::output::{terminal, ReplyComposer};
use tallybot::pipeline::history::fetch_history;
use tallybot::pipeline::{BotOrchestrator, ProcessedCursor};
use tallybot::status::BotHealth;

/// Tallybot: engagement stats on demand for Bluesky.
///
/// Mention the bot and it replies with your top recent post, your top post
/// of all time, and your most ratioed post.
#[derive(Parser)]
#[command(name = "tallybot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: poll for mentions and reply until stopped
    Run,

    /// Dry run: analyze an account and print the thread without posting
    Analyze {
        /// The handle to analyze (e.g. someone.bsky.social)
        handle: String,
    },

    /// Show the saved notification cursor
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse first so --help and --version work whatever the environment holds
    let cli = Cli::parse();

    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("tallybot={}", config.log_level))
            }),
        )
        .init();

    match cli.command {
        Commands::Run => run_bot(config).await?,

        Commands::Analyze { handle } => {
            config.require_bluesky()?;
            let client = login(&config).await?;
            let handle = handle.trim_start_matches('@').to_string();

            println!("Fetching posts for @{handle}...");
            let posts = fetch_history(
                &client,
                &handle,
                config.max_posts,
                &config.orchestrator_settings().call_policy,
            )
            .await
            .with_context(|| format!("Failed to fetch posts for @{handle}"))?;

            let analyzer = EngagementAnalyzer::new(config.analyzer_settings());
            let result = analyzer.analyze(&posts, Utc::now());
            let thread = ReplyComposer::new(config.composer_settings()).compose(&result, &handle);
            terminal::display_analysis(&handle, posts.len(), &result, &thread);
        }

        Commands::Status => {
            tallybot::status::show(&config.db_path).await?;
        }
    }

    Ok(())
}

async fn login(config: &Config) -> Result<BlueskyClient> {
    BlueskyClient::login(&config.pds_url, &config.bluesky_handle, &config.bluesky_app_password)
        .await
}

async fn run_bot(config: Config) -> Result<()> {
    config.require_bluesky()?;

    let store = tallybot::db::open_store(&config.db_path)?;
    let cursor = ProcessedCursor::load(store, Utc::now()).await?;
    info!(
        watermark = %tallybot::status::format_time(&cursor.watermark()),
        handled = cursor.handled_len(),
        "Resuming from saved cursor"
    );

    let client: Arc<dyn SocialClient> = Arc::new(login(&config).await?);
    let health = BotHealth::new(Utc::now());
    let shutdown = CancellationToken::new();

    let server = tokio::spawn({
        let health = health.clone();
        let shutdown = shutdown.clone();
        let bind = config.health_check_bind.clone();
        let port = config.health_check_port;
        async move {
            if let Err(e) = tallybot::web::serve_health(health, &bind, port, shutdown).await {
                error!(error = %e, "Health check server stopped");
            }
        }
    });

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    println!(
        "{}",
        format!("tallybot running as @{}", config.bluesky_handle).bold()
    );

    let mut orchestrator = BotOrchestrator::new(
        client,
        cursor,
        EngagementAnalyzer::new(config.analyzer_settings()),
        ReplyComposer::new(config.composer_settings()),
        config.orchestrator_settings(),
        health,
    );
    orchestrator.run(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = server.await {
        warn!(error = %e, "Health check task panicked");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
