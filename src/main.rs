use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use plan_bot::channels::{self, CliChannel, SessionEnd};
use plan_bot::config::PlannerConfig;
use plan_bot::planning::{PlanManager, PlanRouteState, QuestionCatalog, serve_plan_api};
use plan_bot::store::{LibSqlStore, PlanStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PlannerConfig::from_env()?;
    let _log_guard = init_tracing(&config);

    eprintln!("💰 Plan Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   User: {}", config.user_id);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn PlanStore> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Planning session ─────────────────────────────────────────────────
    let catalog = Arc::new(QuestionCatalog::standard());
    let manager = Arc::new(PlanManager::open(Arc::clone(&store), catalog, &config.user_id).await?);

    // ── REST API ─────────────────────────────────────────────────────────
    let server = match config.http_port {
        Some(port) => {
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("Failed to bind HTTP port {port}"))?;
            eprintln!("   Plan API: http://0.0.0.0:{port}/api/plan/status");
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let state = PlanRouteState {
                manager: Arc::clone(&manager),
            };
            let handle = tokio::spawn(serve_plan_api(listener, state, async move {
                let _ = stop_rx.await;
            }));
            Some((port, handle, stop_tx))
        }
        None => None,
    };

    eprintln!("   Type \"export\" once you have a plan, \"restart\" to start over, /quit to exit.\n");

    let cli = CliChannel::new();
    let session = tokio::select! {
        end = channels::run_session(&manager, &cli) => Some(end?),
        _ = tokio::signal::ctrl_c() => None,
    };
    if session == Some(SessionEnd::LeftPlanning) {
        eprintln!("Leaving planning mode. Your answers are saved for next time.");
    }

    // The API outlives the CLI session until Ctrl-C.
    if let Some((port, handle, stop_tx)) = server {
        if session.is_some() {
            eprintln!("   Plan API still serving on port {port}. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
        let _ = stop_tx.send(());
        handle.await.context("Plan API task panicked")??;
    }

    Ok(())
}

/// Install the global subscriber. Logs go to stderr, plus a daily file when
/// `PLAN_BOT_LOG_DIR` is set. Keep the returned guard alive to flush it.
fn init_tracing(config: &PlannerConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "plan-bot.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(file_writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
