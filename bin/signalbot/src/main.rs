use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use common::logfile::LOG_FILE_PREFIX;
use common::{AlertSink, CandleSource, Config, EngineCommand};
use detector::{DetectorConfig, PatternDetector};
use engine::notifier::{startup_message, stopped_message};
use engine::{Engine, Notifier, Pipeline};
use market::{FallbackSource, LiveFeedClient, SyntheticSource};
use telegram_ctrl::{start_bot, BotDeps, TelegramSink};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console plus a daily rolling file under `log_dir`. The guard must live
/// until exit or buffered file lines are lost.
fn init_logging(log_dir: &str) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(env_filter())
        .init();
    Ok(guard)
}

fn fail(msg: &str, err: impl std::fmt::Display) -> ! {
    error!(error = %err, "{msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            fail("Invalid configuration", e);
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let _log_guard = match init_logging(&cfg.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            fail("Cannot open log directory", e);
        }
    };
    info!(
        symbols = ?cfg.analysis.symbols,
        timeframes = ?cfg.analysis.timeframes,
        interval_secs = cfg.analysis.interval_secs,
        "SignalBot starting"
    );
    if !cfg.analysis_file_found {
        info!(path = %cfg.analysis_config_path, "No analysis config file, using defaults");
    }

    let detector_cfg = DetectorConfig::load(&cfg.analysis_config_path)
        .unwrap_or_else(|e| fail("Invalid detector configuration", e));

    // ── Candle source ─────────────────────────────────────────────────────────
    let live: Option<Arc<dyn CandleSource>> = match &cfg.feed {
        Some(creds) => match LiveFeedClient::connect(creds).await {
            Ok(client) => {
                info!("Using REAL market data");
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!(error = %e, "Live feed connection failed, using SAMPLE data");
                None
            }
        },
        None => {
            warn!("No live feed credentials, using SAMPLE data");
            None
        }
    };
    let source = Arc::new(FallbackSource::new(live, SyntheticSource::new()));
    let data_source = source.data_source();

    // ── Engine ────────────────────────────────────────────────────────────────
    let sink: Arc<dyn AlertSink> =
        Arc::new(TelegramSink::new(cfg.telegram_token.clone(), cfg.telegram_chat_id));
    let offset = cfg.analysis.display_utc_offset_hours;

    let pipeline = Pipeline::new(
        &cfg.analysis,
        source,
        PatternDetector::new(detector_cfg),
        Notifier::new(sink.clone(), offset),
    );
    let (engine, engine_handle) = Engine::new(pipeline, cfg.analysis.interval());
    let announcer = Arc::new(Notifier::new(sink, offset));
    let banner = startup_message(&cfg.analysis.symbols, &cfg.analysis.timeframes, data_source);

    // ── Telegram commands ─────────────────────────────────────────────────────
    let bot_deps = BotDeps {
        command_tx: {
            // Bridge chat commands to the engine handle, announcing transitions.
            let (tx, mut rx) = mpsc::channel::<EngineCommand>(32);
            let handle = engine_handle.clone();
            let announcer = announcer.clone();
            let banner = banner.clone();
            tokio::spawn(async move {
                while let Some(cmd) = rx.recv().await {
                    match cmd {
                        EngineCommand::Start => {
                            handle.send(cmd).await;
                            announcer.announce(&banner).await;
                        }
                        EngineCommand::Stop => {
                            if !handle.stop().await {
                                warn!("Stop still pending, announcing once the current tick ends");
                                handle.wait_stopped().await;
                            }
                            announcer.announce(stopped_message()).await;
                        }
                    }
                }
            });
            tx
        },
        engine_state: engine_handle.state_cell(),
        stats: engine_handle.stats(),
        symbols: Arc::new(cfg.analysis.symbols.clone()),
        timeframes: Arc::new(cfg.analysis.timeframes.clone()),
        data_source,
        log_dir: PathBuf::from(&cfg.log_dir),
        chat_id: teloxide::types::ChatId(cfg.telegram_chat_id),
        utc_offset_hours: offset,
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(engine.run());
    tokio::spawn(start_bot(cfg.telegram_token.clone(), bot_deps));

    engine_handle.send(EngineCommand::Start).await;
    announcer.announce(&banner).await;
    info!(source = %data_source, "All subsystems started. Waiting for shutdown signal.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    engine_handle.stop().await;
    announcer.announce(stopped_message()).await;
    info!("Trading bot stopped");
}
