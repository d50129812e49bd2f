use anyhow::Context;
use emote_tracker::EmoteTracker;
use emote_tracker::catalog::CatalogCache;
use emote_tracker::chat::ChatMessage;
use emote_tracker::config::load_settings;
use emote_tracker::logging::{init_tracing, log_error};
use emote_tracker::registry::SevenTvClient;
use emote_tracker::storage::{Autosave, UsagePersistence};
use emote_tracker::usage::UsageStore;
use std::io::BufRead;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings().context("Failed to load configuration")?;
    init_tracing(settings.log_json);

    tracing::info!("🚀 Starting emote tracker");
    tracing::debug!(
        channels = settings.channels.len(),
        data_path = ?settings.storage.data_path,
        ttl_secs = settings.cache.ttl_secs,
        "Config loaded"
    );

    // Restore usage counts; a corrupt file stops startup so autosave cannot overwrite it
    let store = Arc::new(UsageStore::new());
    let persistence = Arc::new(UsagePersistence::new(settings.storage.data_path.clone()));
    persistence
        .load(&store)
        .await
        .context("Failed to restore usage data")?;

    let registry = Arc::new(SevenTvClient::new(&settings.registry)?);
    let cache = Arc::new(CatalogCache::with_ttl(registry, settings.cache.ttl()));
    tracing::info!("✅ Catalog cache initialized");

    let shutdown = CancellationToken::new();

    let autosave = Autosave::new(
        store.clone(),
        persistence.clone(),
        settings.storage.autosave_interval(),
    )
    .spawn(shutdown.child_token());

    let preload = {
        let cache = cache.clone();
        let channels = settings.channels.clone();
        let cancel = shutdown.child_token();
        tokio::spawn(async move { cache.preload(&channels, &cancel).await })
    };

    let tracker = EmoteTracker::new(cache.clone(), store.clone(), settings.channels.clone());

    // Setup shutdown signal handler in background
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<String>(1);
    tokio::spawn(async move {
        let signal_name = setup_shutdown_handler().await;
        let _ = shutdown_tx.send(signal_name).await;
    });

    tracing::info!("Reading chat lines from stdin");
    let mut lines = spawn_line_reader();

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(Ok(line)) => ingest(&tracker, &line).await,
                Some(Err(e)) => {
                    log_error("read_chat", &e);
                    break;
                }
                None => {
                    tracing::info!("Chat input closed");
                    break;
                }
            },
            Some(signal_name) = shutdown_rx.recv() => {
                tracing::info!(
                    signal = %signal_name,
                    "Received shutdown signal, initiating graceful shutdown"
                );
                break;
            }
        }
    }

    shutdown.cancel();
    if let Err(e) = preload.await {
        tracing::warn!(error = %e, "Catalog preload task ended abnormally");
    }

    let outcome = autosave.shutdown().await?;
    tracing::info!(outcome = ?outcome, "Usage data flushed");

    cache.log_stats().await;
    for row in store.top_global(5).await {
        tracing::info!(
            channel = %row.channel,
            emote = %row.emote_name,
            count = row.count,
            "Top emote"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up runtime shutdown
fn spawn_line_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(1024);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn ingest(tracker: &EmoteTracker, line: &str) {
    match ChatMessage::parse_irc(line) {
        Ok(Some(message)) => {
            tracker.handle_message(&message).await;
        }
        Ok(None) => tracing::trace!("Skipping non-chat line"),
        Err(e) => tracing::warn!(error = %e, "Unparseable chat line"),
    }
}

/// Wait for a shutdown signal (SIGINT, SIGTERM or SIGQUIT on Unix)
///
/// The ingest loop also stops when stdin reaches EOF; both paths end in the
/// same final flush.
async fn setup_shutdown_handler() -> String {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Failed to setup SIGQUIT handler");

        tokio::select! {
            _ = sigint.recv() => "SIGINT (Ctrl+C)".to_string(),
            _ = sigterm.recv() => "SIGTERM".to_string(),
            _ = sigquit.recv() => "SIGQUIT".to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        "Ctrl+C".to_string()
    }
}
