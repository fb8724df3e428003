use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::info;

use crate::client::{ChatClient, Readiness};
use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::media::{FfmpegTranscoder, Transcoder};
use crate::tempfiles::TempFileLedger;
use crate::watcher::PdfWatcher;

pub struct AppState {
    pub config: Config,
    pub client: Arc<dyn ChatClient>,
    pub transcoder: Arc<dyn Transcoder>,
    pub ledger: Arc<TempFileLedger>,
    pub readiness: Readiness,
    pub watcher: PdfWatcher,
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(config.subprocess_timeout_secs);
    let state = Arc::new(AppState {
        client: Arc::new(GatewayClient::new(&config)),
        transcoder: Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone(), timeout)),
        ledger: Arc::new(TempFileLedger::new()),
        readiness: Readiness::new(),
        watcher: PdfWatcher::new(),
        config,
    });

    let web_state = state.clone();
    info!(
        "Starting bridge server on {}:{} (gateway at {})",
        state.config.http_host, state.config.http_port, state.config.gateway_url
    );
    tokio::spawn(async move {
        crate::web::start_web_server(web_state).await;
    });

    info!("Runtime active; waiting for Ctrl-C");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to listen for Ctrl-C: {e}"))?;

    // Reclaim whatever conversions never reached their per-request cleanup.
    state.ledger.sweep().await;
    Ok(())
}
