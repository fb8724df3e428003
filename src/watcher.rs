use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::client::{IncomingMedia, IncomingMessage};
use crate::error::BridgeError;
use crate::messaging::send_with_optional_media;
use crate::resolver::resolve_chat;
use crate::runtime::AppState;
use crate::tempfiles::remove_temp_file;

/// Where incoming group PDFs are forwarded after processing.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub group_id: String,
    pub forward_to: String,
}

/// Singleton watch configuration; absent by default, replaced wholesale by
/// each configuration call, consulted on every incoming-message event.
#[derive(Clone, Default)]
pub struct PdfWatcher {
    target: Arc<RwLock<Option<WatchTarget>>>,
}

impl PdfWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn configure(&self, target: WatchTarget) {
        info!(
            "Watching group {} for PDFs, forwarding to {}",
            target.group_id, target.forward_to
        );
        *self.target.write().await = Some(target);
    }

    pub async fn target(&self) -> Option<WatchTarget> {
        self.target.read().await.clone()
    }
}

fn is_pdf_attachment(media: &IncomingMedia) -> bool {
    media.mime_type == "application/pdf"
        || Path::new(&media.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn attachment_base_name(media: &IncomingMedia) -> String {
    Path::new(&media.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("document.pdf")
        .to_string()
}

/// Run the configured document processor on `input`. The command template's
/// `{file}` placeholder is replaced by the input path; on success the
/// processor prints the output path, non-zero exit is failure.
pub async fn run_pdf_processor(
    command_template: &str,
    input: &Path,
    timeout: Duration,
) -> Result<PathBuf, BridgeError> {
    let cmd_line = command_template.replace("{file}", &input.to_string_lossy());

    let mut child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&cmd_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BridgeError::Conversion(format!("failed to run PDF processor: {e}")))?;

    let mut stdout_pipe = child.stdout.take();
    let stdout_drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(stdout) = stdout_pipe.as_mut() {
            let _ = stdout.read_to_end(&mut buf).await;
        }
        buf
    });
    let mut stderr_pipe = child.stderr.take();
    let stderr_drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr_pipe.as_mut() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(res) => res?,
        Err(_) => {
            let _ = child.kill().await;
            return Err(BridgeError::Conversion(format!(
                "PDF processor timed out after {timeout:?}"
            )));
        }
    };

    if !status.success() {
        let stderr = stderr_drain.await.unwrap_or_default();
        return Err(BridgeError::Conversion(format!(
            "PDF processor exited with {status}: {}",
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    let stdout = stdout_drain.await.unwrap_or_default();
    let out_path = String::from_utf8_lossy(&stdout).trim().to_string();
    if out_path.is_empty() {
        return Err(BridgeError::Conversion(
            "PDF processor printed no output path".into(),
        ));
    }
    Ok(PathBuf::from(out_path))
}

/// Incoming-message hook: when the watched group receives a PDF, download it,
/// process it, forward the result, and reclaim the transient files. Every
/// failure is logged and terminal for this event.
pub async fn handle_incoming_message(state: &AppState, msg: IncomingMessage) {
    let Some(target) = state.watcher.target().await else {
        return;
    };
    if msg.chat_id != target.group_id {
        return;
    }
    let Some(media) = &msg.media else {
        return;
    };
    if !is_pdf_attachment(media) {
        return;
    }

    let file_name = attachment_base_name(media);
    info!(
        "Incoming PDF '{file_name}' in watched group {} from {}",
        msg.chat_id, msg.sender
    );

    let bytes = match state.client.download_media(&media.media_id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to download PDF '{file_name}': {e}");
            return;
        }
    };

    let downloads_dir = state.config.downloads_dir_path();
    if let Err(e) = tokio::fs::create_dir_all(&downloads_dir).await {
        error!("Failed to create downloads dir {}: {e}", downloads_dir.display());
        return;
    }
    let local = downloads_dir.join(format!("{}-{file_name}", uuid::Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&local, &bytes).await {
        error!("Failed to store PDF at {}: {e}", local.display());
        return;
    }
    state.ledger.register(&local);

    let timeout = Duration::from_secs(state.config.subprocess_timeout_secs);
    let processed =
        match run_pdf_processor(&state.config.pdf_processor_command, &local, timeout).await {
            Ok(path) => path,
            Err(e) => {
                error!("PDF processing failed for '{file_name}': {e}");
                cleanup(state, &[local]).await;
                return;
            }
        };
    state.ledger.register(&processed);

    let forward_chat = match resolve_chat(state.client.as_ref(), &target.forward_to).await {
        Ok(chat) => chat,
        Err(e) => {
            error!("Cannot resolve forward target '{}': {e}", target.forward_to);
            cleanup(state, &[local, processed]).await;
            return;
        }
    };

    if let Err(e) = send_with_optional_media(
        state.client.as_ref(),
        state.transcoder.as_ref(),
        &state.ledger,
        &forward_chat.id,
        &file_name,
        Some(&processed),
    )
    .await
    {
        error!("Failed to forward processed PDF '{file_name}': {e}");
    }

    cleanup(state, &[local, processed]).await;
}

async fn cleanup(state: &AppState, paths: &[PathBuf]) {
    for path in paths {
        remove_temp_file(path).await;
        state.ledger.release(path);
    }
}
