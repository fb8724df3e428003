use std::path::Path;

use tracing::warn;

use crate::client::{ChatClient, OutgoingMedia, SendOptions};
use crate::error::BridgeError;
use crate::media::{sanitize_media, Transcoder};
use crate::tempfiles::TempFileLedger;

fn is_document_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Send a message with optional media. A present, sanitizable file goes out
/// as a captioned media message; anything else degrades to a text-only send
/// so the caption is never dropped. Temp files produced by sanitization are
/// reclaimed on every exit path, success or failure.
pub async fn send_with_optional_media(
    client: &dyn ChatClient,
    transcoder: &dyn Transcoder,
    ledger: &TempFileLedger,
    chat_id: &str,
    text: &str,
    file_path: Option<&Path>,
) -> Result<(), BridgeError> {
    if let Some(path) = file_path {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            match sanitize_media(transcoder, ledger, path).await {
                Ok(artifact) => {
                    let media = OutgoingMedia {
                        path: artifact.path.clone(),
                        mime_type: artifact.mime_type.clone(),
                    };
                    let opts = SendOptions {
                        caption: Some(text.to_string()),
                        as_document: is_document_path(path),
                    };
                    let result = client.send_media(chat_id, &media, &opts).await;
                    artifact.cleanup(ledger).await;
                    return result;
                }
                Err(e) => {
                    warn!(
                        "Media rejected for {}, falling back to text: {e}",
                        path.display()
                    );
                }
            }
        }
    }

    client.send_text(chat_id, text).await
}
