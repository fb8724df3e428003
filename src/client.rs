use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// An addressable conversation (direct or group) as reported by the gateway.
///
/// The serialized identifier is opaque and stable per conversation; direct
/// chats carry a numeric user portion before the `@` separator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "isGroup")]
    pub is_group: bool,
}

impl Chat {
    /// Numeric user portion of the identifier, e.g. `15551234567` in
    /// `15551234567@c.us`. Only meaningful for direct chats.
    pub fn user_part(&self) -> &str {
        self.id.split('@').next().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(default, rename = "isSuperAdmin")]
    pub is_super_admin: bool,
}

impl Participant {
    pub fn has_admin_rights(&self) -> bool {
        self.is_admin || self.is_super_admin
    }
}

/// A validated, send-ready media file.
#[derive(Debug, Clone)]
pub struct OutgoingMedia {
    pub path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub caption: Option<String>,
    pub as_document: bool,
}

/// Incoming message pushed by the gateway; only the fields the watcher
/// consumes are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub media: Option<IncomingMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMedia {
    #[serde(rename = "mediaId")]
    pub media_id: String,
    #[serde(default, rename = "fileName")]
    pub file_name: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
}

/// Narrow interface over the external chat-session gateway. The gateway owns
/// the wire protocol and auth session; everything here is a thin RPC.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    async fn get_chats(&self) -> Result<Vec<Chat>, BridgeError>;

    async fn get_participants(&self, group_id: &str) -> Result<Vec<Participant>, BridgeError>;

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), BridgeError>;

    async fn send_media(
        &self,
        chat_id: &str,
        media: &OutgoingMedia,
        opts: &SendOptions,
    ) -> Result<(), BridgeError>;

    async fn remove_participants(
        &self,
        group_id: &str,
        participant_ids: &[String],
    ) -> Result<(), BridgeError>;

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>, BridgeError>;
}

/// One-way readiness latch. The gateway's `ready` event fires it exactly
/// once, recording the client's own identifier; it never resets.
#[derive(Clone, Default)]
pub struct Readiness {
    inner: Arc<OnceLock<String>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the latch had already fired.
    pub fn mark_ready(&self, self_id: String) -> bool {
        self.inner.set(self_id).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    /// The client's own chat identifier, available once ready.
    pub fn self_id(&self) -> Option<&str> {
        self.inner.get().map(String::as_str)
    }
}
