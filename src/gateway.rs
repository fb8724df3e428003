use serde::{Deserialize, Serialize};

use crate::client::{Chat, ChatClient, OutgoingMedia, Participant, SendOptions};
use crate::config::Config;
use crate::error::BridgeError;

/// `ChatClient` over the local chat-session gateway: the external process
/// that owns the real wire protocol, session and auth state. Everything here
/// is a narrow JSON RPC; the gateway shares the filesystem with the bridge,
/// so media is passed by path.
pub struct GatewayClient {
    base_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMediaRequest<'a> {
    chat_id: &'a str,
    path: &'a str,
    mime_type: &'a str,
    caption: Option<&'a str>,
    as_document: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveParticipantsRequest<'a> {
    participant_ids: &'a [String],
}

impl GatewayClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.gateway_url.clone(),
            token: config.gateway_token.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.http_client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, String> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{what} failed with {status}: {body}"));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatClient for GatewayClient {
    async fn get_chats(&self) -> Result<Vec<Chat>, BridgeError> {
        let response = self
            .request(reqwest::Method::GET, "/chats")
            .send()
            .await
            .map_err(|e| BridgeError::Gateway(format!("chat listing failed: {e}")))?;
        let response = Self::check(response, "chat listing")
            .await
            .map_err(BridgeError::Gateway)?;
        Ok(response.json::<Vec<Chat>>().await?)
    }

    async fn get_participants(&self, group_id: &str) -> Result<Vec<Participant>, BridgeError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/groups/{group_id}/participants"),
            )
            .send()
            .await
            .map_err(|e| BridgeError::Gateway(format!("participant listing failed: {e}")))?;
        let response = Self::check(response, "participant listing")
            .await
            .map_err(BridgeError::Gateway)?;
        Ok(response.json::<Vec<Participant>>().await?)
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), BridgeError> {
        let response = self
            .request(reqwest::Method::POST, "/send")
            .json(&SendTextRequest { chat_id, text })
            .send()
            .await
            .map_err(|e| BridgeError::Dispatch(format!("text send failed: {e}")))?;
        Self::check(response, "text send")
            .await
            .map_err(BridgeError::Dispatch)?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: &OutgoingMedia,
        opts: &SendOptions,
    ) -> Result<(), BridgeError> {
        let response = self
            .request(reqwest::Method::POST, "/send_media")
            .json(&SendMediaRequest {
                chat_id,
                path: &media.path.to_string_lossy(),
                mime_type: &media.mime_type,
                caption: opts.caption.as_deref(),
                as_document: opts.as_document,
            })
            .send()
            .await
            .map_err(|e| BridgeError::Dispatch(format!("media send failed: {e}")))?;
        Self::check(response, "media send")
            .await
            .map_err(BridgeError::Dispatch)?;
        Ok(())
    }

    async fn remove_participants(
        &self,
        group_id: &str,
        participant_ids: &[String],
    ) -> Result<(), BridgeError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/groups/{group_id}/remove"),
            )
            .json(&RemoveParticipantsRequest { participant_ids })
            .send()
            .await
            .map_err(|e| BridgeError::Dispatch(format!("participant removal failed: {e}")))?;
        Self::check(response, "participant removal")
            .await
            .map_err(BridgeError::Dispatch)?;
        Ok(())
    }

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>, BridgeError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/media/{media_id}"))
            .send()
            .await
            .map_err(|e| BridgeError::Gateway(format!("media download failed: {e}")))?;
        let response = Self::check(response, "media download")
            .await
            .map_err(BridgeError::Gateway)?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Event pushed by the gateway to `POST /gateway/events`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    Ready {
        #[serde(rename = "selfId")]
        self_id: String,
    },
    Message(crate::client::IncomingMessage),
}
