use tracing::error;

use crate::client::{Chat, ChatClient, Participant};
use crate::error::BridgeError;
use crate::resolver::resolve_chat;

async fn resolve_group(client: &dyn ChatClient, query: &str) -> Result<Chat, BridgeError> {
    let chat = resolve_chat(client, query).await?;
    if !chat.is_group {
        return Err(BridgeError::NotFound(format!("{query} is not a group")));
    }
    Ok(chat)
}

/// List a group's members from the live membership snapshot.
pub async fn list_participants(
    client: &dyn ChatClient,
    group_query: &str,
) -> Result<Vec<Participant>, BridgeError> {
    let group = resolve_group(client, group_query).await?;
    client.get_participants(&group.id).await
}

async fn require_admin(
    client: &dyn ChatClient,
    group: &Chat,
    self_id: &str,
) -> Result<Vec<Participant>, BridgeError> {
    let participants = client.get_participants(&group.id).await?;
    let me = participants.iter().find(|p| p.id == self_id);
    match me {
        Some(p) if p.has_admin_rights() => Ok(participants),
        _ => Err(BridgeError::PermissionDenied(
            "you are not an admin in this group".into(),
        )),
    }
}

/// Remove a single participant; the caller must hold admin rights.
pub async fn remove_participant(
    client: &dyn ChatClient,
    self_id: &str,
    group_query: &str,
    participant_id: &str,
) -> Result<(), BridgeError> {
    let group = resolve_group(client, group_query).await?;
    require_admin(client, &group, self_id).await?;

    client
        .remove_participants(&group.id, &[participant_id.to_string()])
        .await
        .map_err(|e| {
            error!("Failed to remove participant {participant_id} from {}: {e}", group.id);
            BridgeError::Dispatch("failed to remove participant".into())
        })
}

/// Remove every participant except the caller. Returns the removed ids.
pub async fn remove_all_participants(
    client: &dyn ChatClient,
    self_id: &str,
    group_query: &str,
) -> Result<Vec<String>, BridgeError> {
    let group = resolve_group(client, group_query).await?;
    let participants = require_admin(client, &group, self_id).await?;

    let targets: Vec<String> = participants
        .iter()
        .filter(|p| p.id != self_id)
        .map(|p| p.id.clone())
        .collect();
    if targets.is_empty() {
        return Ok(targets);
    }

    client
        .remove_participants(&group.id, &targets)
        .await
        .map_err(|e| {
            error!("Failed to remove participants from {}: {e}", group.id);
            BridgeError::Dispatch("failed to remove participants".into())
        })?;
    Ok(targets)
}
