use crate::client::{Chat, ChatClient};
use crate::error::BridgeError;

/// Find a chat by serialized identifier, phone digits, or display-name
/// substring, in that order of precedence. First match in list order wins;
/// the list order is whatever the gateway returned.
pub fn find_chat<'a>(chats: &'a [Chat], query: &str) -> Option<&'a Chat> {
    let q = query.trim();
    if q.is_empty() {
        return None;
    }

    if let Some(chat) = chats.iter().find(|c| c.id == q) {
        return Some(chat);
    }

    let digits: String = q.chars().filter(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        if let Some(chat) = chats
            .iter()
            .find(|c| !c.is_group && c.user_part() == digits)
        {
            return Some(chat);
        }
    }

    let q_lower = q.to_lowercase();
    chats
        .iter()
        .find(|c| c.name.to_lowercase().contains(&q_lower))
}

/// Resolve a query against the live chat list, fetched fresh on every call.
pub async fn resolve_chat(client: &dyn ChatClient, query: &str) -> Result<Chat, BridgeError> {
    let chats = client.get_chats().await?;
    find_chat(&chats, query)
        .cloned()
        .ok_or_else(|| BridgeError::NotFound(query.trim().to_string()))
}
