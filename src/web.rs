use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::BridgeError;
use crate::gateway::GatewayEvent;
use crate::groups;
use crate::messaging::send_with_optional_media;
use crate::resolver;
use crate::runtime::AppState;
use crate::watcher::WatchTarget;

type ApiError = (StatusCode, Json<Value>);

fn error_body(code: &str, message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": message.into(), "code": code }))
}

fn map_error(e: BridgeError) -> ApiError {
    let status = match &e {
        BridgeError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        BridgeError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        BridgeError::Conversion(_)
        | BridgeError::Dispatch(_)
        | BridgeError::Gateway(_)
        | BridgeError::Http(_)
        | BridgeError::Json(_)
        | BridgeError::Io(_)
        | BridgeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_body(e.code(), e.to_string()))
}

/// A group lookup miss on the removal routes is indistinguishable from a
/// permission failure to the caller.
fn map_removal_error(e: BridgeError) -> ApiError {
    match &e {
        BridgeError::NotFound(_) => (StatusCode::FORBIDDEN, error_body(e.code(), e.to_string())),
        _ => map_error(e),
    }
}

fn require_ready(state: &AppState) -> Result<(), ApiError> {
    if state.readiness.is_ready() {
        Ok(())
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("not_ready", "Client not ready"),
        ))
    }
}

fn self_id(state: &AppState) -> Result<String, ApiError> {
    state.readiness.self_id().map(str::to_string).ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        error_body("not_ready", "Client not ready"),
    ))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": "ok", "ready": state.readiness.is_ready() }))
}

async fn list_groups(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let chats = state.client.get_chats().await.map_err(map_error)?;
    let groups: Vec<Value> = chats
        .iter()
        .filter(|c| c.is_group)
        .map(|g| json!({ "name": g.name, "id": g.id }))
        .collect();
    Ok(Json(Value::Array(groups)))
}

async fn list_contacts(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let chats = state.client.get_chats().await.map_err(map_error)?;
    let contacts: Vec<Value> = chats
        .iter()
        .filter(|c| !c.is_group)
        .map(|c| json!({ "name": c.name, "id": c.id, "phone": c.user_part() }))
        .collect();
    Ok(Json(Value::Array(contacts)))
}

#[derive(Debug, Deserialize)]
struct FindChatQuery {
    #[serde(default)]
    q: String,
}

async fn find_chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FindChatQuery>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let chats = state.client.get_chats().await.map_err(map_error)?;
    let Some(chat) = resolver::find_chat(&chats, &params.q) else {
        return Err((
            StatusCode::NOT_FOUND,
            error_body("not_found", format!("Chat not found for: {}", params.q)),
        ));
    };
    Ok(Json(json!({
        "id": chat.id,
        "name": chat.name,
        "isGroup": chat.is_group,
    })))
}

#[derive(Debug, Deserialize)]
struct SendChatRequest {
    target: Option<String>,
    message: Option<String>,
    file: Option<String>,
}

async fn send_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendChatRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let (Some(target), Some(message)) = (
        req.target.filter(|t| !t.trim().is_empty()),
        req.message.filter(|m| !m.is_empty()),
    ) else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("invalid_request", "Provide 'target' and 'message'."),
        ));
    };

    let chat = resolver::resolve_chat(state.client.as_ref(), &target)
        .await
        .map_err(|e| match e {
            BridgeError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                error_body("not_found", format!("Chat not found: {target}")),
            ),
            other => map_error(other),
        })?;

    let file_path = req.file.as_deref().map(std::path::Path::new);
    if let Err(e) = send_with_optional_media(
        state.client.as_ref(),
        state.transcoder.as_ref(),
        &state.ledger,
        &chat.id,
        &message,
        file_path,
    )
    .await
    {
        error!("Error sending message to {target}: {e}");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("dispatch_failed", "Failed to send message."),
        ));
    }
    Ok(Json(json!({ "status": "Message sent." })))
}

#[derive(Debug, Deserialize)]
struct GroupParticipantsQuery {
    #[serde(default)]
    group: String,
}

async fn group_participants(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GroupParticipantsQuery>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    if params.group.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("invalid_request", "Provide 'group'."),
        ));
    }
    let participants = groups::list_participants(state.client.as_ref(), &params.group)
        .await
        .map_err(map_error)?;
    let listed: Vec<Value> = participants
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "name": p.name,
                "isAdmin": p.has_admin_rights(),
            })
        })
        .collect();
    Ok(Json(Value::Array(listed)))
}

#[derive(Debug, Deserialize)]
struct RemoveParticipantRequest {
    group: Option<String>,
    participant: Option<String>,
}

async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoveParticipantRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let (Some(group), Some(participant)) = (
        req.group.filter(|g| !g.trim().is_empty()),
        req.participant.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("invalid_request", "Provide 'group' and 'participant'."),
        ));
    };
    let me = self_id(&state)?;
    groups::remove_participant(state.client.as_ref(), &me, &group, &participant)
        .await
        .map_err(map_removal_error)?;
    Ok(Json(json!({ "status": "Participant removed." })))
}

#[derive(Debug, Deserialize)]
struct RemoveAllRequest {
    group: Option<String>,
}

async fn remove_all_participants(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoveAllRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let Some(group) = req.group.filter(|g| !g.trim().is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("invalid_request", "Provide 'group'."),
        ));
    };
    let me = self_id(&state)?;
    let removed = groups::remove_all_participants(state.client.as_ref(), &me, &group)
        .await
        .map_err(map_removal_error)?;
    Ok(Json(json!({
        "status": "Participants removed.",
        "removed": removed,
    })))
}

#[derive(Debug, Deserialize)]
struct WatchPdfRequest {
    group: Option<String>,
    #[serde(rename = "forwardTo")]
    forward_to: Option<String>,
}

async fn watch_pdf(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WatchPdfRequest>,
) -> Result<Json<Value>, ApiError> {
    require_ready(&state)?;
    let (Some(group), Some(forward_to)) = (
        req.group.filter(|g| !g.trim().is_empty()),
        req.forward_to.filter(|f| !f.trim().is_empty()),
    ) else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("invalid_request", "Provide 'group' and 'forwardTo'."),
        ));
    };

    let chat = resolver::resolve_chat(state.client.as_ref(), &group)
        .await
        .map_err(map_error)?;
    if !chat.is_group {
        return Err((
            StatusCode::NOT_FOUND,
            error_body("not_found", format!("Group not found: {group}")),
        ));
    }

    state
        .watcher
        .configure(WatchTarget {
            group_id: chat.id,
            forward_to,
        })
        .await;
    Ok(Json(json!({ "status": "Watcher configured." })))
}

async fn gateway_events(
    State(state): State<Arc<AppState>>,
    Json(event): Json<GatewayEvent>,
) -> Json<Value> {
    match event {
        GatewayEvent::Ready { self_id } => {
            if state.readiness.mark_ready(self_id.clone()) {
                info!("Chat client ready as {self_id}");
            }
        }
        GatewayEvent::Message(msg) => {
            // Acknowledge immediately; the watcher does its own logging.
            let state = state.clone();
            tokio::spawn(async move {
                crate::watcher::handle_incoming_message(&state, msg).await;
            });
        }
    }
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/groups", get(list_groups))
        .route("/contacts", get(list_contacts))
        .route("/find_chat", get(find_chat))
        .route("/send_chat", post(send_chat))
        .route("/group_participants", get(group_participants))
        .route("/remove_participant", post(remove_participant))
        .route("/remove_all_participants", post(remove_all_participants))
        .route("/watch_pdf", post(watch_pdf))
        .route("/gateway/events", post(gateway_events))
        .with_state(state)
}

pub async fn start_web_server(state: Arc<AppState>) {
    let addr = format!("{}:{}", state.config.http_host, state.config.http_port);
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind bridge server on {addr}: {e}");
            return;
        }
    };
    info!("Bridge server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Bridge server error: {e}");
    }
}
