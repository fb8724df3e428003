use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Client not ready")]
    NotReady,

    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Media conversion failed: {0}")]
    Conversion(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Short machine-readable code carried alongside every user-visible failure.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotReady => "not_ready",
            BridgeError::NotFound(_) => "not_found",
            BridgeError::PermissionDenied(_) => "permission_denied",
            BridgeError::Validation(_) => "invalid_request",
            BridgeError::UnsupportedMedia(_) => "unsupported_media",
            BridgeError::Conversion(_) => "conversion_failed",
            BridgeError::Dispatch(_) => "dispatch_failed",
            BridgeError::Gateway(_)
            | BridgeError::Http(_)
            | BridgeError::Json(_)
            | BridgeError::Io(_)
            | BridgeError::Config(_) => "internal",
        }
    }
}
