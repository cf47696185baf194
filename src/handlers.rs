use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::conversations::SessionSnapshot;
use crate::error::ShoppingError;
use crate::state::AppState;
use crate::vision::upload_message;

/// Maps service errors onto HTTP responses
pub struct ApiError(ShoppingError);

impl From<ShoppingError> for ApiError {
    fn from(err: ShoppingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ShoppingError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ShoppingError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ShoppingError::RunTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            ShoppingError::Config(_) | ShoppingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Feed the synthetic message straight into the conversation
    #[serde(default)]
    pub send: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len()
    }))
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let session = state
        .sessions
        .create(state.conversation.gateway().as_ref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session.session_id })),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.sessions.get(&session_id)?;
    Ok(Json(session.snapshot().await))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.remove(&session_id)?;
    if let Err(e) = state
        .conversation
        .gateway()
        .delete_thread(&session.thread_id)
        .await
    {
        warn!("Failed to delete thread {}: {}", session.thread_id, e);
    }
    info!("Closed session {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&session_id)?;
    let reply = state
        .conversation
        .process_query(&session, &request.message)
        .await?;
    Ok(Json(json!({ "reply": reply })))
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get(&session_id)?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ShoppingError::InvalidImage(e.to_string()))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ShoppingError::InvalidImage(e.to_string()))?;
            image = Some(data);
            break;
        }
    }
    let image = image.ok_or_else(|| ShoppingError::InvalidImage("No image file provided".to_string()))?;

    let description = state.vision.describe(&image).await?;
    let message = upload_message(&description);
    info!("Described uploaded image for session {}", session_id);

    if !params.send {
        return Ok(Json(json!({ "message": message })));
    }

    let reply = state.conversation.process_query(&session, &message).await?;
    Ok(Json(json!({ "message": message, "reply": reply })))
}
