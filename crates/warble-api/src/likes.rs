use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use warble_types::models::Message;

use crate::error::ApiError;
use crate::message_view;
use crate::middleware::AuthUser;
use crate::AppState;

const LIKES_LIMIT: u32 = 100;

/// Toggle the acting user's like on a message. Liking your own warble is
/// rejected by policy before any state changes; the schema's
/// one-like-per-message constraint surfaces as a conflict.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .db
        .message_by_id(message_id)?
        .ok_or(ApiError::NotFound)?;

    if message.user_id == user.id {
        return Err(ApiError::Forbidden("You cannot like your own warble."));
    }

    let liked = state.db.toggle_like(user.id, message_id)?;
    Ok(Json(json!({ "liked": liked })))
}

/// Messages a user has liked, newest first. Viewing likes requires an
/// authenticated viewer even though profiles are public; the asymmetry is
/// deliberate.
pub async fn user_likes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    let rows = state.db.messages_liked_by(user_id, LIKES_LIMIT)?;
    let messages: Vec<Message> = rows.into_iter().map(message_view).collect();
    Ok(Json(messages))
}
