use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use warble_db::models::DeleteOutcome;
use warble_types::api::{FeedPage, NewMessageRequest};

use crate::error::ApiError;
use crate::message_view;
use crate::middleware::{AuthUser, CurrentUser};
use crate::AppState;

/// Feed depth: own + followed users' messages, newest first.
const FEED_LIMIT: u32 = 100;

/// Homepage: the feed for an authenticated viewer, a bare landing payload
/// for everyone else.
pub async fn home(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let Some(user) = current.0 else {
        return Ok(Json(json!({ "landing": true })).into_response());
    };

    let db = state.clone();
    let user_id = user.id;
    let (rows, likes) = tokio::task::spawn_blocking(move || {
        let rows = db.db.feed_for(user_id, FEED_LIMIT)?;
        let likes = db.db.liked_message_ids(user_id)?;
        Ok::<_, ApiError>((rows, likes))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {e}")))??;

    let page = FeedPage {
        messages: rows.into_iter().map(message_view).collect(),
        likes,
    };

    Ok(Json(page).into_response())
}

pub async fn new_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1–140 characters, counted as characters rather than bytes.
    let length = req.text.chars().count();
    if length == 0 {
        return Err(ApiError::Validation("Message text is required".into()));
    }
    if length > 140 {
        return Err(ApiError::Validation(
            "Message text must be at most 140 characters".into(),
        ));
    }

    let message_id = state.db.insert_message(user.id, &req.text)?;
    let row = state
        .db
        .message_by_id(message_id)?
        .ok_or(ApiError::NotFound)?;

    Ok((StatusCode::CREATED, Json(message_view(row))))
}

pub async fn show_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .message_by_id(message_id)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(message_view(row)))
}

/// Only the message's owner may delete it.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.delete_message_if_owner(message_id, user.id)? {
        DeleteOutcome::Deleted => Ok(Json(json!({ "deleted": true }))),
        DeleteOutcome::NotOwner => Err(ApiError::Unauthorized),
        DeleteOutcome::Missing => Err(ApiError::NotFound),
    }
}
