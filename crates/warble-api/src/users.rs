use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use warble_db::models::ProfileChanges;
use warble_types::api::{UpdateProfileRequest, UserPage};
use warble_types::models::User;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, stats_view, user_view};

/// Messages shown on a profile page, and entries in follower/following
/// lists, are capped like the feed.
const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.search_users(query.q.as_deref())?;
    let users: Vec<User> = rows.into_iter().map(user_view).collect();
    Ok(Json(users))
}

/// Public profile: the user, their counts, and their last 100 messages.
pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    // Three queries; run them off the async runtime.
    let db = state.clone();
    let (user, stats, rows) = tokio::task::spawn_blocking(move || {
        let Some(user) = db.db.user_by_id(user_id)? else {
            return Err(ApiError::NotFound);
        };
        let stats = db.db.user_stats(user_id)?;
        let rows = db.db.messages_by_user(user_id, PAGE_LIMIT)?;
        Ok((user, stats, rows))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {e}")))??;

    Ok(Json(UserPage {
        user: user_view(user),
        stats: stats_view(stats),
        messages: rows.into_iter().map(crate::message_view).collect(),
    }))
}

pub async fn show_following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    let rows = state.db.following_of(user_id)?;
    let users: Vec<User> = rows.into_iter().map(user_view).collect();
    Ok(Json(users))
}

pub async fn show_followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    let rows = state.db.followers_of(user_id)?;
    let users: Vec<User> = rows.into_iter().map(user_view).collect();
    Ok(Json(users))
}

pub async fn add_follow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(follow_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.user_by_id(follow_id)?.is_none() {
        return Err(ApiError::NotFound);
    }
    if follow_id == user.id {
        return Err(ApiError::Validation("You cannot follow yourself.".into()));
    }

    // Idempotent: re-following is a no-op, not an error.
    let created = state.db.follow(user.id, follow_id)?;
    Ok(Json(json!({ "following": true, "created": created })))
}

pub async fn stop_following(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(follow_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.user_by_id(follow_id)?.is_none() {
        return Err(ApiError::NotFound);
    }

    // Removing an absent edge is a no-op.
    let removed = state.db.unfollow(user.id, follow_id)?;
    Ok(Json(json!({ "following": false, "removed": removed })))
}

/// Update the acting user's own profile. The current password must verify
/// first; edits are refused otherwise.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if authenticate(&state.db, &user.username, &req.password)?.is_none() {
        return Err(ApiError::BadCredentials);
    }

    if req.username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Invalid e-mail address".into()));
    }

    state.db.update_profile(
        user.id,
        &ProfileChanges {
            username: req.username,
            email: req.email,
            image_url: req.image_url,
            header_image_url: req.header_image_url,
            bio: req.bio,
            location: req.location,
        },
    )?;

    let updated = state.db.user_by_id(user.id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(user_view(updated)))
}

/// Delete the acting user's own account. The schema cascades take the
/// user's messages, follow edges, likes and sessions with it, so this also
/// logs the user out everywhere.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.delete_user(user.id)?;
    Ok(Json(json!({ "deleted": true })))
}
