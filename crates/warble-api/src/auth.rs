use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use warble_db::Database;
use warble_db::models::UserRow;
use warble_types::api::{LoginRequest, SessionResponse, SignupRequest};

use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::{AppState, credential, user_view};

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Invalid e-mail address".into()));
    }
    if req.password.chars().count() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let password_hash = credential::hash_password(&req.password)?;

    // No pre-check on username/email: the schema's uniqueness constraints
    // arbitrate racing signups and the violation surfaces as a conflict.
    let user_id = state.db.create_user(
        &req.email,
        &req.username,
        &password_hash,
        req.image_url.as_deref(),
    )?;

    let user = state.db.user_by_id(user_id)?.ok_or(ApiError::NotFound)?;
    let token = start_session(&state.db, user_id)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: user_view(user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state.db, &req.username, &req.password)?
        .ok_or(ApiError::BadCredentials)?;

    let token = start_session(&state.db, user.id)?;

    Ok(Json(SessionResponse {
        token,
        user: user_view(user),
    }))
}

/// End the session carried by the request, if any. Idempotent: logging out
/// while Anonymous (or with a token that is already gone) is a no-op.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        state.db.delete_session(token)?;
    }

    Ok(Json(json!({ "message": "You have been logged out." })))
}

/// Exact-username lookup plus password verification. An unknown username and
/// a wrong password are indistinguishable to the caller: both are `None`,
/// never an error.
pub(crate) fn authenticate(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<Option<UserRow>, ApiError> {
    let Some(user) = db.user_by_username(username)? else {
        return Ok(None);
    };

    if credential::verify_password(&user.password, password) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

fn start_session(db: &Database, user_id: i64) -> Result<String, ApiError> {
    let token = Uuid::new_v4().to_string();
    db.create_session(&token, user_id)?;
    Ok(token)
}
