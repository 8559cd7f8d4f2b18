use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::ApiError;

/// The acting identity, resolved once per request and threaded to handlers
/// as an explicit extension — never looked up ambiently.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// Present on every request after `resolve_identity` runs; `None` means
/// Anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<AuthUser>);

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the session token (if any) to a user, once, for every route.
/// A missing, unknown or stale token is simply Anonymous.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = match bearer_token(req.headers()) {
        Some(token) => state
            .db
            .session_user(token)?
            .map(|user| AuthUser {
                id: user.id,
                username: user.username,
            }),
        None => None,
    };

    req.extensions_mut().insert(CurrentUser(current));
    Ok(next.run(req).await)
}

/// The single guard in front of every privileged route: Anonymous requests
/// are refused with the uniform unauthorized outcome before any handler code
/// runs.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .and_then(|current| current.0.clone())
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
