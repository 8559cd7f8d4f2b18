pub mod auth;
pub mod credential;
pub mod error;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use warble_db::Database;
use warble_db::models::{MessageRow, StatsRow, UserRow};
use warble_types::models::{Message, User, UserStats};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

/// Build the full route table. Privileged routes sit behind one
/// `require_auth` layer; identity is resolved once for every request by the
/// outer `resolve_identity` layer and handed to handlers as an extension.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(messages::home))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::show_user))
        .route("/messages/{message_id}", get(messages::show_message))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/users/{user_id}/likes", get(likes::user_likes))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/follow/{user_id}", post(users::add_follow))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/users/profile", post(users::update_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/messages/new", post(messages::new_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/users/add_like/{message_id}", post(likes::toggle_like))
        .layer(axum_middleware::from_fn(middleware::require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::resolve_identity,
        ))
}

pub(crate) fn user_view(row: UserRow) -> User {
    let created_at = parse_created_at(&row.created_at, "user", row.id);
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        image_url: row.image_url,
        header_image_url: row.header_image_url,
        bio: row.bio,
        location: row.location,
        created_at,
    }
}

pub(crate) fn message_view(row: MessageRow) -> Message {
    let created_at = parse_created_at(&row.created_at, "message", row.id);
    Message {
        id: row.id,
        user_id: row.user_id,
        username: row.author_username,
        text: row.text,
        created_at,
    }
}

pub(crate) fn stats_view(row: StatsRow) -> UserStats {
    UserStats {
        messages: row.messages,
        following: row.following,
        followers: row.followers,
        likes: row.likes,
    }
}

fn parse_created_at(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} '{}': {}", raw, what, id, e);
            DateTime::default()
        })
}
