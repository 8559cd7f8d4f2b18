use serde::{Deserialize, Serialize};

use crate::models::{Message, User, UserStats};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both signup and login: the freshly started session token plus
/// the acting user.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    /// Current password; profile edits are refused without it.
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub user: User,
    pub stats: UserStats,
    pub messages: Vec<Message>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessageRequest {
    pub text: String,
}

/// The authenticated home feed: own + followed users' messages, newest
/// first, plus the ids of messages the viewer has liked.
#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub messages: Vec<Message>,
    pub likes: Vec<i64>,
}
