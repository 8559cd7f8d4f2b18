//! Database row types — these map directly to SQLite rows.
//! Distinct from the warble-types API models to keep the DB layer
//! independent; timestamps stay as the TEXT SQLite hands back and are parsed
//! at the API boundary.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

/// Profile fields a user may edit. `None` on an optional field keeps the
/// stored value.
pub struct ProfileChanges {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

pub struct StatsRow {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}

/// Result of an owner-scoped message delete. The caller decides what
/// `NotOwner` means; the store only reports it.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotOwner,
    Missing,
}
