//! Social graph queries: the follow edge set, like edges, and feed assembly.
//!
//! Both directions of the follow relation are answered from the single
//! `follows` table — `is_followed_by` is `is_following` with the arguments
//! swapped, never a second materialized mapping.

use rusqlite::{OptionalExtension, params};

use crate::Database;
use crate::error::{StoreError, map_unique};
use crate::models::{MessageRow, UserRow};
use crate::queries::{message_from_row, user_from_row};

impl Database {
    // -- Follow edges --

    /// Insert a follow edge if absent. Idempotent: following someone twice is
    /// a no-op, not an error. Returns whether an edge was created.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO follows (followed_id, follower_id) VALUES (?1, ?2)",
                params![followed_id, follower_id],
            )?;
            Ok(n > 0)
        })
    }

    /// Remove a follow edge. Removing an absent edge is a no-op returning
    /// false.
    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM follows WHERE followed_id = ?1 AND follower_id = ?2",
                params![followed_id, follower_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2
                 )",
                params![follower_id, followed_id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool, StoreError> {
        self.is_following(other_id, user_id)
    }

    pub fn following_of(&self, user_id: i64) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, u.username, u.password, u.image_url,
                        u.header_image_url, u.bio, u.location, u.created_at
                 FROM users u
                 JOIN follows f ON f.followed_id = u.id
                 WHERE f.follower_id = ?1
                 ORDER BY u.username",
            )?;

            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn followers_of(&self, user_id: i64) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, u.username, u.password, u.image_url,
                        u.header_image_url, u.bio, u.location, u.created_at
                 FROM users u
                 JOIN follows f ON f.follower_id = u.id
                 WHERE f.followed_id = ?1
                 ORDER BY u.username",
            )?;

            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Like edges --

    /// Toggle a like: removes the user's existing like, inserts one
    /// otherwise. Returns true when a like was added. Check and write run in
    /// one transaction. The schema's one-like-per-message constraint can
    /// still reject the insert; that surfaces as `Duplicate("like")`.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    params![user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            let added = match existing {
                Some(like_id) => {
                    tx.execute("DELETE FROM likes WHERE id = ?1", [like_id])?;
                    false
                }
                None => {
                    tx.execute(
                        "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                        params![user_id, message_id],
                    )
                    .map_err(map_unique)?;
                    true
                }
            };

            tx.commit()?;
            Ok(added)
        })
    }

    /// Ids of the messages this user has liked, for heart rendering on feed
    /// pages.
    pub fn liked_message_ids(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1 ORDER BY message_id")?;

            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn messages_liked_by(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM messages m
                 JOIN users u ON u.id = m.user_id
                 JOIN likes l ON l.message_id = m.id
                 WHERE l.user_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![user_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Feed --

    /// Messages authored by the user or by anyone the user follows, newest
    /// first. A single query with an OR over the edge set, so a message is
    /// never returned twice even if the author reaches the viewer through a
    /// self-referential follow edge. Ties on the timestamp order stably by
    /// insertion (id).
    pub fn feed_for(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM messages m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![user_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
