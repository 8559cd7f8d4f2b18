use rusqlite::{Connection, OptionalExtension, params};

use crate::Database;
use crate::error::{StoreError, map_unique};
use crate::models::{DeleteOutcome, MessageRow, ProfileChanges, StatsRow, UserRow};

impl Database {
    // -- Users --

    /// Insert a new user. Uniqueness of username and email is enforced by the
    /// schema at commit time; a violation comes back as
    /// `StoreError::Duplicate` naming the column.
    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        image_url: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            // Placeholder images live as schema defaults; only override when
            // the caller supplied one.
            match image_url {
                Some(url) => conn.execute(
                    "INSERT INTO users (email, username, password, image_url) VALUES (?1, ?2, ?3, ?4)",
                    params![email, username, password_hash, url],
                ),
                None => conn.execute(
                    "INSERT INTO users (email, username, password) VALUES (?1, ?2, ?3)",
                    params![email, username, password_hash],
                ),
            }
            .map_err(map_unique)?;

            Ok(conn.last_insert_rowid())
        })
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "WHERE id = ?1", params![id]))
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "WHERE username = ?1", params![username]))
    }

    /// All users, or those whose username contains `q`. An absent query is an
    /// empty pattern and matches everyone.
    pub fn search_users(&self, q: Option<&str>) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, username, password, image_url, header_image_url,
                        bio, location, created_at
                 FROM users
                 WHERE username LIKE '%' || ?1 || '%'
                 ORDER BY username",
            )?;

            let rows = stmt
                .query_map([q.unwrap_or("")], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn update_profile(&self, user_id: i64, changes: &ProfileChanges) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn
                .execute(
                    "UPDATE users SET
                        username = ?1,
                        email = ?2,
                        image_url = COALESCE(?3, image_url),
                        header_image_url = COALESCE(?4, header_image_url),
                        bio = COALESCE(?5, bio),
                        location = COALESCE(?6, location)
                     WHERE id = ?7",
                    params![
                        changes.username,
                        changes.email,
                        changes.image_url,
                        changes.header_image_url,
                        changes.bio,
                        changes.location,
                        user_id
                    ],
                )
                .map_err(map_unique)?;

            if n == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    /// Remove a user. Messages, follow edges (both directions), likes and
    /// sessions all go with the row via the schema's ON DELETE CASCADE.
    pub fn delete_user(&self, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
            if n == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    pub fn user_stats(&self, user_id: i64) -> Result<StatsRow, StoreError> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows  WHERE follower_id = ?1),
                    (SELECT COUNT(*) FROM follows  WHERE followed_id = ?1),
                    (SELECT COUNT(*) FROM likes    WHERE user_id = ?1)",
                [user_id],
                |row| {
                    Ok(StatsRow {
                        messages: row.get(0)?,
                        following: row.get(1)?,
                        followers: row.get(2)?,
                        likes: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    // -- Messages --

    /// Insert a warble. The creation timestamp is set by the store and never
    /// updated afterwards. Text length is the caller's contract.
    pub fn insert_message(&self, user_id: i64, text: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (user_id, text) VALUES (?1, ?2)",
                params![user_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn message_by_id(&self, id: i64) -> Result<Option<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                     FROM messages m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.id = ?1",
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn messages_by_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM messages m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![user_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Delete a message, but only when `user_id` owns it. The existence check
    /// and the delete run in one transaction so the outcome is consistent.
    pub fn delete_message_if_owner(
        &self,
        message_id: i64,
        user_id: i64,
    ) -> Result<DeleteOutcome, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owner: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM messages WHERE id = ?1",
                    [message_id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match owner {
                None => DeleteOutcome::Missing,
                Some(owner) if owner != user_id => DeleteOutcome::NotOwner,
                Some(_) => {
                    tx.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
                    DeleteOutcome::Deleted
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, token: &str, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id) VALUES (?1, ?2)",
                params![token, user_id],
            )?;
            Ok(())
        })
    }

    /// Resolve a session token to its user. An unknown or stale token is
    /// simply Anonymous, never an error.
    pub fn session_user(&self, token: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.email, u.username, u.password, u.image_url,
                            u.header_image_url, u.bio, u.location, u.created_at
                     FROM sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1",
                    [token],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Idempotent: deleting an absent token is a no-op.
    pub fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })
    }
}

fn query_user(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Option<UserRow>, StoreError> {
    let sql = format!(
        "SELECT id, email, username, password, image_url, header_image_url,
                bio, location, created_at
         FROM users {filter}"
    );

    let row = conn.query_row(&sql, params, user_from_row).optional()?;
    Ok(row)
}

pub(crate) fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}
