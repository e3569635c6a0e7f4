use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::models::RefreshTokenRow;

pub fn insert_refresh_token(
    conn: &Connection,
    id: &str,
    user_id: &str,
    token_hash: &str,
    expires_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, user_id, token_hash, expires_at],
    )?;
    Ok(())
}

pub fn query_refresh_token(conn: &Connection, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at
             FROM refresh_tokens WHERE token_hash = ?1",
            [token_hash],
            |row| {
                Ok(RefreshTokenRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    token_hash: row.get(2)?,
                    expires_at: row.get(3)?,
                    revoked: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

/// Returns `false` when the token is unknown or already revoked.
pub fn revoke_refresh_token(conn: &Connection, token_hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE refresh_tokens SET revoked = 1 WHERE token_hash = ?1 AND revoked = 0",
        [token_hash],
    )?;
    Ok(changed == 1)
}

pub fn count_active_sessions(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?1 AND revoked = 0",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
