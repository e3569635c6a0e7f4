use anyhow::Result;
use rusqlite::Connection;

use crate::models::CodeRow;

pub fn insert_code(
    conn: &Connection,
    id: &str,
    user_id: &str,
    code: &str,
    expires_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO confirmation_codes (id, user_id, code, expires_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, user_id, code, expires_at],
    )?;
    Ok(())
}

/// All codes with this value owned by the identity registered under `email`,
/// newest first.
pub fn query_codes_for_redemption(
    conn: &Connection,
    code: &str,
    email: &str,
) -> Result<Vec<CodeRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.user_id, c.code, c.expires_at, c.used, c.created_at
         FROM confirmation_codes c
         JOIN users u ON c.user_id = u.id
         WHERE c.code = ?1 AND u.email = ?2
         ORDER BY c.created_at DESC, c.rowid DESC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![code, email], |row| {
            Ok(CodeRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                code: row.get(2)?,
                expires_at: row.get(3)?,
                used: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Conditional single-statement consume. Returns `true` only for the caller
/// that flipped `used` from 0 to 1.
pub fn mark_code_used(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE confirmation_codes SET used = 1 WHERE id = ?1 AND used = 0",
        [id],
    )?;
    Ok(changed == 1)
}

pub fn count_codes_for_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM confirmation_codes WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::users::insert_user;

    #[test]
    fn mark_used_succeeds_once() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert_user(conn, "u1", "a@x.com", "A", "hash", true)?;
            insert_code(conn, "c1", "u1", "123456", i64::MAX)
        })
        .unwrap();

        assert!(db.with_conn(|conn| mark_code_used(conn, "c1")).unwrap());
        assert!(!db.with_conn(|conn| mark_code_used(conn, "c1")).unwrap());
    }

    #[test]
    fn lookup_is_scoped_to_the_owning_email() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert_user(conn, "u1", "a@x.com", "A", "hash", true)?;
            insert_user(conn, "u2", "b@x.com", "B", "hash", true)?;
            insert_code(conn, "c1", "u1", "123456", i64::MAX)
        })
        .unwrap();

        let mine = db
            .with_conn(|conn| query_codes_for_redemption(conn, "123456", "a@x.com"))
            .unwrap();
        let theirs = db
            .with_conn(|conn| query_codes_for_redemption(conn, "123456", "b@x.com"))
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert!(theirs.is_empty());
    }
}
