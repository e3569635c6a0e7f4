use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{IdentityEventRow, UserRow};

const USER_COLUMNS: &str = "id, email, name, password, password_set, active, role, created_at";

impl Database {
    // -- Users --

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_identity_events(&self, user_id: &str) -> Result<Vec<IdentityEventRow>> {
        self.with_conn(|conn| query_identity_events(conn, user_id))
    }
}

pub fn insert_user(
    conn: &Connection,
    id: &str,
    email: &str,
    name: &str,
    password_hash: &str,
    password_set: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, password, password_set) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, email, name, password_hash, password_set],
    )?;
    Ok(())
}

pub fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
    let row = stmt.query_row([email], map_user).optional()?;
    Ok(row)
}

pub fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_user).optional()?;
    Ok(row)
}

/// Persist the flags that encode an identity's lifecycle state.
pub fn update_user_state(conn: &Connection, id: &str, active: bool, role: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET active = ?2, role = ?3 WHERE id = ?1",
        rusqlite::params![id, active, role],
    )?;
    Ok(())
}

pub fn update_password(conn: &Connection, id: &str, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password = ?2, password_set = 1 WHERE id = ?1",
        rusqlite::params![id, password_hash],
    )?;
    Ok(())
}

/// Fails with a constraint violation while sellers, chats or messages
/// still reference the user.
pub fn delete_user(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(deleted == 1)
}

// -- Audit events --

pub fn insert_identity_event(
    conn: &Connection,
    user_id: &str,
    event: &str,
    from_state: Option<&str>,
    to_state: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO identity_events (user_id, event, from_state, to_state) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, event, from_state, to_state],
    )?;
    Ok(())
}

pub fn query_identity_events(conn: &Connection, user_id: &str) -> Result<Vec<IdentityEventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, event, from_state, to_state, created_at
         FROM identity_events
         WHERE user_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(IdentityEventRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                event: row.get(2)?,
                from_state: row.get(3)?,
                to_state: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password: row.get(3)?,
        password_set: row.get(4)?,
        active: row.get(5)?,
        role: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert_user(conn, "u1", "a@x.com", "A", "hash", true))
            .unwrap();

        let err = db
            .with_conn(|conn| insert_user(conn, "u2", "a@x.com", "B", "hash", true))
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn new_users_start_inactive_with_normal_role() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert_user(conn, "u1", "a@x.com", "A", "hash", false))
            .unwrap();

        let user = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert!(!user.active);
        assert!(!user.password_set);
        assert_eq!(user.role, "normal");
    }

    #[test]
    fn role_outside_the_enum_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert_user(conn, "u1", "a@x.com", "A", "hash", true))
            .unwrap();

        let err = db
            .with_conn(|conn| update_user_state(conn, "u1", true, "admin"))
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }
}
