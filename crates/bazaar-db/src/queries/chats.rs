use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{ChatRow, MessageRow};

// Every chat read joins `sellers` so the seller side's owning identity is
// read together with the chat, never cached elsewhere.
const CHAT_SELECT: &str = "SELECT c.id, c.buyer_id, c.seller_id, s.user_id, c.product_id, c.created_at
     FROM chats c
     JOIN sellers s ON c.seller_id = s.id";

impl Database {
    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat(conn, id))
    }

    pub fn get_chats_for_identity(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| query_chats_for_identity(conn, user_id))
    }

    pub fn get_messages(
        &self,
        chat_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, chat_id, limit, before))
    }
}

pub fn insert_chat(
    conn: &Connection,
    id: &str,
    buyer_id: &str,
    seller_id: &str,
    product_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chats (id, buyer_id, seller_id, product_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, buyer_id, seller_id, product_id],
    )?;
    Ok(())
}

pub fn query_chat(conn: &Connection, id: &str) -> Result<Option<ChatRow>> {
    let mut stmt = conn.prepare(&format!("{CHAT_SELECT} WHERE c.id = ?1"))?;
    let row = stmt.query_row([id], map_chat).optional()?;
    Ok(row)
}

pub fn query_chat_by_pair(conn: &Connection, buyer_id: &str, seller_id: &str) -> Result<Option<ChatRow>> {
    let mut stmt =
        conn.prepare(&format!("{CHAT_SELECT} WHERE c.buyer_id = ?1 AND c.seller_id = ?2"))?;
    let row = stmt.query_row([buyer_id, seller_id], map_chat).optional()?;
    Ok(row)
}

/// Chats where the identity is the buyer or owns the seller side. A single
/// predicate over one scan, so each chat appears once.
pub fn query_chats_for_identity(conn: &Connection, user_id: &str) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare(&format!(
        "{CHAT_SELECT}
         WHERE c.buyer_id = ?1 OR s.user_id = ?1
         ORDER BY c.created_at DESC, c.rowid DESC"
    ))?;

    let rows = stmt
        .query_map([user_id], map_chat)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn insert_message(
    conn: &Connection,
    id: &str,
    chat_id: &str,
    sender_id: &str,
    body: &str,
    sent_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, chat_id, sender_id, body, sent_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, chat_id, sender_id, body, sent_at],
    )?;
    Ok(())
}

/// Oldest-first page of a chat. `before` is the id of the oldest message on
/// the previous page; paging follows `(sent_at, rowid)` so messages sharing a
/// timestamp are neither skipped nor repeated. An unknown cursor yields an
/// empty page.
pub fn query_messages(
    conn: &Connection,
    chat_id: &str,
    limit: u32,
    before: Option<&str>,
) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch the sender name in a single query
    let mut stmt = conn.prepare(
        "SELECT id, chat_id, sender_id, sender_name, body, sent_at FROM (
             SELECT m.id, m.chat_id, m.sender_id, u.name AS sender_name, m.body, m.sent_at, m.rowid AS rid
             FROM messages m
             LEFT JOIN users u ON m.sender_id = u.id
             WHERE m.chat_id = ?1
               AND (?3 IS NULL OR (m.sent_at, m.rowid) < (
                   SELECT c.sent_at, c.rowid FROM messages c WHERE c.id = ?3 AND c.chat_id = ?1
               ))
             ORDER BY m.sent_at DESC, m.rowid DESC
             LIMIT ?2
         )
         ORDER BY sent_at ASC, rid ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![chat_id, limit, before], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                sender_id: row.get(2)?,
                sender_name: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_else(|| "unknown".to_string()),
                body: row.get(4)?,
                sent_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn count_messages(conn: &Connection, chat_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
        [chat_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn map_chat(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        buyer_id: row.get(1)?,
        seller_id: row.get(2)?,
        seller_user_id: row.get(3)?,
        product_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}
