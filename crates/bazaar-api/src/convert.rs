//! Row → wire conversions shared by the core modules.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use bazaar_db::models::{ChatRow, MessageRow, UserRow};
use bazaar_types::models::{Chat, ChatMessage, Role, User};

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Plain SQLite datetime('now') output has no timezone: treat as naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!("Corrupt date '{}': {}", raw, e);
        NaiveDate::default()
    })
}

pub(crate) fn parse_role(raw: &str) -> Role {
    Role::parse(raw).unwrap_or_else(|| {
        warn!("Unknown role '{}', treating as normal", raw);
        Role::Normal
    })
}

pub(crate) fn user_from_row(row: &UserRow) -> User {
    User {
        id: parse_uuid(&row.id, "user id"),
        email: row.email.clone(),
        name: row.name.clone(),
        active: row.active,
        role: parse_role(&row.role),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn chat_from_row(row: &ChatRow) -> Chat {
    Chat {
        id: parse_uuid(&row.id, "chat id"),
        buyer_id: parse_uuid(&row.buyer_id, "buyer id"),
        seller_id: parse_uuid(&row.seller_id, "seller id"),
        seller_user_id: parse_uuid(&row.seller_user_id, "seller user id"),
        product_id: row.product_id.as_deref().map(|p| parse_uuid(p, "product id")),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub(crate) fn message_from_row(row: &MessageRow) -> ChatMessage {
    ChatMessage {
        id: parse_uuid(&row.id, "message id"),
        chat_id: parse_uuid(&row.chat_id, "chat id"),
        sender_id: parse_uuid(&row.sender_id, "sender id"),
        sender_name: row.sender_name.clone(),
        body: row.body.clone(),
        sent_at: parse_timestamp(&row.sent_at),
    }
}
