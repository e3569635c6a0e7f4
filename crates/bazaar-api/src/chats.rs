//! Two-party chats between a buyer identity and a seller profile.
//!
//! `is_participant` is the only authorization gate for chat reads and
//! writes. It runs against the chat row as read in the current request,
//! which already joins the seller side's owning identity.

use tracing::{info, warn};
use uuid::Uuid;

use bazaar_db::models::{ChatRow, MessageRow};
use bazaar_db::queries::catalog::query_product;
use bazaar_db::queries::chats::{insert_chat, insert_message, query_chat, query_chat_by_pair};
use bazaar_db::queries::sellers::query_seller_by_id;
use bazaar_db::queries::users::query_user_by_id;
use bazaar_db::{Database, is_constraint_violation, now_timestamp};
use bazaar_types::models::{Chat, ChatMessage};

use crate::convert::{chat_from_row, message_from_row, parse_uuid};
use crate::error::CoreError;

pub const MAX_MESSAGE_LEN: usize = 4000;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

pub fn is_participant(identity: Uuid, chat: &ChatRow) -> bool {
    let id = identity.to_string();
    chat.buyer_id == id || chat.seller_user_id == id
}

pub fn open_chat(
    db: &Database,
    buyer: Uuid,
    seller_id: Uuid,
    product_id: Option<Uuid>,
) -> Result<Chat, CoreError> {
    let buyer_id = buyer.to_string();
    let seller_key = seller_id.to_string();
    let product_key = product_id.map(|p| p.to_string());
    let chat_id = Uuid::new_v4().to_string();

    let row = db.with_tx(|tx| {
        query_user_by_id(tx, &buyer_id)?.ok_or(CoreError::NotFound("identity"))?;
        let seller = query_seller_by_id(tx, &seller_key)?.ok_or(CoreError::NotFound("seller"))?;

        if seller.user_id == buyer_id {
            return Err(CoreError::SelfChat);
        }

        if let Some(existing) = query_chat_by_pair(tx, &buyer_id, &seller.id)? {
            return Err(duplicate(&existing));
        }

        if let Some(pid) = &product_key {
            let product = query_product(tx, pid)?.ok_or(CoreError::NotFound("product"))?;
            if product.seller_id != seller.id {
                return Err(CoreError::InvalidInput(
                    "product does not belong to this seller".into(),
                ));
            }
        }

        if let Err(e) = insert_chat(tx, &chat_id, &buyer_id, &seller.id, product_key.as_deref()) {
            if is_constraint_violation(&e) {
                if let Some(existing) = query_chat_by_pair(tx, &buyer_id, &seller.id)? {
                    return Err(duplicate(&existing));
                }
            }
            return Err(e.into());
        }

        query_chat(tx, &chat_id)?.ok_or(CoreError::NotFound("chat"))
    })?;

    info!("Chat {} opened: buyer {} seller {}", row.id, row.buyer_id, row.seller_id);
    Ok(chat_from_row(&row))
}

fn duplicate(existing: &ChatRow) -> CoreError {
    CoreError::DuplicateChat {
        chat_id: parse_uuid(&existing.id, "chat id"),
    }
}

pub fn post_message(
    db: &Database,
    actor: Uuid,
    chat_id: Uuid,
    body: &str,
) -> Result<ChatMessage, CoreError> {
    let chat_key = chat_id.to_string();
    let message_id = Uuid::new_v4().to_string();

    db.with_tx(|tx| {
        let chat = query_chat(tx, &chat_key)?.ok_or(CoreError::NotFound("chat"))?;

        if !is_participant(actor, &chat) {
            warn!("Identity {} tried to post into chat {} without being a participant", actor, chat.id);
            return Err(CoreError::Forbidden);
        }

        if body.trim().is_empty() {
            return Err(CoreError::EmptyBody);
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(CoreError::InvalidInput(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            )));
        }

        let sender = query_user_by_id(tx, &actor.to_string())?.ok_or(CoreError::NotFound("identity"))?;
        let row = MessageRow {
            id: message_id.clone(),
            chat_id: chat.id.clone(),
            sender_id: sender.id,
            sender_name: sender.name,
            body: body.to_string(),
            sent_at: now_timestamp(),
        };
        insert_message(tx, &row.id, &row.chat_id, &row.sender_id, &row.body, &row.sent_at)?;

        Ok(message_from_row(&row))
    })
}

pub fn list_chats(db: &Database, identity: Uuid) -> Result<Vec<Chat>, CoreError> {
    let rows = db.get_chats_for_identity(&identity.to_string())?;
    Ok(rows.iter().map(chat_from_row).collect())
}

pub fn list_messages(
    db: &Database,
    identity: Uuid,
    chat_id: Uuid,
    limit: u32,
    before: Option<Uuid>,
) -> Result<Vec<ChatMessage>, CoreError> {
    let chat = db
        .get_chat(&chat_id.to_string())?
        .ok_or(CoreError::NotFound("chat"))?;

    if !is_participant(identity, &chat) {
        warn!("Identity {} tried to read chat {} without being a participant", identity, chat.id);
        return Err(CoreError::Forbidden);
    }

    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let before = before.map(|id| id.to_string());
    let rows = db.get_messages(&chat.id, limit, before.as_deref())?;
    Ok(rows.iter().map(message_from_row).collect())
}
