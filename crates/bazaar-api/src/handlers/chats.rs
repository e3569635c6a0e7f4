use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use bazaar_types::api::{ChatEnvelope, Claims, MessageEnvelope, OpenChatRequest, PostMessageRequest};

use super::json_body;
use crate::chats::{self, DEFAULT_PAGE_SIZE};
use crate::error::CoreError;
use crate::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Id of the oldest message on the previous page.
    pub before: Option<Uuid>,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// The buyer is always the caller. Naming someone else as buyer is refused.
pub async fn open_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<OpenChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    if let Some(buyer) = req.buyer {
        if buyer != claims.sub {
            warn!("Identity {} tried to open a chat on behalf of {}", claims.sub, buyer);
            return Err(CoreError::Forbidden);
        }
    }

    let chat =
        run_blocking(move || chats::open_chat(&state.db, claims.sub, req.seller, req.product)).await?;

    Ok((StatusCode::CREATED, Json(ChatEnvelope { chat })))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, CoreError> {
    let chats = run_blocking(move || chats::list_chats(&state.db, claims.sub)).await?;
    Ok(Json(chats))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, CoreError> {
    let messages = run_blocking(move || {
        chats::list_messages(&state.db, claims.sub, chat_id, query.limit, query.before)
    })
    .await?;
    Ok(Json(messages))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let message =
        run_blocking(move || chats::post_message(&state.db, claims.sub, req.chat, &req.message)).await?;

    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}
