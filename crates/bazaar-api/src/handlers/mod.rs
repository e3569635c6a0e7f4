//! HTTP surface. Handlers decode the request, hand blocking store work to
//! `run_blocking`, and let `CoreError` render the failure.

pub mod catalog;
pub mod chats;
pub mod identity;
pub mod sellers;
pub mod sessions;

use axum::{Json, extract::rejection::JsonRejection};

use crate::error::CoreError;

/// Unwrap a JSON body, turning extractor rejections into the structured
/// validation error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, CoreError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| CoreError::InvalidInput(rejection.body_text()))
}
