use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use bazaar_types::api::{
    Claims, ConfirmRequest, ConfirmResponse, MessageResponse, PasswordResetRequest, RegisterRequest,
    RegisterResponse, SetPasswordRequest, SetPasswordResponse,
};

use super::json_body;
use crate::error::CoreError;
use crate::{AppState, identity, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    identity::register(&state, &req.email, &req.name, req.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful, check your email for the confirmation code".into(),
        }),
    ))
}

pub async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let user_id = run_blocking(move || identity::confirm(&state.db, &req.confirmation_code, &req.email)).await?;

    Ok(Json(ConfirmResponse {
        message: "Email confirmed".into(),
        user_id,
    }))
}

pub async fn set_password(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let session = run_blocking(move || {
        identity::set_password(
            &state.db,
            &state.sessions,
            user_id,
            &req.password,
            req.confirmation_code.as_deref(),
        )
    })
    .await?;

    Ok(Json(SetPasswordResponse {
        message: "Password set".into(),
        access: session.access,
        refresh: session.refresh,
    }))
}

pub async fn password_reset(
    State(state): State<AppState>,
    payload: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    identity::request_password_reset(&state, &req.email).await?;

    Ok(Json(MessageResponse {
        message: "A confirmation code was sent to your email".into(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, CoreError> {
    let user = run_blocking(move || identity::get_identity(&state.db, claims.sub)).await?;
    Ok(Json(user))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, CoreError> {
    run_blocking(move || identity::delete_identity(&state.db, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
