use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use bazaar_types::api::{LoginRequest, LoginResponse, MessageResponse, RefreshRequest, RefreshResponse};

use super::json_body;
use crate::error::CoreError;
use crate::{AppState, run_blocking};

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let (session, user) =
        run_blocking(move || state.sessions.login(&state.db, &req.email, &req.password)).await?;

    Ok(Json(LoginResponse {
        access: session.access,
        refresh: session.refresh,
        user,
    }))
}

/// The bearer credential here is the refresh token, not an access token.
pub async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, CoreError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(CoreError::InvalidToken)?;
    let refresh = bearer.token().to_string();

    run_blocking(move || state.sessions.logout(&state.db, &refresh)).await?;

    Ok(Json(MessageResponse {
        message: "Logged out".into(),
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let access = run_blocking(move || state.sessions.refresh(&state.db, &req.refresh)).await?;

    Ok(Json(RefreshResponse { access }))
}
