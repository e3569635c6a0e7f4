use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use bazaar_types::api::{Claims, CreateCategoryRequest, CreateProductRequest, ProductQuery};

use super::json_body;
use crate::error::CoreError;
use crate::{AppState, catalog, run_blocking};

pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let category = run_blocking(move || {
        catalog::create_category(&state.db, &req.name, req.description.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, CoreError> {
    let categories = run_blocking(move || catalog::list_categories(&state.db)).await?;
    Ok(Json(categories))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let req = json_body(payload)?;

    let product = run_blocking(move || catalog::create_product(&state.db, claims.sub, &req)).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, CoreError> {
    let products = run_blocking(move || catalog::list_products(&state.db, query.seller)).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let product = run_blocking(move || catalog::get_product(&state.db, product_id)).await?;
    Ok(Json(product))
}
