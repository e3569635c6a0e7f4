use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use bazaar_types::api::{Claims, SellerEnvelope};

use crate::error::CoreError;
use crate::sellers::{self, DocumentUpload, SellerFields};
use crate::{AppState, run_blocking};

/// Multipart elevation request. Text parts carry the profile fields; every
/// part with a file name is a document image.
pub async fn elevate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, CoreError> {
    let mut fields = SellerFields::default();
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::InvalidInput(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            if !content_type.starts_with("image/") {
                return Err(CoreError::InvalidInput(format!(
                    "document '{file_name}' must be an image"
                )));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CoreError::InvalidInput(e.body_text()))?;
            documents.push(DocumentUpload {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| CoreError::InvalidInput(e.body_text()))?;
        match name.as_str() {
            "government_id" => fields.government_id = value,
            "birth_date" => fields.birth_date = value,
            "address" => fields.address = value,
            "postal_code" => fields.postal_code = value,
            "state" => fields.state = value,
            "city" => fields.city = value,
            "neighborhood" => fields.neighborhood = value,
            other => warn!("Ignoring unknown seller field '{}'", other),
        }
    }

    let seller = sellers::elevate_with_documents(&state, claims.sub, fields, documents).await?;

    Ok((StatusCode::CREATED, Json(SellerEnvelope { seller })))
}

pub async fn get_seller(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let seller = run_blocking(move || sellers::get_by_id(&state.db, seller_id)).await?;
    Ok(Json(SellerEnvelope { seller }))
}

pub async fn get_seller_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let seller = run_blocking(move || sellers::get_by_user(&state.db, user_id)).await?;
    Ok(Json(SellerEnvelope { seller }))
}
