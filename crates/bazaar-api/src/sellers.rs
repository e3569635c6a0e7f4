//! Seller elevation: attach a one-off seller profile to a verified identity.
//!
//! The profile insert, its documents and the role change commit in a single
//! transaction. Document blobs are written to disk first and removed again
//! if that transaction fails.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use bazaar_db::models::{SellerDocumentRow, SellerRow};
use bazaar_db::queries::sellers::{
    government_id_taken, insert_seller, insert_seller_document, query_seller_by_id,
    query_seller_by_user, query_seller_documents,
};
use bazaar_db::queries::users::query_user_by_id;
use bazaar_db::rusqlite::Connection;
use bazaar_db::{Database, is_constraint_violation};
use bazaar_types::models::{Role, SellerDocument, SellerProfile};

use crate::convert::{parse_date, parse_role, parse_timestamp, parse_uuid};
use crate::error::CoreError;
use crate::identity::{Command, load_user, transition};
use crate::{AppState, run_blocking};

pub const GOVERNMENT_ID_LEN: usize = 11;

/// Per-document cap.
pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

/// Raw profile fields as submitted. `address` is the only optional one.
#[derive(Debug, Clone, Default)]
pub struct SellerFields {
    pub government_id: String,
    pub birth_date: String,
    pub address: String,
    pub postal_code: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
}

/// An uploaded document image, not yet stored.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A document already written under the upload directory.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// Boundary validation. Returns the parsed birth date.
pub fn validate_fields(fields: &SellerFields, today: NaiveDate) -> Result<NaiveDate, CoreError> {
    let gov = fields.government_id.trim();
    if gov.len() != GOVERNMENT_ID_LEN || !gov.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidGovernmentId);
    }

    let birth_date = NaiveDate::parse_from_str(fields.birth_date.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidInput("birth_date must be YYYY-MM-DD".into()))?;
    if birth_date >= today {
        return Err(CoreError::FutureBirthDate);
    }

    for (name, value) in [
        ("postal_code", &fields.postal_code),
        ("state", &fields.state),
        ("city", &fields.city),
        ("neighborhood", &fields.neighborhood),
    ] {
        if value.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!("{name} is required")));
        }
    }

    Ok(birth_date)
}

/// Create the seller profile and promote the identity, all or nothing.
pub fn elevate(
    db: &Database,
    user_id: Uuid,
    fields: &SellerFields,
    birth_date: NaiveDate,
    documents: &[StoredDocument],
) -> Result<SellerProfile, CoreError> {
    if documents.is_empty() {
        return Err(CoreError::InvalidInput("at least one document image is required".into()));
    }

    let seller_id = Uuid::new_v4();
    let government_id = fields.government_id.trim().to_string();

    db.with_tx(|tx| {
        let user = load_user(tx, &user_id.to_string())?;

        if query_seller_by_user(tx, &user.id)?.is_some() {
            return Err(CoreError::AlreadySeller);
        }
        if government_id_taken(tx, &government_id)? {
            return Err(CoreError::DuplicateGovernmentId);
        }

        let row = SellerRow {
            id: seller_id.to_string(),
            user_id: user.id.clone(),
            government_id: government_id.clone(),
            birth_date: birth_date.format("%Y-%m-%d").to_string(),
            address: fields.address.trim().to_string(),
            postal_code: fields.postal_code.trim().to_string(),
            state: fields.state.trim().to_string(),
            city: fields.city.trim().to_string(),
            neighborhood: fields.neighborhood.trim().to_string(),
            created_at: String::new(),
        };
        insert_seller(tx, &row).map_err(|e| {
            if is_constraint_violation(&e) {
                CoreError::DuplicateGovernmentId
            } else {
                CoreError::Internal(e)
            }
        })?;

        for doc in documents {
            insert_seller_document(
                tx,
                &SellerDocumentRow {
                    id: doc.id.to_string(),
                    seller_id: row.id.clone(),
                    file_name: doc.file_name.clone(),
                    content_type: doc.content_type.clone(),
                    storage_key: doc.id.to_string(),
                    size: doc.size as i64,
                },
            )?;
        }

        transition(tx, &user, Command::Elevate { seller_id })?;

        load_profile(tx, &row.id)
    })
}

/// Validate, store documents, then elevate. Stored files are deleted again
/// when elevation fails.
pub async fn elevate_with_documents(
    state: &AppState,
    user_id: Uuid,
    fields: SellerFields,
    uploads: Vec<DocumentUpload>,
) -> Result<SellerProfile, CoreError> {
    let birth_date = validate_fields(&fields, Utc::now().date_naive())?;
    if uploads.is_empty() {
        return Err(CoreError::InvalidInput("at least one document image is required".into()));
    }
    if uploads.iter().any(|u| u.bytes.len() > MAX_DOCUMENT_SIZE) {
        return Err(CoreError::InvalidInput("document exceeds 10 MB".into()));
    }

    let stored = store_documents(&state.upload_dir, uploads).await?;

    let result = {
        let state = state.clone();
        let stored = stored.clone();
        run_blocking(move || elevate(&state.db, user_id, &fields, birth_date, &stored)).await
    };

    match result {
        Ok(profile) => {
            info!("Identity {} elevated to seller {}", user_id, profile.id);
            Ok(profile)
        }
        Err(e) => {
            discard_documents(&state.upload_dir, &stored).await;
            Err(e)
        }
    }
}

async fn store_documents(
    dir: &Path,
    uploads: Vec<DocumentUpload>,
) -> Result<Vec<StoredDocument>, CoreError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", dir.display(), e);
        CoreError::Internal(e.into())
    })?;

    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let id = Uuid::new_v4();
        let path = document_path(dir, id);

        if let Err(e) = tokio::fs::write(&path, &upload.bytes).await {
            error!("Failed to write document {}: {}", path.display(), e);
            discard_documents(dir, &stored).await;
            return Err(CoreError::Internal(e.into()));
        }

        stored.push(StoredDocument {
            id,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size: upload.bytes.len() as u64,
        });
    }

    Ok(stored)
}

async fn discard_documents(dir: &Path, stored: &[StoredDocument]) {
    for doc in stored {
        let path = document_path(dir, doc.id);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove orphaned document {}: {}", path.display(), e);
        }
    }
}

fn document_path(dir: &Path, id: Uuid) -> PathBuf {
    dir.join(id.to_string())
}

// -- Reads --

pub fn get_by_id(db: &Database, seller_id: Uuid) -> Result<SellerProfile, CoreError> {
    let row = db
        .get_seller_by_id(&seller_id.to_string())?
        .ok_or(CoreError::NotFound("seller"))?;
    db.with_conn(|conn| Ok(load_profile(conn, &row.id)))?
}

pub fn get_by_user(db: &Database, user_id: Uuid) -> Result<SellerProfile, CoreError> {
    let row = db
        .get_seller_by_user(&user_id.to_string())?
        .ok_or(CoreError::NotFound("seller"))?;
    db.with_conn(|conn| Ok(load_profile(conn, &row.id)))?
}

/// Read a profile with its documents. A profile whose owner does not hold the
/// seller role is an invariant violation: it is logged, not repaired.
fn load_profile(conn: &Connection, seller_id: &str) -> Result<SellerProfile, CoreError> {
    let row = query_seller_by_id(conn, seller_id)?.ok_or(CoreError::NotFound("seller"))?;
    let docs = query_seller_documents(conn, seller_id)?;

    match query_user_by_id(conn, &row.user_id)? {
        Some(owner) if parse_role(&owner.role) == Role::Seller => {}
        Some(owner) => error!(
            "Invariant violation: seller {} owned by {} whose role is '{}' (active={})",
            row.id, owner.id, owner.role, owner.active
        ),
        None => error!("Invariant violation: seller {} has no owning identity {}", row.id, row.user_id),
    }

    Ok(SellerProfile {
        id: parse_uuid(&row.id, "seller id"),
        user_id: parse_uuid(&row.user_id, "user id"),
        government_id: row.government_id,
        birth_date: parse_date(&row.birth_date),
        address: row.address,
        postal_code: row.postal_code,
        state: row.state,
        city: row.city,
        neighborhood: row.neighborhood,
        documents: docs
            .into_iter()
            .map(|d| SellerDocument {
                id: parse_uuid(&d.id, "document id"),
                file_name: d.file_name,
                content_type: d.content_type,
                size: d.size.max(0) as u64,
            })
            .collect(),
        created_at: parse_timestamp(&row.created_at),
    })
}
