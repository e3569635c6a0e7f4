//! Minimal catalog: categories and seller-owned products, enough to give a
//! chat its optional product context.

use tracing::{info, warn};
use uuid::Uuid;

use bazaar_db::models::{CategoryRow, ProductRow};
use bazaar_db::queries::catalog::{insert_product, query_product};
use bazaar_db::queries::sellers::query_seller_by_user;
use bazaar_db::{Database, is_constraint_violation};
use bazaar_types::api::CreateProductRequest;
use bazaar_types::models::{Category, Product};

use crate::convert::{parse_timestamp, parse_uuid};
use crate::error::CoreError;

pub fn create_category(db: &Database, name: &str, description: Option<&str>) -> Result<Category, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::InvalidInput("category name is required".into()));
    }

    let id = Uuid::new_v4();
    let description = description.unwrap_or_default().trim();

    db.create_category(&id.to_string(), name, description).map_err(|e| {
        if is_constraint_violation(&e) {
            CoreError::InvalidInput(format!("category '{name}' already exists"))
        } else {
            CoreError::Internal(e)
        }
    })?;

    info!("Category {} created: {}", id, name);
    Ok(Category {
        id,
        name: name.to_string(),
        description: description.to_string(),
    })
}

pub fn list_categories(db: &Database) -> Result<Vec<Category>, CoreError> {
    Ok(db.list_categories()?.iter().map(category_from_row).collect())
}

/// Products can only be listed by the identity that owns a seller profile.
pub fn create_product(db: &Database, owner: Uuid, req: &CreateProductRequest) -> Result<Product, CoreError> {
    validate_product(req)?;

    let id = Uuid::new_v4().to_string();
    let owner_id = owner.to_string();
    let category_id = req.category.to_string();

    let row = db.with_tx(|tx| {
        let Some(seller) = query_seller_by_user(tx, &owner_id)? else {
            warn!("Identity {} tried to create a product without a seller profile", owner);
            return Err(CoreError::Forbidden);
        };

        let row = ProductRow {
            id: id.clone(),
            seller_id: seller.id,
            category_id: category_id.clone(),
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            original_price_cents: req.original_price_cents,
            discounted_price_cents: req.discounted_price_cents,
            state: req.state.trim().to_string(),
            city: req.city.trim().to_string(),
            neighborhood: req.neighborhood.trim().to_string(),
            created_at: String::new(),
        };

        insert_product(tx, &row).map_err(|e| {
            if is_constraint_violation(&e) {
                CoreError::NotFound("category")
            } else {
                CoreError::Internal(e)
            }
        })?;

        query_product(tx, &id)?.ok_or(CoreError::NotFound("product"))
    })?;

    info!("Product {} listed by seller {}", row.id, row.seller_id);
    Ok(product_from_row(&row))
}

pub fn get_product(db: &Database, id: Uuid) -> Result<Product, CoreError> {
    let row = db
        .get_product(&id.to_string())?
        .ok_or(CoreError::NotFound("product"))?;
    Ok(product_from_row(&row))
}

pub fn list_products(db: &Database, seller: Option<Uuid>) -> Result<Vec<Product>, CoreError> {
    let seller = seller.map(|s| s.to_string());
    let rows = db.list_products(seller.as_deref())?;
    Ok(rows.iter().map(product_from_row).collect())
}

fn validate_product(req: &CreateProductRequest) -> Result<(), CoreError> {
    if req.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("title is required".into()));
    }
    if req.original_price_cents <= 0 {
        return Err(CoreError::InvalidInput("original price must be positive".into()));
    }
    if let Some(discounted) = req.discounted_price_cents {
        if discounted <= 0 || discounted >= req.original_price_cents {
            return Err(CoreError::InvalidInput(
                "discounted price must be positive and below the original price".into(),
            ));
        }
    }
    Ok(())
}

fn category_from_row(row: &CategoryRow) -> Category {
    Category {
        id: parse_uuid(&row.id, "category id"),
        name: row.name.clone(),
        description: row.description.clone(),
    }
}

fn product_from_row(row: &ProductRow) -> Product {
    Product {
        id: parse_uuid(&row.id, "product id"),
        seller_id: parse_uuid(&row.seller_id, "seller id"),
        category_id: parse_uuid(&row.category_id, "category id"),
        title: row.title.clone(),
        description: row.description.clone(),
        original_price_cents: row.original_price_cents,
        discounted_price_cents: row.discounted_price_cents,
        state: row.state.clone(),
        city: row.city.clone(),
        neighborhood: row.neighborhood.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}
