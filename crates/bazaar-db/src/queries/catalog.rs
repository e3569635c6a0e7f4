use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{CategoryRow, ProductRow};

const PRODUCT_COLUMNS: &str = "id, seller_id, category_id, title, description, original_price_cents, discounted_price_cents, state, city, neighborhood, created_at";

impl Database {
    // -- Categories --

    pub fn create_category(&self, id: &str, name: &str, description: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name, description) VALUES (?1, ?2, ?3)",
                (id, name, description),
            )?;
            Ok(())
        })
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, description FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn category_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- Products --

    pub fn get_product(&self, id: &str) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| query_product(conn, id))
    }

    pub fn list_products(&self, seller_id: Option<&str>) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE ?1 IS NULL OR seller_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([seller_id], map_product)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// `created_at` on the row is ignored; the column default applies.
pub fn insert_product(conn: &Connection, product: &ProductRow) -> Result<()> {
    conn.execute(
        "INSERT INTO products (id, seller_id, category_id, title, description, original_price_cents,
                               discounted_price_cents, state, city, neighborhood)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            product.id,
            product.seller_id,
            product.category_id,
            product.title,
            product.description,
            product.original_price_cents,
            product.discounted_price_cents,
            product.state,
            product.city,
            product.neighborhood,
        ],
    )?;
    Ok(())
}

pub fn query_product(conn: &Connection, id: &str) -> Result<Option<ProductRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_product).optional()?;
    Ok(row)
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        seller_id: row.get(1)?,
        category_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        original_price_cents: row.get(5)?,
        discounted_price_cents: row.get(6)?,
        state: row.get(7)?,
        city: row.get(8)?,
        neighborhood: row.get(9)?,
        created_at: row.get(10)?,
    })
}
