use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{SellerDocumentRow, SellerRow};

const SELLER_COLUMNS: &str = "id, user_id, government_id, birth_date, address, postal_code, state, city, neighborhood, created_at";

impl Database {
    pub fn get_seller_by_id(&self, id: &str) -> Result<Option<SellerRow>> {
        self.with_conn(|conn| query_seller_by_id(conn, id))
    }

    pub fn get_seller_by_user(&self, user_id: &str) -> Result<Option<SellerRow>> {
        self.with_conn(|conn| query_seller_by_user(conn, user_id))
    }
}

/// `created_at` on the row is ignored; the column default applies.
pub fn insert_seller(conn: &Connection, seller: &SellerRow) -> Result<()> {
    conn.execute(
        "INSERT INTO sellers (id, user_id, government_id, birth_date, address, postal_code, state, city, neighborhood)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            seller.id,
            seller.user_id,
            seller.government_id,
            seller.birth_date,
            seller.address,
            seller.postal_code,
            seller.state,
            seller.city,
            seller.neighborhood,
        ],
    )?;
    Ok(())
}

pub fn insert_seller_document(conn: &Connection, doc: &SellerDocumentRow) -> Result<()> {
    conn.execute(
        "INSERT INTO seller_documents (id, seller_id, file_name, content_type, storage_key, size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            doc.id,
            doc.seller_id,
            doc.file_name,
            doc.content_type,
            doc.storage_key,
            doc.size,
        ],
    )?;
    Ok(())
}

pub fn query_seller_by_id(conn: &Connection, id: &str) -> Result<Option<SellerRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_seller).optional()?;
    Ok(row)
}

pub fn query_seller_by_user(conn: &Connection, user_id: &str) -> Result<Option<SellerRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE user_id = ?1"))?;
    let row = stmt.query_row([user_id], map_seller).optional()?;
    Ok(row)
}

pub fn government_id_taken(conn: &Connection, government_id: &str) -> Result<bool> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sellers WHERE government_id = ?1)",
        [government_id],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn query_seller_documents(conn: &Connection, seller_id: &str) -> Result<Vec<SellerDocumentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, seller_id, file_name, content_type, storage_key, size
         FROM seller_documents
         WHERE seller_id = ?1
         ORDER BY created_at, rowid",
    )?;

    let rows = stmt
        .query_map([seller_id], |row| {
            Ok(SellerDocumentRow {
                id: row.get(0)?,
                seller_id: row.get(1)?,
                file_name: row.get(2)?,
                content_type: row.get(3)?,
                storage_key: row.get(4)?,
                size: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_seller(row: &Row<'_>) -> rusqlite::Result<SellerRow> {
    Ok(SellerRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        government_id: row.get(2)?,
        birth_date: row.get(3)?,
        address: row.get(4)?,
        postal_code: row.get(5)?,
        state: row.get(6)?,
        city: row.get(7)?,
        neighborhood: row.get(8)?,
        created_at: row.get(9)?,
    })
}
