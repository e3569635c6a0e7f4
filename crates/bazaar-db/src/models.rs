/// Database row types. These map directly to SQLite rows.
/// Distinct from bazaar-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_set: bool,
    pub active: bool,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CodeRow {
    pub id: String,
    pub user_id: String,
    pub code: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub used: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRow {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub revoked: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct IdentityEventRow {
    pub id: i64,
    pub user_id: String,
    pub event: String,
    pub from_state: Option<String>,
    pub to_state: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SellerRow {
    pub id: String,
    pub user_id: String,
    pub government_id: String,
    /// `YYYY-MM-DD`.
    pub birth_date: String,
    pub address: String,
    pub postal_code: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SellerDocumentRow {
    pub id: String,
    pub seller_id: String,
    pub file_name: String,
    pub content_type: String,
    pub storage_key: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub seller_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub original_price_cents: i64,
    pub discounted_price_cents: Option<i64>,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Owner of the seller side, joined from `sellers`.
    pub seller_user_id: String,
    pub product_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub sent_at: String,
}
