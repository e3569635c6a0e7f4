use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Normal,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Seller => "seller",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Role::Normal),
            "seller" => Some(Role::Seller),
            _ => None,
        }
    }
}

/// Public view of an identity. Never carries the password credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerDocument {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub government_id: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub postal_code: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub documents: Vec<SellerDocument>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub original_price_cents: i64,
    pub discounted_price_cents: Option<i64>,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    /// Identity that owns the seller side.
    pub seller_user_id: Uuid,
    pub product_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}
