use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Chat, ChatMessage, Role, SellerProfile, User};

// -- JWT Claims --

/// Access-token claims. `role` is a snapshot taken when the token was issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
    pub token_type: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Set when opening a chat that already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
}

// -- Identity --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Carries no identity id. The id is only handed out once the email is confirmed.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmRequest {
    pub confirmation_code: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPasswordRequest {
    pub password: String,
    /// Required when the account already has a password (reset path).
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetPasswordResponse {
    pub message: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Sessions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

// -- Sellers --

#[derive(Debug, Serialize, Deserialize)]
pub struct SellerEnvelope {
    pub seller: SellerProfile,
}

// -- Catalog --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    pub category: Uuid,
    pub title: String,
    pub description: String,
    pub original_price_cents: i64,
    #[serde(default)]
    pub discounted_price_cents: Option<i64>,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub seller: Option<Uuid>,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenChatRequest {
    /// Defaults to the caller; when given it must be the caller.
    #[serde(default)]
    pub buyer: Option<Uuid>,
    pub seller: Uuid,
    #[serde(default)]
    pub product: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub chat: Chat,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub chat: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message: ChatMessage,
}
