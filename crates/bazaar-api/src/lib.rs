pub mod catalog;
pub mod chats;
pub mod codes;
mod convert;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod notifier;
pub mod password;
pub mod sellers;
pub mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tracing::error;

use bazaar_db::Database;

use crate::error::CoreError;
use crate::notifier::Notifier;
use crate::sessions::SessionIssuer;

/// Upper bound for a seller elevation request: a handful of document images.
const ELEVATION_BODY_LIMIT: usize = 5 * sellers::MAX_DOCUMENT_SIZE;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionIssuer,
    pub notifier: Arc<dyn Notifier>,
    pub upload_dir: PathBuf,
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        CoreError::Internal(e.into())
    })?
}

/// Every route of the API. Callers add CORS and tracing layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::identity::register))
        .route("/confirm", post(handlers::identity::confirm))
        .route("/set-password/{user_id}", post(handlers::identity::set_password))
        .route("/password-reset", post(handlers::identity::password_reset))
        .route("/login", post(handlers::sessions::login))
        .route("/logout", post(handlers::sessions::logout))
        .route("/token/refresh", post(handlers::sessions::refresh))
        .route("/sellers/{seller_id}", get(handlers::sellers::get_seller))
        .route("/sellers/by-user/{user_id}", get(handlers::sellers::get_seller_by_user))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(handlers::identity::me).delete(handlers::identity::delete_me),
        )
        .route(
            "/sellers",
            post(handlers::sellers::elevate).layer(DefaultBodyLimit::max(ELEVATION_BODY_LIMIT)),
        )
        .route(
            "/categories",
            get(handlers::catalog::list_categories).post(handlers::catalog::create_category),
        )
        .route(
            "/products",
            get(handlers::catalog::list_products).post(handlers::catalog::create_product),
        )
        .route("/products/{product_id}", get(handlers::catalog::get_product))
        .route(
            "/chats",
            get(handlers::chats::list_chats).post(handlers::chats::open_chat),
        )
        .route("/chats/{chat_id}/messages", get(handlers::chats::list_messages))
        .route("/messages", post(handlers::chats::post_message))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
