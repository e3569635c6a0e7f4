//! Access/refresh session issuing.
//!
//! Access tokens are HS256 JWTs that carry id, email and role, verified
//! without touching the store. Refresh tokens are opaque random strings kept
//! only as SHA-256 digests, so they can be revoked on logout.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use bazaar_db::Database;
use bazaar_db::queries::sessions::{insert_refresh_token, query_refresh_token, revoke_refresh_token};
use bazaar_db::queries::users::{query_user_by_email, query_user_by_id};
use bazaar_db::rusqlite::Connection;
use bazaar_types::api::Claims;
use bazaar_types::models::{Role, User};

use crate::convert::{parse_role, user_from_row};
use crate::error::CoreError;
use crate::identity::{IdentityState, normalize_email};
use crate::password::verify_password;

const ACCESS_TOKEN_TYPE: &str = "access";

/// A logged-in period: short-lived access token plus revocable refresh token.
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

pub struct SessionIssuer {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: impl Into<String>, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn access_token(&self, user_id: Uuid, email: &str, role: Role) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            exp: (Utc::now() + self.access_ttl).timestamp() as usize,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, CoreError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| CoreError::InvalidToken)?;

        if data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(CoreError::InvalidToken);
        }
        Ok(data.claims)
    }

    /// Mint a fresh access+refresh pair. Prior sessions stay valid.
    pub fn issue(
        &self,
        conn: &Connection,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<Session, CoreError> {
        let access = self.access_token(user_id, email, role)?;

        let refresh = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
        let expires_at = (Utc::now() + self.refresh_ttl).timestamp();
        insert_refresh_token(
            conn,
            &Uuid::new_v4().to_string(),
            &user_id.to_string(),
            &hash_refresh_token(&refresh),
            expires_at,
        )?;

        Ok(Session { access, refresh })
    }

    pub fn login(&self, db: &Database, email: &str, password: &str) -> Result<(Session, User), CoreError> {
        let email = normalize_email(email)?;

        db.with_tx(|tx| {
            let user = query_user_by_email(tx, &email)?.ok_or(CoreError::NotFound("identity"))?;

            IdentityState::of(&user).ensure_can_login()?;

            if !verify_password(password, &user.password) {
                return Err(CoreError::InvalidCredential);
            }

            let public = user_from_row(&user);
            let session = self.issue(tx, public.id, &public.email, public.role)?;
            info!("Session issued for {}", public.id);
            Ok((session, public))
        })
    }

    /// Revoke the refresh token. Access tokens already handed out stay valid
    /// until their own expiry.
    pub fn logout(&self, db: &Database, refresh: &str) -> Result<(), CoreError> {
        let revoked = db.with_conn(|conn| revoke_refresh_token(conn, &hash_refresh_token(refresh)))?;
        if !revoked {
            return Err(CoreError::InvalidToken);
        }
        Ok(())
    }

    /// New access token for a live refresh token, reflecting the identity's
    /// current role.
    pub fn refresh(&self, db: &Database, refresh: &str) -> Result<String, CoreError> {
        let (user_id, email, role) = db.with_conn(|conn| {
            let Some(token) = query_refresh_token(conn, &hash_refresh_token(refresh))? else {
                return Ok(None);
            };
            if token.revoked || token.expires_at < Utc::now().timestamp() {
                return Ok(None);
            }
            Ok(query_user_by_id(conn, &token.user_id)?
                .filter(|u| u.active)
                .map(|u| (u.id, u.email, u.role)))
        })?
        .ok_or(CoreError::InvalidToken)?;

        let user_id: Uuid = user_id.parse().map_err(anyhow::Error::from)?;
        Ok(self.access_token(user_id, &email, parse_role(&role))?)
    }
}

fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
