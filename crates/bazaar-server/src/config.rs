use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use bazaar_api::notifier::MailApiConfig;

/// Secrets shipped in sample `.env` files. Refused at startup.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub upload_dir: PathBuf,
    /// `None` when any of URL, key or sender is missing.
    pub mail: Option<MailApiConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("BAZAAR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BAZAAR_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let access_token_ttl_secs = parse_or("BAZAAR_ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_token_ttl_secs = parse_or("BAZAAR_REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?;
        if access_token_ttl_secs <= 0 || refresh_token_ttl_secs <= 0 {
            bail!("token lifetimes must be positive");
        }

        Ok(Self {
            host: var_or("BAZAAR_HOST", "0.0.0.0"),
            port: parse_or("BAZAAR_PORT", 8000)?,
            db_path: var_or("BAZAAR_DB_PATH", "bazaar.db").into(),
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            upload_dir: var_or("BAZAAR_UPLOAD_DIR", "./uploads").into(),
            mail: mail_from_env(),
        })
    }
}

fn mail_from_env() -> Option<MailApiConfig> {
    let api_url = non_empty("BAZAAR_MAIL_API_URL")?;
    let api_key = non_empty("BAZAAR_MAIL_API_KEY")?;
    let sender_email = non_empty("BAZAAR_MAIL_SENDER")?;

    Some(MailApiConfig {
        api_url,
        api_key,
        sender_email,
        sender_name: non_empty("BAZAAR_MAIL_SENDER_NAME"),
    })
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
