use std::env;

use anyhow::{Context, bail};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Simulated,
    Stripe,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub stripe_secret_key: Option<String>,
    pub currency: String,
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            port,
            database_url,
            host,
            jwt: JwtConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            cors_origins,
        })
    }
}

impl JwtConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront-api".to_string());
        let ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        Ok(Self {
            secret,
            issuer,
            ttl_hours,
        })
    }
}

impl PaymentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let provider = match env::var("PAYMENT_PROVIDER")
            .unwrap_or_else(|_| "simulated".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "simulated" => PaymentProvider::Simulated,
            "stripe" => PaymentProvider::Stripe,
            other => bail!("unsupported PAYMENT_PROVIDER '{other}'"),
        };
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").ok().filter(|k| !k.is_empty());
        if provider == PaymentProvider::Stripe && stripe_secret_key.is_none() {
            bail!("STRIPE_SECRET_KEY is required when PAYMENT_PROVIDER=stripe");
        }
        let currency = env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string());
        Ok(Self {
            provider,
            stripe_secret_key,
            currency,
        })
    }
}
