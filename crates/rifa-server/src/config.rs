use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use rifa_api::payments::PaymentSettings;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RIFA_JWT_SECRET is unset or still a placeholder")]
    WeakSecret,

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub admin_email: Option<String>,
    pub sweep_interval_secs: u64,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub payments: PaymentSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("RIFA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::WeakSecret);
        }

        let host = or("RIFA_HOST", "0.0.0.0");
        let port = or("RIFA_PORT", "3000");
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "RIFA_HOST/RIFA_PORT",
                value: format!("{}:{}", host, port),
            })?;

        let sweep = or("RIFA_SWEEP_INTERVAL_SECS", "60");
        let sweep_interval_secs = sweep
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or(ConfigError::Invalid {
                name: "RIFA_SWEEP_INTERVAL_SECS",
                value: sweep,
            })?;

        let defaults = PaymentSettings::default();
        Ok(Self {
            addr,
            db_path: or("RIFA_DB_PATH", "rifa.db").into(),
            jwt_secret,
            admin_email: var("RIFA_ADMIN_EMAIL"),
            sweep_interval_secs,
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_api_base: or("STRIPE_API_BASE", "https://api.stripe.com"),
            payments: PaymentSettings {
                pix_key: var("PIX_KEY").unwrap_or(defaults.pix_key),
                zelle_email: var("ZELLE_EMAIL").unwrap_or(defaults.zelle_email),
                zelle_phone: var("ZELLE_PHONE").unwrap_or(defaults.zelle_phone),
                reference_prefix: var("ZELLE_REFERENCE_PREFIX").unwrap_or(defaults.reference_prefix),
            },
        })
    }
}
