use bigdecimal::BigDecimal;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::web::requests::fits_numeric;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_DOCUMENT_STORAGE_ROOT: &str = "/var/lib/ragchat/documents";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Local,
    Dev,
    Preview,
    Prod,
}

impl FromStr for AppMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(AppMode::Local),
            "dev" => Ok(AppMode::Dev),
            "preview" => Ok(AppMode::Preview),
            "prod" => Ok(AppMode::Prod),
            _ => Err(()),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub app_mode: AppMode,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_pool_size: u32,
    pub document_storage_root: String,
    pub bestprice_price_per_1k: Option<BigDecimal>,
    pub cors_allow_any: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_mode", &self.app_mode)
            .field("database_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("db_pool_size", &self.db_pool_size)
            .field("document_storage_root", &self.document_storage_root)
            .field("bestprice_price_per_1k", &self.bestprice_price_per_1k)
            .field("cors_allow_any", &self.cors_allow_any)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_mode = match lookup("APP_MODE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "APP_MODE",
                value,
            })?,
            None => AppMode::Local,
        };

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse_or("BIND_ADDR", lookup("BIND_ADDR"), DEFAULT_BIND_ADDR)?;
        let db_pool_size = match lookup("DB_POOL_SIZE") {
            Some(value) => match value.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DB_POOL_SIZE",
                        value,
                    })
                }
            },
            None => DEFAULT_POOL_SIZE,
        };

        let document_storage_root = lookup("DOCUMENT_STORAGE_ROOT")
            .unwrap_or_else(|| DEFAULT_DOCUMENT_STORAGE_ROOT.to_string());

        let bestprice_price_per_1k = match lookup("BESTPRICE_PRICE_PER_1K") {
            Some(value) => match BigDecimal::from_str(value.trim()) {
                Ok(price) if price >= BigDecimal::from(0) && fits_numeric(&price, 10, 4) => {
                    Some(price)
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BESTPRICE_PRICE_PER_1K",
                        value,
                    })
                }
            },
            None => None,
        };

        let cors_requested = match lookup("CORS_ALLOW_ANY") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "CORS_ALLOW_ANY",
                value,
            })?,
            None => false,
        };
        let cors_allow_any = cors_requested || matches!(app_mode, AppMode::Local | AppMode::Dev);

        Ok(AppConfig {
            app_mode,
            database_url,
            bind_addr,
            db_pool_size,
            document_storage_root,
            bestprice_price_per_1k,
            cors_allow_any,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<T, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    value
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
