use anyhow::{bail, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDriver {
    Local,
    S3,
}

impl FromStr for StorageDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub id_salt: String,
    pub storage_driver: StorageDriver,
    pub storage_path: String,
    pub storage_public_prefix: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, applying defaults for
    /// missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let profile = get("PROFILE", "dev");

        let db_host = get("DB_HOST", "localhost");
        let db_port = get("DB_PORT", "5432");
        let db_user = get("DB_USER", "postgres");
        let db_pwd = get("DB_PASSWORD", "password");
        let db_name = get("DB_NAME", "trailstory_db");

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let db_max_connections = get("DB_MAX_CONNECTIONS", "10").parse().unwrap_or(10);

        let id_salt = get("ID_SALT", "trailstory-secret-salt-change-me");
        if id_salt.is_empty() {
            bail!("ID_SALT must not be empty");
        }

        // Loaded before logging is up, so a bad driver has to fail loudly here.
        let storage_driver: StorageDriver = match get("STORAGE_DRIVER", "local").parse() {
            Ok(driver) => driver,
            Err(unknown) => bail!("Unknown STORAGE_DRIVER '{}' (expected local or s3)", unknown),
        };
        let storage_path = get("STORAGE_PATH", "./uploads");
        let storage_public_prefix = get("STORAGE_PUBLIC_PREFIX", "/static");

        let log_level = get("LOG_LEVEL", "info");

        Ok(Self {
            profile,
            database_url,
            db_max_connections,
            id_salt,
            storage_driver,
            storage_path,
            storage_public_prefix,
            log_level,
        })
    }
}
