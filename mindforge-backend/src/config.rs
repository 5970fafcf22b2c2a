use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Upper bound on pooled SQLite connections.
    pub const DB_POOL_SIZE: &str = "DB_POOL_SIZE";
    /// Set to "false" or "0" to skip creating the welcome topic and note
    /// on an empty database. Default: true.
    pub const SEED_WELCOME_NOTE: &str = "SEED_WELCOME_NOTE";
}

/// Default values
pub mod defaults {
    pub const DATABASE_URL: &str = "./.db/mindforge.db";
    pub const DB_POOL_SIZE: u32 = 4;
    pub const SEED_WELCOME_NOTE: bool = true;
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub pool_size: u32,
    pub seed_welcome_note: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            pool_size: defaults::DB_POOL_SIZE,
            seed_welcome_note: defaults::SEED_WELCOME_NOTE,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            pool_size: parse_pool_size(env::var(env_vars::DB_POOL_SIZE).ok().as_deref()),
            seed_welcome_note: parse_flag(
                env::var(env_vars::SEED_WELCOME_NOTE).ok().as_deref(),
                defaults::SEED_WELCOME_NOTE,
            ),
        }
    }
}

fn parse_pool_size(raw: Option<&str>) -> u32 {
    match raw.map(str::trim) {
        None | Some("") => defaults::DB_POOL_SIZE,
        Some(value) => match value.parse::<u32>() {
            Ok(size) if size >= 1 => size,
            _ => {
                log::warn!(
                    "[CONFIG] Invalid {} value '{}', using {}",
                    env_vars::DB_POOL_SIZE,
                    value,
                    defaults::DB_POOL_SIZE
                );
                defaults::DB_POOL_SIZE
            }
        },
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_lowercase()) {
        None => default,
        Some(v) if v == "false" || v == "0" => false,
        Some(v) if v == "true" || v == "1" => true,
        Some(v) => {
            log::warn!("[CONFIG] Unrecognised flag value '{}', using {}", v, default);
            default
        }
    }
}
