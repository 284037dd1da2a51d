//! Configuration management

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::*;
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub app: AppSettings,
    pub session: SessionSettings,
    pub hashing: HashingSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    pub env: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Loaded for a future signed-cookie scheme; nothing signs with it yet.
    pub secret: String,
    pub lifetime_minutes: i64,
    pub secure_cookie: bool,
    pub reap_strategy: ReapMode,
    pub sweep_interval_secs: u64,
    pub allow_insecure_id_fallback: bool,
}

/// How expired sessions get evicted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReapMode {
    /// Sweep after every session creation.
    OnCreate,
    /// Sweep from a background task every `sweep_interval_secs`.
    Periodic,
    /// Only sweep when asked to.
    Manual,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HashingSettings {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub key_length: usize,
    pub salt_length: usize,
}

impl AppConfig {
    /// Defaults, then `config/default`, then `config/<GOING_ENV>`, then
    /// `GOING_<SECTION>__<KEY>` environment variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let env = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.into());
        let config = Self::with_defaults()?
            .set_override("app.env", env.clone())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that deserialize fine but would break the session store.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetime = self.session.lifetime_minutes;
        if !(1..=MAX_SESSION_LIFETIME_MINUTES).contains(&lifetime) {
            return Err(ConfigError::Message(format!(
                "session.lifetime_minutes must be between 1 and {}, got {}",
                MAX_SESSION_LIFETIME_MINUTES, lifetime
            )));
        }
        Ok(())
    }

    /// Builder seeded with every default, so partial config files are enough.
    pub fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("app.env", DEFAULT_ENV)?
            .set_default("app.name", DEFAULT_APP_NAME)?
            .set_default("app.host", DEFAULT_HOST)?
            .set_default("app.port", i64::from(DEFAULT_PORT))?
            .set_default("session.cookie_name", DEFAULT_SESSION_COOKIE_NAME)?
            .set_default("session.secret", DEFAULT_SESSION_SECRET)?
            .set_default("session.lifetime_minutes", DEFAULT_SESSION_LIFETIME_MINUTES)?
            .set_default("session.secure_cookie", false)?
            .set_default("session.reap_strategy", "on_create")?
            .set_default("session.sweep_interval_secs", DEFAULT_SWEEP_INTERVAL_SECS as i64)?
            .set_default("session.allow_insecure_id_fallback", true)?
            .set_default("hashing.memory_kib", i64::from(DEFAULT_HASH_MEMORY_KIB))?
            .set_default("hashing.time_cost", i64::from(DEFAULT_HASH_TIME_COST))?
            .set_default("hashing.parallelism", i64::from(DEFAULT_HASH_PARALLELISM))?
            .set_default("hashing.key_length", DEFAULT_HASH_KEY_LENGTH as i64)?
            .set_default("hashing.salt_length", DEFAULT_HASH_SALT_LENGTH as i64)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session.secret == DEFAULT_SESSION_SECRET
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings {
                env: DEFAULT_ENV.to_string(),
                name: DEFAULT_APP_NAME.to_string(),
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            session: SessionSettings {
                cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
                secret: DEFAULT_SESSION_SECRET.to_string(),
                lifetime_minutes: DEFAULT_SESSION_LIFETIME_MINUTES,
                secure_cookie: false,
                reap_strategy: ReapMode::OnCreate,
                sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
                allow_insecure_id_fallback: true,
            },
            hashing: HashingSettings {
                memory_kib: DEFAULT_HASH_MEMORY_KIB,
                time_cost: DEFAULT_HASH_TIME_COST,
                parallelism: DEFAULT_HASH_PARALLELISM,
                key_length: DEFAULT_HASH_KEY_LENGTH,
                salt_length: DEFAULT_HASH_SALT_LENGTH,
            },
        }
    }
}
