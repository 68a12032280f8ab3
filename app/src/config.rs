use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use infra::PostgresConfig;
use log::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "RUSTBAR_";

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct Config {
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AuthConfig {
    #[serde(default)]
    pub signing_key: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// bcrypt work factor for stored passwords.
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

/// Settings that may be supplied through `RUSTBAR_*` variables instead of
/// the config file, so secrets need not live on disk.
#[derive(Deserialize, Debug, Default)]
struct EnvOverrides {
    signing_key: Option<String>,
    postgres_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug, Default)]
pub struct EnvLogger {
    level: Option<LogLevel>,
    #[serde(default)]
    modules: HashMap<String, LogLevel>,
    #[serde(default)]
    timestamp_nanos: bool,
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_password_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            signing_key: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            password_cost: default_password_cost(),
        }
    }
}

/// Reads a TOML document from `path`.
pub fn from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut config_buf = String::new();
    File::open(path)
        .with_context(|| format!("open {:?}", path))?
        .read_to_string(&mut config_buf)?;
    let config = toml::from_str(&config_buf).with_context(|| format!("parse {:?}", path))?;
    Ok(config)
}

impl Config {
    pub fn apply_env(&mut self) -> Result<()> {
        let overrides = envy::prefixed(ENV_PREFIX)
            .from_env::<EnvOverrides>()
            .context("read environment")?;
        self.apply(overrides);
        Ok(())
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(key) = overrides.signing_key {
            debug!("Signing key taken from ${}SIGNING_KEY", ENV_PREFIX);
            self.auth.signing_key = key;
        }
        if let Some(url) = overrides.postgres_url {
            debug!("Postgres url taken from ${}POSTGRES_URL", ENV_PREFIX);
            self.postgres.url = url;
        }
    }
}

impl LogLevel {
    fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level {
            b.filter_level(level.to_filter());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(module, level.to_filter());
        }

        if self.timestamp_nanos {
            b.format_timestamp_nanos();
        }

        b
    }
}
