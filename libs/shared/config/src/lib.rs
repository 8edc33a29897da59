use std::env;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Tunables for the scheduling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSettings {
    pub max_active_waitlist_entries_per_patient: usize,
    pub default_waitlist_ttl_days: u32,
    pub max_waitlist_ttl_days: u32,
    pub max_block_range_days: u32,
    pub maintenance_interval_secs: u64,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            max_active_waitlist_entries_per_patient: 3,
            default_waitlist_ttl_days: 7,
            max_waitlist_ttl_days: 30,
            max_block_range_days: 365,
            maintenance_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
    pub server_port: u16,
    pub scheduling: SchedulingSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingSettings::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            storage_backend: env_or("STORAGE_BACKEND", StorageBackend::Memory),
            server_port: env_or("SERVER_PORT", 3000),
            scheduling: SchedulingSettings {
                max_active_waitlist_entries_per_patient: env_or(
                    "WAITLIST_MAX_ACTIVE_PER_PATIENT",
                    defaults.max_active_waitlist_entries_per_patient,
                ),
                default_waitlist_ttl_days: env_or(
                    "WAITLIST_DEFAULT_TTL_DAYS",
                    defaults.default_waitlist_ttl_days,
                ),
                max_waitlist_ttl_days: env_or(
                    "WAITLIST_MAX_TTL_DAYS",
                    defaults.max_waitlist_ttl_days,
                ),
                max_block_range_days: env_or(
                    "BLOCK_RANGE_MAX_DAYS",
                    defaults.max_block_range_days,
                ),
                maintenance_interval_secs: env_or(
                    "MAINTENANCE_INTERVAL_SECS",
                    defaults.maintenance_interval_secs,
                ),
            },
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("STORAGE_BACKEND=supabase but Supabase is not configured - missing environment variables");
        }

        config
    }

    /// Configuration for tests and local runs: in-memory storage, default settings.
    pub fn in_memory() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            storage_backend: StorageBackend::Memory,
            server_port: 3000,
            scheduling: SchedulingSettings::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn uses_supabase(&self) -> bool {
        self.storage_backend == StorageBackend::Supabase && self.is_configured()
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{} has invalid value '{}' ({}), using default {}", key, raw, e, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", key, default);
            default
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Supabase => write!(f, "supabase"),
        }
    }
}
