use std::env;
use std::time::Duration;

use crate::season::DEFAULT_TRIALS;

const DEFAULT_THREADS: usize = 4;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub trials: usize,
    /// Fixed seed for reproducible runs; a fresh one is drawn per run when unset.
    pub seed: Option<u64>,
    pub threads: usize,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: None,
            threads: DEFAULT_THREADS,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Settings {
    /// Reads `.env.local` then `.env` (neither is required) and the process env.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|val| val.trim().parse::<u64>().ok());
        let d = Self::default();
        Self {
            trials: parse("FORECAST_TRIALS")
                .map(|v| v as usize)
                .unwrap_or(d.trials)
                .max(1),
            seed: parse("FORECAST_SEED"),
            threads: parse("FORECAST_THREADS")
                .map(|v| v as usize)
                .unwrap_or(d.threads)
                .clamp(1, 32),
            cache_ttl: parse("FORECAST_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.cache_ttl),
        }
    }
}
