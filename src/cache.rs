use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "league_forecast";
const CACHE_FILE: &str = "forecast_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile<V> {
    version: u32,
    entries: HashMap<String, CacheEntry<V>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    computed_at: u64,
}

/// Time-boxed memo around forecast runs, keyed by competition. Lives outside
/// the forecasting core, which stays a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct ForecastCache<V> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
    path: Option<PathBuf>,
}

impl<V: Clone> ForecastCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            path: None,
        }
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.is_cached_at(key, now_secs())
    }

    pub fn is_cached_at(&self, key: &str, now: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| self.is_fresh(e, now))
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        now.saturating_sub(entry.computed_at) < self.ttl.as_secs()
    }

    pub fn get_or_compute<E>(
        &mut self,
        key: &str,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E>
    where
        E: std::fmt::Display,
    {
        self.get_or_compute_at(key, now_secs(), compute)
    }

    /// Fresh entries are returned as-is. Otherwise `compute` runs; when it
    /// fails and an expired entry exists, the expired value is served instead
    /// of surfacing a partial result.
    pub fn get_or_compute_at<E>(
        &mut self,
        key: &str,
        now: u64,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E>
    where
        E: std::fmt::Display,
    {
        if let Some(entry) = self.entries.get(key) {
            if self.is_fresh(entry, now) {
                debug!(key, "forecast cache hit");
                return Ok(entry.value.clone());
            }
        }

        match compute() {
            Ok(value) => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        computed_at: now,
                    },
                );
                Ok(value)
            }
            Err(err) => match self.entries.get(key) {
                Some(stale) => {
                    warn!(key, %err, "forecast failed, serving expired result");
                    Ok(stale.value.clone())
                }
                None => Err(err),
            },
        }
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone + Serialize + DeserializeOwned> ForecastCache<V> {
    /// Opens a file-backed cache. Missing, unreadable or outdated files start empty.
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let entries = load_cache_file::<V>(&path)
            .map(|file| file.entries)
            .unwrap_or_default();
        Self {
            ttl,
            entries,
            path: Some(path),
        }
    }

    /// Writes the cache through a temp file so readers never see half a file.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("create forecast cache dir")?;
        }
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(&file).context("serialize forecast cache")?;
        fs::write(&tmp, json).context("write forecast cache")?;
        fs::rename(&tmp, path).context("swap forecast cache")?;
        Ok(())
    }
}

fn load_cache_file<V: DeserializeOwned>(path: &Path) -> Option<CacheFile<V>> {
    let raw = fs::read_to_string(path).ok()?;
    let cache = serde_json::from_str::<CacheFile<V>>(&raw).ok()?;
    if cache.version != CACHE_VERSION {
        return None;
    }
    Some(cache)
}

pub fn default_cache_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(CACHE_FILE))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(v: u32) -> impl FnOnce() -> Result<u32, String> {
        move || Ok(v)
    }

    #[test]
    fn fresh_entries_skip_recompute() {
        let mut cache = ForecastCache::new(Duration::from_secs(3600));
        assert_eq!(cache.get_or_compute_at("bundesliga", 1000, ok(1)), Ok(1));
        assert_eq!(cache.get_or_compute_at("bundesliga", 2000, ok(2)), Ok(1));
        assert!(cache.is_cached_at("bundesliga", 4599));
        assert!(!cache.is_cached_at("bundesliga", 4600));
        assert_eq!(cache.get_or_compute_at("bundesliga", 4600, ok(3)), Ok(3));
    }

    #[test]
    fn failed_refresh_serves_expired_value() {
        let mut cache = ForecastCache::new(Duration::from_secs(10));
        cache.get_or_compute_at("laliga", 0, ok(7)).unwrap();
        let res = cache.get_or_compute_at("laliga", 100, || Err("boom".to_string()));
        assert_eq!(res, Ok(7));

        let res = cache.get_or_compute_at("serie_a", 100, || Err::<u32, _>("boom".to_string()));
        assert_eq!(res, Err("boom".to_string()));
        assert!(!cache.is_cached_at("serie_a", 100));
    }

    #[test]
    fn invalidate_and_clear() {
        let mut cache = ForecastCache::new(Duration::from_secs(60));
        cache.get_or_compute_at("a", 0, ok(1)).unwrap();
        cache.get_or_compute_at("b", 0, ok(2)).unwrap();
        cache.invalidate("a");
        assert!(!cache.is_cached_at("a", 1));
        assert!(cache.is_cached_at("b", 1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn persists_through_a_file() {
        let dir = std::env::temp_dir().join(format!("league_forecast_cache_{}", std::process::id()));
        let path = dir.join(CACHE_FILE);
        let mut cache = ForecastCache::<Vec<f64>>::open(path.clone(), Duration::from_secs(60));
        let now = now_secs();
        cache
            .get_or_compute_at("ligue1", now, || Ok::<_, String>(vec![1.5, 2.5]))
            .unwrap();
        cache.save().unwrap();

        let reopened = ForecastCache::<Vec<f64>>::open(path.clone(), Duration::from_secs(60));
        assert!(reopened.is_cached_at("ligue1", now));

        fs::write(&path, "{\"version\":0,\"entries\":{}}").unwrap();
        let outdated = ForecastCache::<Vec<f64>>::open(path, Duration::from_secs(60));
        assert!(outdated.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn save_reports_an_unusable_cache_dir() {
        let blocker = std::env::temp_dir()
            .join(format!("league_forecast_blocker_{}", std::process::id()));
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("nested").join(CACHE_FILE);
        let mut cache = ForecastCache::<u32>::open(path, Duration::from_secs(60));
        cache.get_or_compute_at("epl", now_secs(), ok(3)).unwrap();

        let err = cache.save().unwrap_err();
        assert!(format!("{err:#}").contains("create forecast cache dir"), "{err:#}");
        let _ = fs::remove_file(blocker);
    }
}
