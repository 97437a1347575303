//! File cache + daily call limit around any oracle transport.
//!
//! Cache hits never count against the limit; only successful remote calls do.
//! A slot is reserved before each remote call and given back if the call fails.
//! Counter and cache files are written via tmp-file + rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{OracleError, OracleFuture, OracleTransport, OutputSchema};

pub struct CachingTransport<T: OracleTransport> {
    inner: T,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Mutex<DailyCounter>,
}

impl<T: OracleTransport> CachingTransport<T> {
    pub fn new(inner: T, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!(error = %e, dir = %cache_dir.display(), "oracle cache dir not created");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    /// Remote calls made today.
    pub fn calls_today(&self) -> u32 {
        let g = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        if g.is_expired() {
            0
        } else {
            g.count
        }
    }

    /// Give back a reserved slot after a failed remote call.
    fn refund(&self) {
        let mut g = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        if !g.is_expired() {
            g.count = g.count.saturating_sub(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
    }

    async fn complete_impl(&self, prompt: &str, schema: &OutputSchema) -> Result<String, OracleError> {
        let key = cache_key(prompt, schema);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            counter!("oracle_cache_hits_total").increment(1);
            return Ok(hit.response);
        }

        // Reserve a slot before the remote call so concurrent callers see it.
        {
            let mut g = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            if g.is_expired() {
                g.reset_to_today();
            }
            if g.count >= self.daily_limit_max {
                return Err(OracleError::DailyLimit(self.daily_limit_max));
            }
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }

        let response = match self.inner.complete(prompt, schema).await {
            Ok(r) => r,
            Err(e) => {
                self.refund();
                return Err(e);
            }
        };

        let entry = CacheEntry {
            schema: schema.name.to_string(),
            response: response.clone(),
        };
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &entry) {
            tracing::debug!(error = %e, "oracle cache write failed");
        }
        Ok(response)
    }
}

impl<T: OracleTransport> OracleTransport for CachingTransport<T> {
    fn complete<'a>(&'a self, prompt: &'a str, schema: &'a OutputSchema) -> OracleFuture<'a, String> {
        Box::pin(self.complete_impl(prompt, schema))
    }

    fn discard(&self, prompt: &str, schema: &OutputSchema) {
        let path = cache_path(&self.cache_dir, &cache_key(prompt, schema));
        let _ = fs::remove_file(path);
        self.inner.discard(prompt, schema);
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    schema: String,
    response: String,
}

fn cache_key(prompt: &str, schema: &OutputSchema) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema.name.as_bytes());
    hasher.update(b"\n");
    hasher.update(prompt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CacheEntry> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(contents)?;
    fs::rename(tmp, path)
}

fn write_cache_file(dir: &Path, key: &str, entry: &CacheEntry) -> io::Result<()> {
    let json = serde_json::to_vec(entry).map_err(io::Error::other)?;
    write_atomic(&cache_path(dir, key), &json)
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }

    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let json = serde_json::to_vec(dc).map_err(io::Error::other)?;
    write_atomic(&counter_path(dir), &json)
}
