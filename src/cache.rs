//! File-backed response cache with a time-to-live.
//!
//! One JSON file per `(resource_id, filters)` key under the cache directory.
//! Expiry is checked when an entry is read; a stale entry is deleted by the
//! read that finds it. Unreadable or corrupt entries are misses, never
//! errors. Concurrent writers to the same key race and the last one wins.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data::RawRecord;

pub const DEFAULT_TTL_HOURS: u32 = 24;
const ENTRY_EXTENSION: &str = "json";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Query filters; keys are kept sorted so the cache key does not depend on
/// insertion order.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: DateTime<Utc>,
    resource_id: String,
    filters: Filters,
    data: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
}

#[derive(Debug, Clone)]
pub struct DataCache {
    dir: PathBuf,
    ttl: TimeDelta,
}

impl DataCache {
    /// Opens (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, ttl: TimeDelta) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("Creating cache directory {dir:?}"))?;
        Ok(Self { dir, ttl })
    }

    pub fn with_ttl_hours(dir: impl Into<PathBuf>, hours: u32) -> Result<Self> {
        Self::new(dir, TimeDelta::hours(i64::from(hours)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Hex SHA-256 of the resource id and the sorted filters.
    pub fn key(resource_id: &str, filters: &Filters) -> String {
        let encoded = serde_json::to_string(filters).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(resource_id.as_bytes());
        hasher.update(b"_");
        hasher.update(encoded.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    pub fn get(&self, resource_id: &str, filters: &Filters) -> Option<Vec<RawRecord>> {
        self.get_at(resource_id, filters, Utc::now())
    }

    /// Lookup as of `now`.
    pub fn get_at(
        &self,
        resource_id: &str,
        filters: &Filters,
        now: DateTime<Utc>,
    ) -> Option<Vec<RawRecord>> {
        let path = self.entry_path(&Self::key(resource_id, filters));
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(_) => {
                debug!("Cache miss for {resource_id} {filters:?}");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_reader(BufReader::new(file)) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Ignoring unreadable cache entry {path:?}: {err}");
                return None;
            }
        };
        if now - entry.timestamp > self.ttl {
            debug!("Cache entry {path:?} is stale; removing");
            if let Err(err) = fs::remove_file(&path) {
                debug!("Failed to remove stale cache entry {path:?}: {err}");
            }
            return None;
        }
        debug!("Cache hit for {resource_id} ({} records)", entry.data.len());
        Some(entry.data)
    }

    pub fn set(&self, resource_id: &str, filters: &Filters, records: &[RawRecord]) -> Result<()> {
        self.set_at(resource_id, filters, records, Utc::now())
    }

    /// Stores `records` stamped with `timestamp`, replacing any existing
    /// entry for the key.
    pub fn set_at(
        &self,
        resource_id: &str,
        filters: &Filters,
        records: &[RawRecord],
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CacheEntry {
            timestamp,
            resource_id: resource_id.to_string(),
            filters: filters.clone(),
            data: records.to_vec(),
        };
        let path = self.entry_path(&Self::key(resource_id, filters));
        let staging = path.with_extension("tmp");
        {
            let file = File::create(&staging)
                .with_context(|| format!("Creating cache entry {staging:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &entry)
                .with_context(|| format!("Serializing cache entry for {resource_id}"))?;
            writer
                .flush()
                .with_context(|| format!("Writing cache entry {staging:?}"))?;
        }
        fs::rename(&staging, &path)
            .with_context(|| format!("Moving cache entry into place at {path:?}"))?;
        debug!("Cached {} records for {resource_id}", records.len());
        Ok(())
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Listing cache directory {:?}", self.dir))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Reading cache directory {:?}", self.dir))?
                .path();
            let is_entry = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
            if is_entry {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Removes every entry and returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        let files = self.entry_files()?;
        for path in &files {
            fs::remove_file(path).with_context(|| format!("Removing cache entry {path:?}"))?;
        }
        Ok(files.len())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let files = self.entry_files()?;
        let mut total_size_bytes = 0u64;
        for path in &files {
            let metadata =
                fs::metadata(path).with_context(|| format!("Reading metadata for {path:?}"))?;
            total_size_bytes += metadata.len();
        }
        Ok(CacheStats {
            file_count: files.len(),
            total_size_bytes,
            total_size_mb: megabytes(total_size_bytes),
        })
    }
}

fn megabytes(bytes: u64) -> f64 {
    (Decimal::from(bytes) / Decimal::from(BYTES_PER_MB))
        .round_dp(2)
        .to_f64()
        .unwrap_or_default()
}
