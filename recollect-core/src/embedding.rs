//! Embedding cache and the provider seam for vector generation.
//!
//! The core never interprets a vector: it stores whatever the external
//! generator produced, keyed by a BLAKE3 digest of the whitespace-normalised
//! text. Generation itself sits behind [`EmbeddingProvider`].
//!
//! Eviction is batched. When a new key arrives at capacity, the
//! `max(1, cap/10)` entries with the lowest access count are dropped in one
//! pass (oldest insertion first among equals). Access counts and hit/miss
//! counters live only in memory and restart from zero after a reload.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EmbeddingCacheConfig;
use crate::error::{RecollectError, Result};
use crate::eviction;
use crate::persistence;
use crate::text::{content_key, index_tokens, word_hash};
use crate::types::CacheStats;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
///
/// Implementations must be `Send + Sync` so a shared cache can call them
/// from any worker.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    ///
    /// Returns [`RecollectError::Embedding`] if the model fails to produce
    /// a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts.
    ///
    /// Default implementation calls `embed` in a loop.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding in the batch fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Human-readable model name.
    fn model_name(&self) -> &str;
}

/// Provider returning zero vectors. For tests.
#[derive(Debug, Clone)]
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    /// Create a stub producing `dimensions`-long vectors.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dims])
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-zero-vector"
    }
}

/// Deterministic bag-of-words provider.
///
/// Each index token is hashed into one of `dimensions` buckets and the
/// counts are L2-normalised. No model download; texts sharing vocabulary
/// get nearby vectors. Useful as an offline fallback.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dims: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider with `dimensions` buckets.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dims == 0 {
            return Err(RecollectError::Embedding(
                "hashing provider configured with zero dimensions".to_string(),
            ));
        }
        let mut v = vec![0.0_f32; self.dims];
        for token in index_tokens(text) {
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (word_hash(&token) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }

        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag > f32::EPSILON {
            for x in &mut v {
                *x /= mag;
            }
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hashing-bag-of-words"
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    access_count: u64,
    /// Insertion sequence; breaks access-count ties.
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

impl CacheInner {
    fn insert(&mut self, key: String, vector: Vec<f32>, access_count: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, CacheEntry { vector, access_count, seq });
    }

    /// Drop the `count` least-accessed entries.
    fn evict(&mut self, count: usize) -> usize {
        let mut ranked: Vec<(u64, u64, &String)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.access_count, e.seq, k))
            .collect();
        ranked.sort_unstable();

        let victims: Vec<String> = ranked.into_iter().take(count).map(|(_, _, k)| k.clone()).collect();
        for key in &victims {
            self.entries.remove(key);
        }
        victims.len()
    }
}

/// Content-addressed, capacity-bounded store of embedding vectors.
#[derive(Debug)]
pub struct EmbeddingCache {
    max_size: usize,
    path: PathBuf,
    inner: Mutex<CacheInner>,
}

impl EmbeddingCache {
    /// Create an empty cache that saves to `path`. Nothing is read.
    ///
    /// A `max_size` of 0 is raised to 1.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            path: path.into(),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Open the cache described by `config`, restoring saved vectors.
    ///
    /// Never fails: an absent or malformed file yields an empty cache.
    #[must_use]
    pub fn open(config: &EmbeddingCacheConfig) -> Self {
        persistence::ensure_dir(&config.cache_dir);
        let cache = Self::new(config.cache_path(), config.max_size);
        cache.load();
        cache
    }

    /// Look `text` up, counting a hit or a miss.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = content_key(text);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.access_count += 1;
                inner.hits += 1;
                Some(entry.vector.clone())
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store `vector` for `text`.
    ///
    /// A new key arriving at capacity first evicts one batch. Re-putting an
    /// existing key replaces its vector and resets its access count to 1.
    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let key = content_key(text);
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.vector = vector;
            entry.access_count = 1;
            return;
        }

        if inner.entries.len() >= self.max_size {
            let start = Instant::now();
            let removed = inner.evict(eviction::batch_size(self.max_size));
            info!(
                removed,
                remaining = inner.entries.len(),
                cap = self.max_size,
                elapsed_us = start.elapsed().as_micros(),
                "Embedding cache eviction pass"
            );
        }
        inner.insert(key, vector, 1);
    }

    /// Whether a vector for `text` is cached. Does not touch counters.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.inner.lock().entries.contains_key(&content_key(text))
    }

    /// Cached vector for `text`, or embed it with `provider` and cache it.
    ///
    /// The lock is not held while the provider runs, so two callers racing
    /// on the same text may both embed it; the later put wins.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error; nothing is cached in that case.
    pub fn get_or_embed(&self, text: &str, provider: &dyn EmbeddingProvider) -> Result<Vec<f32>> {
        if let Some(vector) = self.get(text) {
            return Ok(vector);
        }
        let vector = provider.embed(text)?;
        debug!(model = provider.model_name(), dims = vector.len(), "Embedded on cache miss");
        self.put(text, vector.clone());
        Ok(vector)
    }

    /// Size and hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Number of cached vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// File this cache saves to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every entry and reset the counters. The file is untouched until
    /// the next save.
    pub fn clear(&self) {
        *self.inner.lock() = CacheInner::default();
    }

    /// Replace the contents with the vectors saved on disk.
    ///
    /// Access counts and counters restart at zero. Fail-soft.
    pub fn load(&self) {
        let (saved, _failed): (BTreeMap<String, Vec<f32>>, bool) =
            persistence::load_or_default(&self.path, "embedding_cache");

        let mut fresh = CacheInner::default();
        for (key, vector) in saved {
            fresh.insert(key, vector, 0);
        }
        let overflow = fresh.entries.len().saturating_sub(self.max_size);
        if overflow > 0 {
            fresh.evict(overflow);
            warn!(trimmed = overflow, cap = self.max_size, "Loaded cache exceeded cap");
        }

        let size = fresh.entries.len();
        *self.inner.lock() = fresh;
        debug!(size, "Embedding cache loaded");
    }

    /// Write vectors to disk (fail-soft). Counters are not saved.
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!(path = %self.path.display(), error = %e, "Embedding cache save skipped");
        }
    }

    /// Write vectors to disk.
    ///
    /// # Errors
    ///
    /// Propagates [`persistence::write_json`] failures.
    pub fn try_save(&self) -> Result<()> {
        let snapshot: BTreeMap<String, Vec<f32>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.vector.clone()))
            .collect();
        persistence::write_json(&self.path, &snapshot, false)
    }
}
