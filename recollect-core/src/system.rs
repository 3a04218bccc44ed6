//! Top-level bundle wiring every store from one [`RecollectConfig`].
//!
//! The caller drives it one completed turn at a time through
//! [`MemorySystem::record_turn`]. Disk writes are blocking, so async hosts
//! should use [`MemorySystem::spawn_save`] or [`MemorySystem::spawn_autosave`]
//! to move them onto tokio's blocking pool.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::RecollectConfig;
use crate::embedding::EmbeddingCache;
use crate::error::{RecollectError, Result};
use crate::memory::MemoryEngine;
use crate::thread::ThreadTracker;
use crate::types::{EpisodeId, Role};

/// Memory engine, embedding cache and thread tracker behind one handle.
#[derive(Debug)]
pub struct MemorySystem {
    config: RecollectConfig,
    engine: MemoryEngine,
    cache: EmbeddingCache,
    threads: ThreadTracker,
}

impl MemorySystem {
    /// Build every component from `config`, restoring persisted state.
    #[must_use]
    pub fn from_config(config: RecollectConfig) -> Self {
        let engine = MemoryEngine::open_with(config.memory.clone(), config.persistence.pretty);
        let cache = EmbeddingCache::open(&config.embedding_cache);
        let threads = ThreadTracker::new(config.threads.clone());
        info!(
            episodes = engine.episodic().len(),
            cached_vectors = cache.len(),
            "Memory system ready"
        );
        Self {
            config,
            engine,
            cache,
            threads,
        }
    }

    /// Load `recollect.toml`-style configuration from `path` and build.
    ///
    /// # Errors
    ///
    /// Returns the config error if the file cannot be read or is invalid.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::from_config(RecollectConfig::from_file(path)?))
    }

    /// Record one completed exchange everywhere it belongs.
    ///
    /// Working memory, the episodic log and the thread tracker are each
    /// updated under their own lock; there is no atomicity across them.
    pub fn record_turn(&self, user_input: &str, response: &str, emotion: &str, importance: u32) -> EpisodeId {
        self.engine.add_to_working(Role::User, user_input);
        self.engine.add_to_working(Role::Assistant, response);
        let id = self.engine.add_episode(user_input, response, emotion, importance);
        self.threads.update(user_input, response);
        id
    }

    /// Flush episodic, semantic and cache files (fail-soft).
    pub fn save_all(&self) {
        let start = Instant::now();
        self.engine.save();
        self.cache.save();
        debug!(elapsed_us = start.elapsed().as_micros(), "Memory system saved");
    }

    /// Flush everything, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first I/O or serialization error.
    pub fn try_save_all(&self) -> Result<()> {
        self.engine.try_save()?;
        self.cache.try_save()
    }

    /// Run [`save_all`](Self::save_all) on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_save(system: &Arc<Self>) -> JoinHandle<()> {
        let system = Arc::clone(system);
        task::spawn_blocking(move || system.save_all())
    }

    /// Run [`try_save_all`](Self::try_save_all) on the blocking pool and
    /// wait for it.
    ///
    /// # Errors
    ///
    /// Returns the save error, or [`RecollectError::BackgroundTask`] if the
    /// worker panicked or was cancelled.
    pub async fn save_in_background(system: &Arc<Self>) -> Result<()> {
        let system = Arc::clone(system);
        task::spawn_blocking(move || system.try_save_all())
            .await
            .map_err(|e| RecollectError::BackgroundTask(e.to_string()))?
    }

    /// Save every `period` until the returned handle is aborted.
    ///
    /// The first save happens one full period after the call.
    pub fn spawn_autosave(system: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let system = Arc::clone(system);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;
                let worker = Arc::clone(&system);
                if let Err(e) = task::spawn_blocking(move || worker.save_all()).await {
                    warn!(error = %e, "Auto-save worker failed");
                }
            }
        })
    }

    /// Auto-save period from the persistence config.
    #[must_use]
    pub fn autosave_period(&self) -> Duration {
        Duration::from_secs(self.config.persistence.auto_save_interval_seconds)
    }

    /// The memory engine.
    #[must_use]
    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    /// The embedding cache.
    #[must_use]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// The thread tracker.
    #[must_use]
    pub fn threads(&self) -> &ThreadTracker {
        &self.threads
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &RecollectConfig {
        &self.config
    }
}
