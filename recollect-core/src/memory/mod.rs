//! Memory tiers and the [`MemoryEngine`] that aggregates them.
//!
//! - **Working**: bounded FIFO of raw turns, never persisted.
//! - **Episodic**: capped log of completed turns with a keyword index.
//! - **Semantic**: unbounded key→value facts.
//!
//! Each tier owns one lock. The engine adds no lock of its own, so there is
//! no atomicity across tiers: recording a turn in working memory and in the
//! episodic log are two separate critical sections.

pub mod episodic;
pub mod semantic;
pub mod working;

pub use episodic::{AddOutcome, Episode, EpisodicStore};
pub use semantic::SemanticStore;
pub use working::WorkingMemory;

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::metrics::{CounterSnapshot, MemoryCounters};
use crate::persistence;
use crate::types::{EpisodeId, MemoryStats, RelevantEpisode, Role, WorkingEntry};

/// Working, episodic and semantic memory behind one API.
#[derive(Debug)]
pub struct MemoryEngine {
    config: MemoryConfig,
    pretty: bool,
    working: WorkingMemory,
    episodic: EpisodicStore,
    semantic: SemanticStore,
    counters: MemoryCounters,
}

impl MemoryEngine {
    /// Open the engine rooted at `config.data_dir`, restoring any snapshot.
    ///
    /// Never fails: a missing directory is created, and unreadable or
    /// malformed files leave the matching store empty (logged).
    #[must_use]
    pub fn open(config: MemoryConfig) -> Self {
        Self::open_with(config, true)
    }

    /// Like [`open`](Self::open), choosing whether saved JSON is
    /// pretty-printed.
    #[must_use]
    pub fn open_with(config: MemoryConfig, pretty: bool) -> Self {
        persistence::ensure_dir(&config.data_dir);

        let engine = Self {
            working: WorkingMemory::new(config.working_size),
            episodic: EpisodicStore::from_config(&config),
            semantic: SemanticStore::new(),
            counters: MemoryCounters::new(),
            pretty,
            config,
        };
        engine.load();

        info!(
            dir = %engine.config.data_dir.display(),
            episodes = engine.episodic.len(),
            facts = engine.semantic.len(),
            "Memory engine opened"
        );
        engine
    }

    // ------------------------------------------------------------------
    // Working memory
    // ------------------------------------------------------------------

    /// Push a raw turn into working memory.
    pub fn add_to_working(&self, role: Role, content: &str) {
        self.working.push(WorkingEntry::now(role, content));
    }

    /// Working memory, oldest first.
    #[must_use]
    pub fn get_working_memory(&self) -> Vec<WorkingEntry> {
        self.working.snapshot()
    }

    /// Empty working memory.
    pub fn clear_working(&self) {
        self.working.clear();
    }

    // ------------------------------------------------------------------
    // Episodic memory
    // ------------------------------------------------------------------

    /// Record a completed turn in long-term memory.
    pub fn add_episode(&self, user_input: &str, response: &str, emotion: &str, importance: u32) -> EpisodeId {
        let outcome = self.episodic.add(user_input, response, emotion, importance);
        MemoryCounters::incr(&self.counters.episodes_added);
        if outcome.evicted > 0 {
            MemoryCounters::incr(&self.counters.eviction_passes);
            MemoryCounters::add(&self.counters.episodes_evicted, outcome.evicted as u64);
        }
        outcome.id
    }

    /// Episodes most relevant to `query`, best first.
    #[must_use]
    pub fn get_relevant_context(&self, query: &str, max_items: usize) -> Vec<RelevantEpisode> {
        self.episodic.query(query, max_items)
    }

    // ------------------------------------------------------------------
    // Semantic memory
    // ------------------------------------------------------------------

    /// Store a fact, replacing any previous value.
    pub fn add_semantic(&self, key: &str, value: &str) {
        self.semantic.set(key, value);
    }

    /// Look a fact up.
    #[must_use]
    pub fn get_semantic(&self, key: &str) -> Option<String> {
        self.semantic.get(key)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Flush episodic and semantic memory to disk.
    ///
    /// Failures are logged and the affected file is left as it was.
    /// Blocks on file I/O; keep it off latency-sensitive paths.
    pub fn save(&self) {
        let episodic_path = self.config.episodic_path();
        match self.episodic.save_to(&episodic_path, self.pretty) {
            Ok(()) => MemoryCounters::incr(&self.counters.saves_completed),
            Err(e) => {
                MemoryCounters::incr(&self.counters.save_failures);
                warn!(path = %episodic_path.display(), error = %e, "Episodic save skipped");
            }
        }

        let semantic_path = self.config.semantic_path();
        match self.semantic.save_to(&semantic_path, self.pretty) {
            Ok(()) => MemoryCounters::incr(&self.counters.saves_completed),
            Err(e) => {
                MemoryCounters::incr(&self.counters.save_failures);
                warn!(path = %semantic_path.display(), error = %e, "Semantic save skipped");
            }
        }
    }

    /// Flush to disk, returning the first failure.
    ///
    /// # Errors
    ///
    /// Returns the I/O or serialization error of the first file that could
    /// not be written.
    pub fn try_save(&self) -> Result<()> {
        self.episodic.save_to(&self.config.episodic_path(), self.pretty)?;
        self.semantic.save_to(&self.config.semantic_path(), self.pretty)?;
        MemoryCounters::add(&self.counters.saves_completed, 2);
        Ok(())
    }

    /// Re-read both snapshots from disk, replacing in-memory state.
    ///
    /// A file that cannot be loaded resets its store to empty. The keyword
    /// index is always rebuilt from the loaded episodes.
    pub fn load(&self) {
        let (episodes, failed): (Vec<Episode>, bool) =
            persistence::load_or_default(&self.config.episodic_path(), "episodic");
        if failed {
            MemoryCounters::incr(&self.counters.load_failures);
        }
        let trimmed = self.episodic.replace(episodes);
        if trimmed > 0 {
            MemoryCounters::add(&self.counters.episodes_evicted, trimmed as u64);
        }

        let (facts, failed): (HashMap<String, String>, bool) =
            persistence::load_or_default(&self.config.semantic_path(), "semantic");
        if failed {
            MemoryCounters::incr(&self.counters.load_failures);
        }
        self.semantic.replace(facts);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Entry counts per tier.
    #[must_use]
    pub fn get_stats(&self) -> MemoryStats {
        MemoryStats {
            working_count: self.working.len(),
            episodic_count: self.episodic.len(),
            semantic_count: self.semantic.len(),
        }
    }

    /// Runtime counters since open.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// The working tier.
    #[must_use]
    pub fn working(&self) -> &WorkingMemory {
        &self.working
    }

    /// The episodic tier.
    #[must_use]
    pub fn episodic(&self) -> &EpisodicStore {
        &self.episodic
    }

    /// The semantic tier.
    #[must_use]
    pub fn semantic(&self) -> &SemanticStore {
        &self.semantic
    }

    /// Configuration the engine was opened with.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}
