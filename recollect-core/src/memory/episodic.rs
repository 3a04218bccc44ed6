//! Episodic Memory: "what was said".
//!
//! An append-only log of completed dialogue turns, bounded by a cap. The
//! store owns the [`KeywordIndex`] built over its episodes and keeps both
//! behind one lock, so a query never observes a half-rebuilt index.
//!
//! Overflow triggers one batched eviction pass (see [`crate::eviction`]).
//! Episode ids are stable surrogates: eviction removes entries without
//! renumbering the survivors.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::eviction::{self, Candidate};
use crate::index::KeywordIndex;
use crate::persistence;
use crate::text::{extract_keywords, truncate_chars};
use crate::types::{EpisodeId, RelevantEpisode};

/// One recorded dialogue turn. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Stable identifier (absent in legacy files; reassigned on load).
    #[serde(default)]
    pub id: EpisodeId,
    /// When the turn completed.
    pub timestamp: DateTime<Utc>,
    /// What the user said.
    pub user_input: String,
    /// What the agent answered.
    pub response: String,
    /// Emotion label attached by the caller.
    #[serde(default)]
    pub emotion: String,
    /// Caller-assigned weight; multiplies relevance and slows eviction.
    pub importance: u32,
    /// Up to `max_keywords` normalised topic words from the input and
    /// response, input first.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Result of [`EpisodicStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Id given to the new episode.
    pub id: EpisodeId,
    /// How many episodes the triggered eviction pass removed (0 if none).
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct EpisodicInner {
    /// Always sorted by ascending id.
    episodes: Vec<Episode>,
    index: KeywordIndex,
    next_id: u64,
}

impl EpisodicInner {
    fn position(&self, id: EpisodeId) -> Option<usize> {
        self.episodes.binary_search_by_key(&id, |e| e.id).ok()
    }

    /// Reassign ids `0..len` in stored order and rebuild the index.
    fn renumber(&mut self) {
        for (i, ep) in self.episodes.iter_mut().enumerate() {
            ep.id = EpisodeId(i as u64);
        }
        self.next_id = self.episodes.len() as u64;
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let Self { episodes, index, .. } = self;
        index.rebuild(
            episodes
                .iter()
                .map(|e| (e.id, e.user_input.as_str(), e.response.as_str())),
        );
    }

    /// Remove the `count` weakest episodes and rebuild the index.
    fn evict(&mut self, count: usize, now: DateTime<Utc>) -> usize {
        if count == 0 || self.episodes.is_empty() {
            return 0;
        }
        let victims = eviction::select_victims(
            self.episodes.iter().map(|e| Candidate {
                id: e.id,
                importance: e.importance,
                timestamp: e.timestamp,
            }),
            count,
            now,
        );

        let before = self.episodes.len();
        self.episodes.retain(|e| victims.binary_search(&e.id).is_err());
        self.rebuild_index();
        before - self.episodes.len()
    }
}

/// Thread-safe, capped episode log with keyword relevance search.
#[derive(Debug)]
pub struct EpisodicStore {
    capacity: usize,
    max_keywords: usize,
    preview_chars: usize,
    inner: Mutex<EpisodicInner>,
}

impl EpisodicStore {
    /// Create an empty store holding at most `capacity` episodes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let defaults = MemoryConfig::default();
        Self {
            capacity,
            max_keywords: defaults.max_keywords,
            preview_chars: defaults.preview_chars,
            inner: Mutex::new(EpisodicInner::default()),
        }
    }

    /// Create an empty store sized from `config`.
    #[must_use]
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            capacity: config.max_episodic,
            max_keywords: config.max_keywords,
            preview_chars: config.preview_chars,
            inner: Mutex::new(EpisodicInner::default()),
        }
    }

    /// Record a turn stamped with the current time.
    pub fn add(&self, user_input: &str, response: &str, emotion: &str, importance: u32) -> AddOutcome {
        self.add_at(user_input, response, emotion, importance, Utc::now())
    }

    /// Record a turn that completed at `timestamp`.
    ///
    /// `timestamp` also serves as "now" for the eviction pass this insert
    /// may trigger.
    pub fn add_at(
        &self,
        user_input: &str,
        response: &str,
        emotion: &str,
        importance: u32,
        timestamp: DateTime<Utc>,
    ) -> AddOutcome {
        let keywords = extract_keywords(&format!("{user_input} {response}"), self.max_keywords);

        let mut inner = self.inner.lock();
        if inner.next_id == u64::MAX {
            warn!(count = inner.episodes.len(), "Episode id space exhausted, renumbering");
            inner.renumber();
        }
        let id = EpisodeId(inner.next_id);
        inner.next_id += 1;

        inner.index.insert(id, user_input);
        inner.index.insert(id, response);
        inner.episodes.push(Episode {
            id,
            timestamp,
            user_input: user_input.to_string(),
            response: response.to_string(),
            emotion: emotion.to_string(),
            importance,
            keywords,
        });

        let mut evicted = 0;
        if inner.episodes.len() > self.capacity {
            let start = Instant::now();
            evicted = inner.evict(eviction::batch_size(self.capacity), timestamp);
            info!(
                removed = evicted,
                remaining = inner.episodes.len(),
                cap = self.capacity,
                elapsed_us = start.elapsed().as_micros(),
                "Episodic eviction pass"
            );
        }

        debug!(episode = %id, importance, "Episode recorded");
        AddOutcome { id, evicted }
    }

    /// Rank stored episodes against `query` by term overlap × importance.
    ///
    /// Returns at most `max_items` hits, best first; equal scores keep
    /// insertion order. No matching term is an empty result, not an error.
    #[must_use]
    pub fn query(&self, query: &str, max_items: usize) -> Vec<RelevantEpisode> {
        let start = Instant::now();
        let inner = self.inner.lock();

        let mut results: Vec<RelevantEpisode> = inner
            .index
            .match_counts(query)
            .into_iter()
            .filter_map(|(id, matches)| {
                let ep = &inner.episodes[inner.position(id)?];
                Some(RelevantEpisode {
                    id,
                    timestamp: ep.timestamp,
                    preview: truncate_chars(&ep.user_input, self.preview_chars),
                    score: matches * u64::from(ep.importance),
                })
            })
            .collect();
        drop(inner);

        results.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        results.truncate(max_items);

        debug!(
            hits = results.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Episodic relevance query"
        );
        results
    }

    /// Run one eviction pass now, regardless of fill level.
    ///
    /// Returns the number of episodes removed.
    pub fn evict_at(&self, now: DateTime<Utc>) -> usize {
        self.inner.lock().evict(eviction::batch_size(self.capacity), now)
    }

    /// Episode with the given id, if it is still stored.
    #[must_use]
    pub fn get(&self, id: EpisodeId) -> Option<Episode> {
        let inner = self.inner.lock();
        inner.position(id).map(|i| inner.episodes[i].clone())
    }

    /// All stored episodes in insertion order.
    #[must_use]
    pub fn episodes(&self) -> Vec<Episode> {
        self.inner.lock().episodes.clone()
    }

    /// Number of stored episodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().episodes.len()
    }

    /// Whether no episode is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().episodes.is_empty()
    }

    /// Configured cap.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the contents with episodes read from disk.
    ///
    /// Ids that are missing, not strictly increasing, or that would leave no
    /// room for a next id are reassigned in file order. A snapshot larger than the cap is trimmed by eviction.
    /// Returns the number of episodes trimmed.
    pub(crate) fn replace(&self, episodes: Vec<Episode>) -> usize {
        let ids_valid = episodes.windows(2).all(|w| w[0].id < w[1].id)
            && episodes.last().is_none_or(|e| e.id.0 < u64::MAX);
        let mut inner = self.inner.lock();
        inner.episodes = episodes;
        if ids_valid {
            inner.next_id = inner.episodes.last().map_or(0, |e| e.id.0 + 1);
            inner.rebuild_index();
        } else {
            warn!(count = inner.episodes.len(), "Episode ids out of order, reassigning");
            inner.renumber();
        }

        let overflow = inner.episodes.len().saturating_sub(self.capacity);
        if overflow > 0 {
            let trimmed = inner.evict(overflow, Utc::now());
            warn!(trimmed, cap = self.capacity, "Loaded snapshot exceeded cap");
            return trimmed;
        }
        0
    }

    /// Write all episodes to `path` as a JSON array.
    ///
    /// The lock is released before any file I/O starts.
    ///
    /// # Errors
    ///
    /// Propagates [`persistence::write_json`] failures.
    pub fn save_to(&self, path: &Path, pretty: bool) -> Result<()> {
        let snapshot = self.episodes();
        persistence::write_json(path, &snapshot, pretty)
    }
}
