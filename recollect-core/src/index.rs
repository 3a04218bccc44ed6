//! Inverted keyword index over episodes.
//!
//! Maps `word_hash(token)` to the episodes whose input+response text
//! contains that token. A bucket lists an episode once per occurrence, so a
//! term repeated inside one episode weighs more in scoring. The index is
//! derived data: it is never persisted and is rebuilt from the episodes on
//! load and after every eviction pass.

use std::collections::HashMap;

use crate::text::{index_tokens, word_hash};
use crate::types::EpisodeId;

/// Hash-bucketed inverted index from term to episode ids.
#[derive(Debug, Default, Clone)]
pub struct KeywordIndex {
    buckets: HashMap<u64, Vec<EpisodeId>>,
}

impl KeywordIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` to the bucket of every indexable token in `text`.
    pub fn insert(&mut self, id: EpisodeId, text: &str) {
        for token in index_tokens(text) {
            self.buckets.entry(word_hash(&token)).or_default().push(id);
        }
    }

    /// Drop everything and re-index `docs` in the given order.
    pub fn rebuild<'a, I>(&mut self, docs: I)
    where
        I: IntoIterator<Item = (EpisodeId, &'a str, &'a str)>,
    {
        self.buckets.clear();
        for (id, input, response) in docs {
            self.insert(id, input);
            self.insert(id, response);
        }
    }

    /// Episodes listed under `token` (already normalised), with multiplicity.
    #[must_use]
    pub fn lookup(&self, token: &str) -> &[EpisodeId] {
        self.buckets
            .get(&word_hash(token))
            .map_or(&[], Vec::as_slice)
    }

    /// Count term matches per episode for a free-text query.
    ///
    /// Every query token adds one per bucket entry; repeated query tokens
    /// accumulate. Episodes with no match are absent from the map.
    #[must_use]
    pub fn match_counts(&self, query: &str) -> HashMap<EpisodeId, u64> {
        let mut counts: HashMap<EpisodeId, u64> = HashMap::new();
        for token in index_tokens(query) {
            for &id in self.lookup(&token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Number of distinct term buckets.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether nothing has been indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_terms_weigh_more() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(1), "rust rust rust");
        index.insert(EpisodeId(2), "rust cargo");

        let counts = index.match_counts("rust");
        assert_eq!(counts[&EpisodeId(1)], 3);
        assert_eq!(counts[&EpisodeId(2)], 1);
    }

    #[test]
    fn repeated_query_tokens_accumulate() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(7), "погода");
        let counts = index.match_counts("погода погода");
        assert_eq!(counts[&EpisodeId(7)], 2);
    }

    #[test]
    fn short_tokens_are_not_indexed() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(0), "a to be");
        assert!(index.is_empty());
        assert!(index.match_counts("to be").is_empty());
    }

    #[test]
    fn lookup_is_case_and_punctuation_insensitive() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(3), "Tomorrow!");
        assert_eq!(index.match_counts("TOMORROW?")[&EpisodeId(3)], 1);
    }

    #[test]
    fn length_is_measured_after_stripping_punctuation() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(4), "ok!! «погода?» ...");
        assert_eq!(index.term_count(), 1);
        assert_eq!(index.lookup("погода"), &[EpisodeId(4)]);
        assert!(index.match_counts("ok").is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut index = KeywordIndex::new();
        index.insert(EpisodeId(0), "stale entry");
        index.rebuild([(EpisodeId(5), "fresh input", "fresh reply")]);

        assert!(index.match_counts("stale").is_empty());
        assert_eq!(index.match_counts("fresh")[&EpisodeId(5)], 2);
        assert_eq!(index.lookup("reply"), &[EpisodeId(5)]);
    }
}
