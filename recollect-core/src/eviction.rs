//! Batched importance/age eviction for the episodic store.
//!
//! When the store grows past its cap, one pass removes the weakest tenth of
//! the cap (at least one episode):
//!
//! ```text
//! score = importance / max(1, age_hours)
//! ```
//!
//! Lowest scores go first. Ties fall back to age (older first) and then to
//! insertion order, so the pass is deterministic.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;

use crate::types::EpisodeId;

/// Episodes removed per eviction pass for a store of capacity `cap`.
///
/// Integer division alone would give zero for caps below ten, so the batch
/// is clamped to at least one.
#[must_use]
pub fn batch_size(cap: usize) -> usize {
    std::cmp::max(1, cap / 10)
}

/// Age of `timestamp` at `now`, in hours, floored at one hour.
///
/// Timestamps in the future (clock skew) also count as one hour.
#[must_use]
pub fn age_hours(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - timestamp).num_seconds();
    (secs as f64 / 3600.0).max(1.0)
}

/// Eviction priority of one episode. **Lower** scores are evicted first.
#[must_use]
pub fn eviction_score(importance: u32, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    f64::from(importance) / age_hours(timestamp, now)
}

/// What the selector needs to know about an episode.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Episode being scored.
    pub id: EpisodeId,
    /// Stored importance.
    pub importance: u32,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Pick the `count` lowest-scoring candidates.
///
/// Returned ids are sorted ascending so callers can filter a store kept in
/// id order with a binary search.
#[must_use]
pub fn select_victims<I>(candidates: I, count: usize, now: DateTime<Utc>) -> Vec<EpisodeId>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut scored: Vec<(OrderedFloat<f64>, DateTime<Utc>, EpisodeId)> = candidates
        .into_iter()
        .map(|c| {
            (
                OrderedFloat(eviction_score(c.importance, c.timestamp, now)),
                c.timestamp,
                c.id,
            )
        })
        .collect();

    // Ascending: weakest, then oldest, then first inserted.
    scored.sort_unstable();

    let mut victims: Vec<EpisodeId> = scored.into_iter().take(count).map(|(_, _, id)| id).collect();
    victims.sort_unstable();
    victims
}
