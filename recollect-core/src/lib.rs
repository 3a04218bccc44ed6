//! # Recollect Core Library
//!
//! Tiered memory substrate for a conversational agent.
//!
//! - **Working**: bounded recency buffer of raw turns
//! - **Episodic**: capped log of completed turns with keyword relevance
//! - **Semantic**: flat key/value facts
//! - **Embedding cache**: content-addressed vectors with batched eviction
//! - **Threads**: topic segmentation with an inactivity timeout
//!
//! Every store guards its state with one lock and is safe to share across
//! threads. Loading and saving are fail-soft: a broken file costs the data
//! in it, never a crash.
//!
//! ## Performance Contract
//!
//! Store operations are synchronous and bounded by their own work:
//! - Working push / semantic set: O(1)
//! - Episode add: O(tokens), plus an O(n log n) eviction pass on overflow
//! - Relevance query: O(query tokens × bucket size)
//! - Disk writes: blocking; dispatch via [`MemorySystem::spawn_save`]

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod embedding;
pub mod error;
pub mod eviction;
pub mod index;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod persistence;
pub mod system;
pub mod text;
pub mod thread;
pub mod types;

pub use config::RecollectConfig;
pub use embedding::{EmbeddingCache, EmbeddingProvider};
pub use error::{RecollectError, Result};
pub use memory::{Episode, MemoryEngine};
pub use system::MemorySystem;
pub use thread::{ArchivedThread, ThreadTracker};
pub use types::*;
