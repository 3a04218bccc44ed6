//! Integration Tests: End-to-End Memory Flows
//!
//! Save/load round-trips through real files, fail-soft startup on damaged
//! snapshots, and the turn-recording flow across all stores.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use recollect_core::config::{EmbeddingCacheConfig, MemoryConfig, RecollectConfig};
use recollect_core::embedding::{EmbeddingCache, HashingEmbeddingProvider};
use recollect_core::memory::MemoryEngine;
use recollect_core::system::MemorySystem;
use recollect_core::types::{CacheStats, EpisodeId, MemoryStats, Role};

fn config_in(dir: &std::path::Path) -> RecollectConfig {
    RecollectConfig {
        memory: MemoryConfig::in_dir(dir.join("memory")),
        embedding_cache: EmbeddingCacheConfig::in_dir(dir.join("cache"), 50),
        ..RecollectConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Round-trips
// ---------------------------------------------------------------------------

#[test]
fn episodic_and_semantic_roundtrip_exactly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = MemoryConfig::in_dir(dir.path());

    let engine = MemoryEngine::open(config.clone());
    engine.add_episode("Какая погода завтра?", "Обещают дождь", "curious", 2);
    engine.add_episode("Remind me about the dentist", "Tuesday at 10", "neutral", 4);
    engine.add_semantic("user_name", "Мария");
    engine.add_semantic("timezone", "UTC+3");
    engine.try_save().expect("save");

    let before_episodes = engine.episodic().episodes();
    let before_facts = engine.semantic().facts();

    let reopened = MemoryEngine::open(config);
    assert_eq!(reopened.episodic().episodes(), before_episodes);
    assert_eq!(reopened.semantic().facts(), before_facts);

    // Index rebuilt from the loaded episodes.
    let hits = reopened.get_relevant_context("dentist", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 4);
}

#[test]
fn ids_keep_increasing_across_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = MemoryConfig::in_dir(dir.path());

    let engine = MemoryEngine::open(config.clone());
    engine.add_episode("first", "", "", 1);
    let last = engine.add_episode("second", "", "", 1);
    engine.save();

    let reopened = MemoryEngine::open(config);
    let next = reopened.add_episode("third", "", "", 1);
    assert!(next > last);
    assert_eq!(next, EpisodeId(2));
}

#[test]
fn cache_roundtrip_keeps_vectors_and_resets_counters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = EmbeddingCacheConfig::in_dir(dir.path(), 10);

    let cache = EmbeddingCache::open(&config);
    cache.put("alpha", vec![0.1, 0.2, 0.3]);
    cache.put("beta", vec![-1.0]);
    cache.get("alpha");
    cache.get("gamma");
    cache.save();

    let reopened = EmbeddingCache::open(&config);
    assert_eq!(reopened.stats(), CacheStats { size: 2, hits: 0, misses: 0 });
    assert_eq!(reopened.get("alpha"), Some(vec![0.1, 0.2, 0.3]));
    assert_eq!(reopened.get("beta"), Some(vec![-1.0]));
}

#[test]
fn cache_file_is_an_object_of_vectors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = EmbeddingCacheConfig::in_dir(dir.path(), 10);
    let cache = EmbeddingCache::open(&config);
    cache.put("hello", vec![1.0, 2.0]);
    cache.try_save().expect("save");

    let raw = std::fs::read_to_string(config.cache_path()).expect("read");
    let parsed: BTreeMap<String, Vec<f32>> = serde_json::from_str(&raw).expect("object");
    assert_eq!(parsed.len(), 1);
    let (key, vector) = parsed.into_iter().next().expect("one entry");
    assert_eq!(key.len(), 32);
    assert_eq!(vector, vec![1.0, 2.0]);
}

// ---------------------------------------------------------------------------
// Fail-soft startup
// ---------------------------------------------------------------------------

#[test]
fn damaged_snapshots_start_empty_without_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.memory.data_dir).expect("mkdir");
    std::fs::create_dir_all(&config.embedding_cache.cache_dir).expect("mkdir");
    std::fs::write(config.memory.episodic_path(), "[1, 2, 3]").expect("write");
    std::fs::write(config.memory.semantic_path(), "{\"truncated\": ").expect("write");
    std::fs::write(config.embedding_cache.cache_path(), "\u{0}\u{1}binary").expect("write");

    let system = MemorySystem::from_config(config);
    assert_eq!(system.engine().get_stats(), MemoryStats::default());
    assert!(system.cache().is_empty());
    assert_eq!(system.engine().counters().load_failures, 2);

    // Still fully usable, and the next save repairs the files.
    system.record_turn("recovering", "ok", "", 1);
    system.try_save_all().expect("save");
}

#[test]
fn legacy_episodes_without_ids_are_numbered_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = MemoryConfig::in_dir(dir.path());
    let legacy = r#"[
        {"timestamp": "2024-05-01T10:00:00Z", "user_input": "старый разговор", "response": "да", "importance": 1},
        {"timestamp": "2024-05-02T10:00:00Z", "user_input": "another chat", "response": "yes", "emotion": "joy", "importance": 3}
    ]"#;
    std::fs::write(config.episodic_path(), legacy).expect("write");

    let engine = MemoryEngine::open(config);
    let ids: Vec<_> = engine.episodic().episodes().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![EpisodeId(0), EpisodeId(1)]);
    assert_eq!(engine.get_relevant_context("разговор", 1)[0].id, EpisodeId(0));
}

// ---------------------------------------------------------------------------
// Turn flow
// ---------------------------------------------------------------------------

#[test]
fn conversation_flow_across_stores() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = MemorySystem::from_config(config_in(dir.path()));

    system.record_turn("Я планирую поездку в Казань", "Отличная идея!", "joy", 3);
    system.record_turn("Какая погода в Казани летом?", "Обычно тепло", "curious", 2);
    system.engine().add_semantic("trip_city", "Казань");

    let working = system.engine().get_working_memory();
    assert_eq!(working.len(), 4);
    assert_eq!(working[0].role, Role::User);
    assert_eq!(working[3].role, Role::Assistant);

    assert!(system.threads().is_related("помнишь, что я говорил?"));
    let ctx = system.threads().get_context().expect("active thread");
    assert!(ctx.starts_with("Current topic: Я планирую поездку в Казань"));

    let hits = system.engine().get_relevant_context("погода летом", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 4);

    let provider = HashingEmbeddingProvider::new(32);
    let v1 = system.cache().get_or_embed("поездка в Казань", &provider).expect("embed");
    let v2 = system.cache().get_or_embed("поездка   в Казань", &provider).expect("cached");
    assert_eq!(v1, v2);
    assert_eq!(system.cache().stats().hits, 1);
}

#[test]
fn working_memory_counts_entries_not_turns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.memory.working_size = 3;
    let system = MemorySystem::from_config(config);

    system.record_turn("one", "1", "", 1);
    system.record_turn("two", "2", "", 1);

    let contents: Vec<_> = system.engine().get_working_memory().into_iter().map(|e| e.content).collect();
    assert_eq!(contents, vec!["1", "two", "2"]);
    system.engine().clear_working();
    assert!(system.engine().get_working_memory().is_empty());
}

#[test]
fn config_file_drives_the_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let toml = format!(
        "[memory]\ndata_dir = {:?}\nmax_episodic = 5\n\n[embedding_cache]\ncache_dir = {:?}\nmax_size = 3\n",
        data.display().to_string(),
        data.display().to_string(),
    );
    let path = dir.path().join("recollect.toml");
    std::fs::write(&path, toml).expect("write");

    let system = MemorySystem::from_config_file(&path).expect("config");
    for i in 0..8 {
        system.record_turn(&format!("turn number {i}"), "ok", "", 1);
    }
    assert!(system.engine().get_stats().episodic_count <= 5);
    assert!(data.is_dir());
}

#[test]
fn concurrent_handlers_share_one_system() {
    const WORKERS: usize = 8;
    const TURNS: usize = 50;

    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_in(dir.path());
    config.memory.max_episodic = 20;
    config.embedding_cache.max_size = 16;
    let system = Arc::new(MemorySystem::from_config(config));

    let (gets, ids): (usize, Vec<EpisodeId>) = std::thread::scope(|s| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|w| {
                let system = Arc::clone(&system);
                s.spawn(move || {
                    let mut gets = 0;
                    let mut ids = Vec::with_capacity(TURNS);
                    for t in 0..TURNS {
                        let id = system.record_turn(&format!("worker {w} asks about topic {t}"), "noted", "", 1 + (t % 3) as u32);
                        let hits = system.engine().get_relevant_context("topic worker", 5);
                        assert!(hits.len() <= 5);

                        system.cache().put(&format!("text {w} {t}"), vec![w as f32, t as f32]);
                        system.cache().get(&format!("text {w} {t}"));
                        system.cache().get(&format!("text {w} {}", t / 2));
                        gets += 2;
                        ids.push(id);
                    }
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    (gets, ids)
                })
            })
            .collect();
        handles.into_iter().fold((0, Vec::new()), |(total, mut all), h| {
            let (gets, ids) = h.join().expect("worker");
            all.extend(ids);
            (total + gets, all)
        })
    });

    assert_eq!(gets, WORKERS * TURNS * 2);
    let unique: HashSet<EpisodeId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), WORKERS * TURNS);

    let episodes = system.engine().episodic().episodes();
    assert!(!episodes.is_empty());
    assert!(episodes.len() <= 20);
    assert!(episodes.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(system.engine().counters().episodes_added, (WORKERS * TURNS) as u64);

    let stats = system.cache().stats();
    assert!(stats.size <= 16);
    assert_eq!(stats.hits + stats.misses, gets as u64);

    assert!(system.engine().get_working_memory().len() <= system.engine().config().working_size);
    system.try_save_all().expect("save");
}

// ---------------------------------------------------------------------------
// Background saving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spawn_save_writes_off_the_async_thread() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());
    let episodic_path = config.memory.episodic_path();

    let system = Arc::new(MemorySystem::from_config(config));
    system.record_turn("background", "save", "", 1);

    MemorySystem::spawn_save(&system).await.expect("join");
    assert!(episodic_path.exists());

    MemorySystem::save_in_background(&system).await.expect("save");
}

#[tokio::test]
async fn autosave_runs_on_its_interval() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = Arc::new(MemorySystem::from_config(config_in(dir.path())));
    system.record_turn("periodic", "save", "", 1);

    let handle = MemorySystem::spawn_autosave(&system, Duration::from_millis(20));
    for _ in 0..200 {
        if system.engine().counters().saves_completed >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert!(system.engine().counters().saves_completed >= 2);
}
