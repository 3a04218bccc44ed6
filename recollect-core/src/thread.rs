//! Conversation thread tracking.
//!
//! A thread is a contiguous run of turns on one topic. At most one thread
//! is active per tracker; it closes after `timeout_secs` without a new
//! message (measured from the last message, or from the start when the
//! thread is still empty). Closed threads move to a bounded history,
//! oldest dropped first.
//!
//! Every public operation takes the tracker's single lock for its whole
//! duration.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ThreadConfig;
use crate::text::truncate_chars;
use crate::types::ThreadId;

/// Phrases signalling the user is continuing an earlier topic.
/// Matched case-insensitively as substrings.
const CONTINUATION_MARKERS: &[&str] = &[
    "помнишь",
    "как мы говорили",
    "в той же теме",
    "продолжим",
    "вернёмся к",
    "вернемся к",
    "насчёт того",
    "насчет того",
    "по поводу",
    "как я говорил",
    "об этом же",
    "as we discussed",
    "as i said",
    "continuing",
    "back to",
    "remember when",
    "like we said",
];

// ---------------------------------------------------------------------------
// Thread records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ThreadMessage {
    user: String,
    assistant: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct ActiveThread {
    id: ThreadId,
    topic: String,
    entities: Vec<String>,
    started_at: DateTime<Utc>,
    messages: Vec<ThreadMessage>,
}

impl ActiveThread {
    fn new(topic: String, entities: Vec<String>, started_at: DateTime<Utc>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(entities.len());
        for e in entities {
            if !unique.contains(&e) {
                unique.push(e);
            }
        }
        Self {
            id: ThreadId::new(),
            topic,
            entities: unique,
            started_at,
            messages: Vec::new(),
        }
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.messages.last().map_or(self.started_at, |m| m.timestamp)
    }

    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity() > timeout
    }

    fn push(&mut self, user: &str, assistant: &str, timestamp: DateTime<Utc>) {
        self.messages.push(ThreadMessage {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp,
        });
    }

    fn archive(self, ended_at: DateTime<Utc>) -> ArchivedThread {
        ArchivedThread {
            id: self.id,
            topic: self.topic,
            entities: self.entities,
            started_at: self.started_at,
            ended_at,
            duration_secs: (ended_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            message_count: self.messages.len(),
        }
    }
}

/// A closed thread kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedThread {
    /// Unique id of the thread.
    pub id: ThreadId,
    /// Topic the thread was opened with.
    pub topic: String,
    /// Entities tracked while it was active.
    pub entities: Vec<String>,
    /// When the thread opened.
    pub started_at: DateTime<Utc>,
    /// When it was closed.
    pub ended_at: DateTime<Utc>,
    /// `ended_at - started_at`, in seconds.
    pub duration_secs: f64,
    /// Turns recorded in the thread.
    pub message_count: usize,
}

/// Snapshot of tracker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    /// Whether a thread is open (it may already be past its timeout).
    pub current_thread: bool,
    /// Turns in the open thread.
    pub current_messages: usize,
    /// Closed threads in history.
    pub archived: usize,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<ActiveThread>,
    history: VecDeque<ArchivedThread>,
}

impl TrackerState {
    fn close_current(&mut self, ended_at: DateTime<Utc>, history_limit: usize) {
        let Some(thread) = self.current.take() else {
            return;
        };
        let archived = thread.archive(ended_at);
        info!(
            thread = %archived.id,
            topic = %archived.topic,
            messages = archived.message_count,
            duration_secs = archived.duration_secs,
            "Thread closed"
        );
        self.history.push_back(archived);
        while self.history.len() > history_limit {
            self.history.pop_front();
        }
    }
}

/// Segments the dialogue into topic threads with an inactivity timeout.
#[derive(Debug)]
pub struct ThreadTracker {
    config: ThreadConfig,
    state: Mutex<TrackerState>,
}

impl ThreadTracker {
    /// Create a tracker with no active thread.
    #[must_use]
    pub fn new(config: ThreadConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Create a tracker with default settings and the given timeout.
    #[must_use]
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self::new(ThreadConfig {
            timeout_secs,
            ..ThreadConfig::default()
        })
    }

    /// Configured timeout, saturated to the largest representable span.
    fn timeout(&self) -> Duration {
        i64::try_from(self.config.timeout_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Record a completed turn at the current time.
    pub fn update(&self, user_input: &str, response: &str) {
        self.update_at(user_input, response, Utc::now());
    }

    /// Record a completed turn at `now`.
    ///
    /// An expired thread is closed first. With no open thread, a new one is
    /// started whose topic is the leading characters of `user_input`.
    pub fn update_at(&self, user_input: &str, response: &str, now: DateTime<Utc>) {
        let timeout = self.timeout();
        let mut state = self.state.lock();

        if state.current.as_ref().is_some_and(|t| t.is_expired(now, timeout)) {
            state.close_current(now, self.config.history_limit);
        }

        let thread = state.current.get_or_insert_with(|| {
            let topic = truncate_chars(user_input, self.config.topic_chars);
            debug!(topic = %topic, "Thread started");
            ActiveThread::new(topic, Vec::new(), now)
        });
        thread.push(user_input, response, now);
    }

    /// Whether `text` continues the active thread.
    pub fn is_related(&self, text: &str) -> bool {
        self.is_related_at(text, Utc::now())
    }

    /// [`is_related`](Self::is_related) evaluated at `now`.
    ///
    /// False with no thread or an expired one (which is left open). Otherwise
    /// true if the topic, any entity, or a continuation marker occurs in
    /// `text`, ignoring case.
    pub fn is_related_at(&self, text: &str, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        let Some(thread) = state.current.as_ref() else {
            return false;
        };
        if thread.is_expired(now, self.timeout()) {
            return false;
        }

        let lowered = text.to_lowercase();
        let topic = thread.topic.to_lowercase();
        if !topic.is_empty() && lowered.contains(&topic) {
            return true;
        }
        if thread
            .entities
            .iter()
            .any(|e| !e.is_empty() && lowered.contains(&e.to_lowercase()))
        {
            return true;
        }
        CONTINUATION_MARKERS.iter().any(|m| lowered.contains(m))
    }

    /// Rendered summary of the active thread: topic, entities, and the
    /// user and assistant sides of the most recent turns.
    pub fn get_context(&self) -> Option<String> {
        self.get_context_at(Utc::now())
    }

    /// [`get_context`](Self::get_context) evaluated at `now`.
    ///
    /// An expired thread is closed and `None` returned.
    pub fn get_context_at(&self, now: DateTime<Utc>) -> Option<String> {
        let mut state = self.state.lock();
        if state.current.as_ref()?.is_expired(now, self.timeout()) {
            state.close_current(now, self.config.history_limit);
            return None;
        }
        let thread = state.current.as_ref()?;

        let mut parts = vec![format!("Current topic: {}", thread.topic)];
        if !thread.entities.is_empty() {
            let shown: Vec<&str> = thread
                .entities
                .iter()
                .take(self.config.context_entities)
                .map(String::as_str)
                .collect();
            parts.push(format!("Mentioned: {}", shown.join(", ")));
        }

        let recent = thread.messages.len().min(self.config.context_messages);
        if recent > 0 {
            parts.push("\nRecent messages:".to_string());
            for msg in &thread.messages[thread.messages.len() - recent..] {
                let limit = self.config.message_preview_chars;
                parts.push(format!("  User: {}", truncate_chars(&msg.user, limit)));
                if !msg.assistant.is_empty() {
                    parts.push(format!("  Assistant: {}", truncate_chars(&msg.assistant, limit)));
                }
            }
        }
        Some(parts.join("\n"))
    }

    /// The last `limit` closed threads, oldest first.
    #[must_use]
    pub fn get_past_threads(&self, limit: usize) -> Vec<ArchivedThread> {
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Open a thread explicitly, closing any current one.
    pub fn start_thread(&self, topic: &str, entities: Vec<String>) -> ThreadId {
        let now = Utc::now();
        let mut state = self.state.lock();
        state.close_current(now, self.config.history_limit);
        let thread = ActiveThread::new(topic.to_string(), entities, now);
        let id = thread.id;
        state.current = Some(thread);
        debug!(thread = %id, topic, "Thread started");
        id
    }

    /// Append a turn to the active thread. No-op without one.
    pub fn add_message(&self, user_input: &str, response: &str) {
        if let Some(thread) = self.state.lock().current.as_mut() {
            thread.push(user_input, response, Utc::now());
        }
    }

    /// Close the active thread, if any.
    pub fn end_thread(&self) {
        self.state.lock().close_current(Utc::now(), self.config.history_limit);
    }

    /// Whether an unexpired thread is open.
    #[must_use]
    pub fn has_active_thread(&self) -> bool {
        let now = Utc::now();
        self.state
            .lock()
            .current
            .as_ref()
            .is_some_and(|t| !t.is_expired(now, self.timeout()))
    }

    /// Topic of the open thread.
    #[must_use]
    pub fn current_topic(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|t| t.topic.clone())
    }

    /// Tracker state counts.
    #[must_use]
    pub fn stats(&self) -> ThreadStats {
        let state = self.state.lock();
        ThreadStats {
            current_thread: state.current.is_some(),
            current_messages: state.current.as_ref().map_or(0, |t| t.messages.len()),
            archived: state.history.len(),
        }
    }
}

impl Default for ThreadTracker {
    fn default() -> Self {
        Self::new(ThreadConfig::default())
    }
}
