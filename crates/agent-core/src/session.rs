//! Per-tab session buffers.
//!
//! An injected service rather than ambient state: whoever builds the runner
//! decides how many tabs share one [`SessionBuffers`] and how deep the rings are.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tabpilot_core_types::TabId;

pub const DEFAULT_SESSION_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Console,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SessionEventKind,
    /// Console level, or `ok`/`failed` for actions.
    pub level: String,
    pub message: String,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind, level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            level: level.into(),
            message: message.into(),
        }
    }

    pub fn console(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SessionEventKind::Console, level, message)
    }

    pub fn action(success: bool, message: impl Into<String>) -> Self {
        Self::new(
            SessionEventKind::Action,
            if success { "ok" } else { "failed" },
            message,
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level.as_str(), "error" | "failed")
    }
}

#[derive(Debug, Default)]
pub struct SessionRing {
    capacity: usize,
    queue: Mutex<VecDeque<SessionEvent>>,
}

impl SessionRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn push(&self, event: SessionEvent) {
        let mut guard = self.queue.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> Vec<SessionEvent> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Up to `limit` newest events matching `filter`, oldest first.
    pub fn collect_tail(
        &self,
        limit: usize,
        filter: impl Fn(&SessionEvent) -> bool,
    ) -> Vec<SessionEvent> {
        let guard = self.queue.lock();
        let mut out: Vec<SessionEvent> = guard
            .iter()
            .rev()
            .filter(|event| filter(event))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }
}

/// Bounded rings of session events keyed by tab.
#[derive(Debug)]
pub struct SessionBuffers {
    capacity: usize,
    tabs: DashMap<TabId, Arc<SessionRing>>,
}

impl Default for SessionBuffers {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAPACITY)
    }
}

impl SessionBuffers {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tabs: DashMap::new(),
        }
    }

    pub fn ring(&self, tab: &TabId) -> Arc<SessionRing> {
        self.tabs
            .entry(tab.clone())
            .or_insert_with(|| Arc::new(SessionRing::new(self.capacity)))
            .clone()
    }

    pub fn record(&self, tab: &TabId, event: SessionEvent) {
        self.ring(tab).push(event);
    }

    pub fn recent(&self, tab: &TabId, limit: usize) -> Vec<SessionEvent> {
        self.tabs
            .get(tab)
            .map(|ring| ring.collect_tail(limit, |_| true))
            .unwrap_or_default()
    }

    /// Newest console errors, oldest first.
    pub fn recent_console_errors(&self, tab: &TabId, limit: usize) -> Vec<String> {
        self.tabs
            .get(tab)
            .map(|ring| {
                ring.collect_tail(limit, |event| {
                    event.kind == SessionEventKind::Console && event.is_error()
                })
            })
            .unwrap_or_default()
            .into_iter()
            .map(|event| event.message)
            .collect()
    }

    /// Drop a closed tab's buffer.
    pub fn clear(&self, tab: &TabId) {
        self.tabs.remove(tab);
    }

    pub fn tabs(&self) -> Vec<TabId> {
        self.tabs.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rings_are_bounded_per_tab() {
        let buffers = SessionBuffers::new(3);
        let a = TabId::new("a");
        let b = TabId::new("b");
        for i in 0..5 {
            buffers.record(&a, SessionEvent::console("log", format!("line {i}")));
        }
        buffers.record(&b, SessionEvent::action(true, "click #go"));

        let recent = buffers.recent(&a, 10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "line 2");
        assert_eq!(buffers.recent(&b, 10).len(), 1);
        assert_eq!(buffers.ring(&a).capacity(), 3);
    }

    #[test]
    fn zero_capacity_ring_keeps_the_newest_event() {
        let ring = SessionRing::new(0);
        ring.push(SessionEvent::console("log", "first"));
        ring.push(SessionEvent::console("log", "second"));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.snapshot()[0].message, "second");
    }

    #[test]
    fn console_errors_only() {
        let buffers = SessionBuffers::default();
        let tab = TabId::new("t");
        buffers.record(&tab, SessionEvent::console("error", "first"));
        buffers.record(&tab, SessionEvent::console("warn", "meh"));
        buffers.record(&tab, SessionEvent::action(false, "click #x failed"));
        buffers.record(&tab, SessionEvent::console("error", "second"));
        assert_eq!(
            buffers.recent_console_errors(&tab, 5),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(buffers.recent_console_errors(&tab, 1), vec!["second".to_string()]);
    }

    #[test]
    fn clear_drops_tab() {
        let buffers = SessionBuffers::default();
        let tab = TabId::new("t");
        buffers.record(&tab, SessionEvent::console("log", "x"));
        assert_eq!(buffers.tabs(), vec![tab.clone()]);
        buffers.clear(&tab);
        assert!(buffers.recent(&tab, 5).is_empty());
        assert!(buffers.tabs().is_empty());
    }
}
