//! Bounded emission history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::topic::TopicPattern;

/// Diagnostic record of one emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emission identifier.
    pub id: Uuid,
    /// Topic the event was emitted under.
    pub name: String,
    /// Emitting plugin or host component.
    pub source: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Number of listeners invoked.
    pub listener_count: usize,
    /// Number of listeners that failed or timed out.
    pub error_count: usize,
}

/// Filter for [`EventHistory::query`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Topic or wildcard pattern.
    pub topic: Option<String>,
    /// Exact source.
    pub source: Option<String>,
    /// Inclusive lower time bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub until: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// Filter on a topic or wildcard pattern.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    /// Filter on an exact source.
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }
}

/// Ring buffer of the most recent emissions.
#[derive(Debug)]
pub struct EventHistory {
    records: VecDeque<EventRecord>,
    capacity: usize,
}

impl EventHistory {
    /// Creates an empty history holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a record, dropping the oldest when full.
    pub fn push(&mut self, record: EventRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records matching `filter`, oldest first.
    pub fn query(&self, filter: &HistoryFilter) -> Vec<EventRecord> {
        let pattern = filter.topic.as_deref().map(TopicPattern::compile);

        let mut matched: Vec<EventRecord> = self
            .records
            .iter()
            .filter(|r| pattern.as_ref().is_none_or(|p| p.matches(&r.name)))
            .filter(|r| {
                filter
                    .source
                    .as_ref()
                    .is_none_or(|s| r.source.as_deref() == Some(s.as_str()))
            })
            .filter(|r| filter.since.is_none_or(|since| r.timestamp >= since))
            .filter(|r| filter.until.is_none_or(|until| r.timestamp <= until))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }
        matched
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, source: Option<&str>) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            source: source.map(str::to_string),
            timestamp: Utc::now(),
            listener_count: 0,
            error_count: 0,
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut history = EventHistory::new(2);
        history.push(record("a", None));
        history.push(record("b", None));
        history.push(record("c", None));
        let names: Vec<String> = history
            .query(&HistoryFilter::default())
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_filters() {
        let mut history = EventHistory::new(10);
        history.push(record("user.login", Some("auth")));
        history.push(record("user.logout", Some("auth")));
        history.push(record("order.created", Some("shop")));

        assert_eq!(history.query(&HistoryFilter::topic("user.*")).len(), 2);
        assert_eq!(history.query(&HistoryFilter::source("shop")).len(), 1);

        let limited = history.query(&HistoryFilter {
            limit: Some(1),
            ..HistoryFilter::default()
        });
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].name, "order.created");

        let future = history.query(&HistoryFilter {
            since: Some(Utc::now() + chrono::Duration::hours(1)),
            ..HistoryFilter::default()
        });
        assert!(future.is_empty());
    }
}
