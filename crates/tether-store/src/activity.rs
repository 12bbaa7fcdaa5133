//! Append-only activity log with oldest-first retention

use std::collections::VecDeque;

use tether_core::{LogEntry, Severity};

/// Bounded, append-only log of store activity.
///
/// Entries are never mutated. When the retention limit is reached the
/// oldest entry is dropped. Sequence ids keep increasing across truncation.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
    capacity: usize,
}

impl ActivityLog {
    /// Create an empty log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_024)),
            next_seq: 1,
            capacity,
        }
    }

    /// Rebuild a log from restored entries.
    ///
    /// Entries are re-sorted by sequence id and trimmed to `capacity`;
    /// `next_seq` is raised past the highest restored id if needed.
    pub fn restore(mut entries: Vec<LogEntry>, next_seq: u64, capacity: usize) -> Self {
        entries.sort_by_key(|entry| entry.seq);
        let floor = entries
            .last()
            .map_or(Some(1), |entry| entry.seq.checked_add(1))
            .unwrap_or(u64::MAX);
        let mut log = Self {
            entries: entries.into(),
            next_seq: next_seq.max(floor),
            capacity,
        };
        log.enforce_retention();
        log
    }

    /// Append an entry and return it.
    pub fn append(
        &mut self,
        at: u64,
        level: Severity,
        message: impl Into<String>,
        client_id: Option<&str>,
        file_id: Option<&str>,
    ) -> LogEntry {
        let entry = LogEntry {
            seq: self.next_seq,
            at,
            level,
            message: message.into(),
            client_id: client_id.map(str::to_owned),
            file_id: file_id.map(str::to_owned),
        };
        // saturates; snapshot::read rejects logs at the limit
        self.next_seq = self.next_seq.checked_add(1).unwrap_or(u64::MAX);
        self.entries.push_back(entry.clone());
        self.enforce_retention();
        entry
    }

    /// The most recent `limit` entries (all when `None`), oldest first.
    pub fn recent(&self, limit: Option<usize>) -> Vec<LogEntry> {
        let take = limit.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries
            .iter()
            .skip(self.entries.len() - take)
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence id the next entry will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    fn enforce_retention(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_increasing_seq() {
        let mut log = ActivityLog::new(10);
        let a = log.append(1, Severity::Info, "a", None, None);
        let b = log.append(2, Severity::Warning, "b", Some("c1"), Some("f1"));
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
        assert_eq!(b.client_id.as_deref(), Some("c1"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_retention_drops_oldest_first() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.append(i, Severity::Info, format!("entry {i}"), None, None);
        }
        let kept: Vec<u64> = log.recent(None).iter().map(|e| e.seq).collect();
        assert_eq!(kept, vec![3, 4, 5]);
        assert_eq!(log.next_seq(), 6);
    }

    #[test]
    fn test_recent_limit() {
        let mut log = ActivityLog::new(10);
        for i in 0..4 {
            log.append(i, Severity::Info, "x", None, None);
        }
        let last_two: Vec<u64> = log.recent(Some(2)).iter().map(|e| e.seq).collect();
        assert_eq!(last_two, vec![3, 4]);
        assert_eq!(log.recent(Some(100)).len(), 4);
        assert!(log.recent(Some(0)).is_empty());
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut log = ActivityLog::new(0);
        let entry = log.append(0, Severity::Error, "dropped", None, None);
        assert_eq!(entry.seq, 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_restore_raises_next_seq() {
        let mut source = ActivityLog::new(10);
        for i in 0..3 {
            source.append(i, Severity::Info, "x", None, None);
        }
        let restored = ActivityLog::restore(source.recent(None), 1, 2);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.next_seq(), 4);
    }

    #[test]
    fn test_restore_at_sequence_limit_saturates() {
        let entry = LogEntry {
            seq: u64::MAX,
            at: 0,
            level: Severity::Info,
            message: "last".into(),
            client_id: None,
            file_id: None,
        };
        let mut log = ActivityLog::restore(vec![entry], 0, 10);
        assert_eq!(log.next_seq(), u64::MAX);

        let appended = log.append(1, Severity::Info, "after", None, None);
        assert_eq!(appended.seq, u64::MAX);
        assert_eq!(log.next_seq(), u64::MAX);
    }
}
