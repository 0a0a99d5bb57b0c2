//! Bounded command history.

use std::collections::VecDeque;

use crate::repl::command::Response;

/// One remembered exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Monotonic sequence number; never reused after eviction.
    pub seq: u64,
    pub command: String,
    pub response: Response,
}

/// Fixed-capacity ring of the most recent exchanges. Appending past
/// capacity evicts the oldest entry; reads never mutate.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    next_seq: u64,
}

impl History {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    pub fn append(&mut self, command: &str, response: Response) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            seq: self.next_seq,
            command: command.to_string(),
            response,
        });
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Entry `offset` steps back from the newest (0 is the newest).
    pub fn recent(&self, offset: usize) -> Option<&HistoryEntry> {
        if offset >= self.entries.len() {
            return None;
        }
        self.entries.get(self.entries.len() - 1 - offset)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_past_capacity_evicts_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.append(&format!("cmd {i}"), Response::ok(""));
        }
        assert_eq!(history.len(), 3);
        let commands: Vec<&str> = history.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["cmd 2", "cmd 3", "cmd 4"]);
    }

    #[test]
    fn sequence_numbers_survive_eviction() {
        let mut history = History::new(2);
        for i in 0..4 {
            history.append(&format!("cmd {i}"), Response::ok(""));
        }
        let seqs: Vec<u64> = history.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3]);
    }

    #[test]
    fn recent_walks_backwards_from_newest() {
        let mut history = History::new(4);
        history.append("first", Response::ok(""));
        history.append("second", Response::ok(""));
        assert_eq!(history.recent(0).map(|e| e.command.as_str()), Some("second"));
        assert_eq!(history.recent(1).map(|e| e.command.as_str()), Some("first"));
        assert!(history.recent(2).is_none());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut history = History::new(0);
        assert_eq!(history.capacity(), 1);
        history.append("only", Response::ok(""));
        history.append("newer", Response::ok(""));
        assert_eq!(history.len(), 1);
        assert_eq!(history.recent(0).map(|e| e.command.as_str()), Some("newer"));
    }
}
