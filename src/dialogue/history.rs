//! Bounded conversation history
//!
//! Keeps the most recent turns of one conversation in order, evicting the
//! oldest once capacity is exceeded

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The conversational partner
    User,
    /// The robot
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One utterance by either party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Fixed-capacity history with oldest-first eviction
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl BoundedHistory {
    /// Create an empty history holding at most `capacity` turns
    ///
    /// A capacity of zero is clamped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a turn at the tail, evicting from the head while over capacity
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            content: content.into(),
        });

        while self.turns.len() > self.capacity {
            if let Some(evicted) = self.turns.pop_front() {
                tracing::trace!(role = evicted.role.as_str(), "evicted oldest turn");
            }
        }
    }

    /// Ordered copy of the current turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Drop every turn, keeping the capacity
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut history = BoundedHistory::new(4);
        history.append(Role::User, "Moien");
        history.append(Role::Assistant, "Moien! Wéi geet et?");

        assert_eq!(
            history.snapshot(),
            vec![Turn::user("Moien"), Turn::assistant("Moien! Wéi geet et?")]
        );
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = BoundedHistory::new(3);

        for i in 0..10 {
            history.append(Role::User, format!("turn {i}"));
            assert!(history.len() <= 3);
        }

        let contents: Vec<_> = history.snapshot().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["turn 7", "turn 8", "turn 9"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut history = BoundedHistory::new(2);
        history.append(Role::User, "eent");

        let snapshot = history.snapshot();
        history.append(Role::Assistant, "zwee");
        history.append(Role::User, "dräi");

        assert_eq!(snapshot, vec![Turn::user("eent")]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut history = BoundedHistory::new(2);
        history.append(Role::User, "a");
        history.append(Role::Assistant, "b");
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.capacity(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = BoundedHistory::new(0);
        history.append(Role::User, "a");
        history.append(Role::User, "b");

        assert_eq!(history.snapshot(), vec![Turn::user("b")]);
    }
}
