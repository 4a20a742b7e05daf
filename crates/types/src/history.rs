//! Bounded FIFO history used by reputation and quality records.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;

/// Ordered history that keeps at most `CAP` entries, evicting the oldest first.
///
/// Serializes as a plain JSON array so stored records stay readable by
/// clients that know nothing about the cap. Longer arrays are cut down to
/// their newest `CAP` entries when loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RollingHistory<T, const CAP: usize> {
    entries: VecDeque<T>,
}

impl<T, const CAP: usize> Default for RollingHistory<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAP: usize> RollingHistory<T, CAP> {
    /// Maximum number of retained entries.
    pub const CAPACITY: usize = CAP;

    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(CAP),
        }
    }

    /// Append an entry, returning the evicted oldest entry if the cap was hit.
    pub fn push(&mut self, entry: T) -> Option<T> {
        self.entries.push_back(entry);
        if self.entries.len() > CAP {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// The last `n` entries (or fewer), oldest to newest.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }
}

impl<'de, T: Deserialize<'de>, const CAP: usize> Deserialize<'de> for RollingHistory<T, CAP> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries = VecDeque::<T>::deserialize(deserializer)?;
        let excess = entries.len().saturating_sub(CAP);
        entries.drain(..excess);
        Ok(Self { entries })
    }
}

impl<T: Clone, const CAP: usize> RollingHistory<T, CAP> {
    /// Copy the entries out, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut history: RollingHistory<u32, 3> = RollingHistory::new();
        assert_eq!(history.push(1), None);
        assert_eq!(history.push(2), None);
        assert_eq!(history.push(3), None);
        assert_eq!(history.push(4), Some(1));

        assert_eq!(history.to_vec(), vec![2, 3, 4]);
        assert_eq!(history.latest(), Some(&4));
    }

    #[test]
    fn test_recent_window() {
        let mut history: RollingHistory<u32, 10> = RollingHistory::new();
        history.push(5);
        history.push(6);
        assert_eq!(history.recent(3).copied().collect::<Vec<_>>(), vec![5, 6]);

        history.push(7);
        history.push(8);
        assert_eq!(history.recent(3).copied().collect::<Vec<_>>(), vec![6, 7, 8]);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut history: RollingHistory<f64, 10> = RollingHistory::new();
        history.push(0.25);
        history.push(0.75);

        let json = serde_json::to_string(&history).expect("serialize");
        assert_eq!(json, "[0.25,0.75]");

        let back: RollingHistory<f64, 10> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, history);
    }

    #[test]
    fn test_deserialize_keeps_newest_entries() {
        let mut history: RollingHistory<u32, 3> =
            serde_json::from_str("[1,2,3,4,5]").expect("deserialize");
        assert_eq!(history.to_vec(), vec![3, 4, 5]);

        assert_eq!(history.push(6), Some(3));
        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![4, 5, 6]);
    }
}
