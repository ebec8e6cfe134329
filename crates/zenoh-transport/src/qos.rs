//! Priority bands.
//!
//! Full QoS scheduling (token buckets, contract-based rate limits) is out
//! of scope here; what the session does need is to drain higher-priority
//! frames ahead of lower-priority ones when several are pending on the
//! same link. [`PriorityQueue`] is exactly that: seven FIFO lanes, always
//! drained highest-first.

use std::collections::VecDeque;

use zenoh_protocol::msg::Priority;

const BANDS: usize = 7;

fn band_index(p: Priority) -> usize {
    p.to_wire() as usize
}

/// A multi-lane FIFO: `push` files an item under its priority, `pop`
/// always returns from the highest non-empty lane.
#[derive(Debug, Default)]
pub struct PriorityQueue<T> {
    lanes: [VecDeque<T>; BANDS],
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            lanes: Default::default(),
        }
    }

    pub fn push(&mut self, priority: Priority, item: T) {
        self.lanes[band_index(priority)].push_back(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.lanes.iter_mut().find_map(|lane| lane.pop_front())
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(|lane| lane.is_empty())
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(|lane| lane.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_highest_priority_first() {
        let mut q = PriorityQueue::new();
        q.push(Priority::Background, "bg");
        q.push(Priority::Data, "data");
        q.push(Priority::RealTime, "rt");
        assert_eq!(q.pop(), Some("rt"));
        assert_eq!(q.pop(), Some("data"));
        assert_eq!(q.pop(), Some("bg"));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn preserves_fifo_within_a_lane() {
        let mut q = PriorityQueue::new();
        q.push(Priority::Data, 1);
        q.push(Priority::Data, 2);
        q.push(Priority::Data, 3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }
}
