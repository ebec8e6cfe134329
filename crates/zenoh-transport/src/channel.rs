//! Per (priority, reliability) channel SN state.
//!
//! Each session keeps one `TxChannel` and one `RxChannel` per priority
//! band, split further into reliable and best-effort. The tx side just
//! counts up; the rx side applies the half-window `precedes` relation to
//! decide whether an incoming frame is in order, a duplicate, or (on a
//! reliable channel) a gap that must tear the session down.

use zenoh_protocol::sn::{Sn, SnResolution};

use crate::defrag::Defrag;

#[derive(Debug)]
pub struct TxChannel {
    next: Sn,
    resolution: SnResolution,
}

impl TxChannel {
    pub fn new(initial_sn: Sn, resolution: SnResolution) -> Self {
        Self {
            next: initial_sn,
            resolution,
        }
    }

    /// Allocate and return the next SN to send.
    pub fn next_sn(&mut self) -> Sn {
        let sn = self.next;
        self.next = sn.next(self.resolution);
        sn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Expected next SN; deliver it and advance.
    InOrder,
    /// Precedes the expected SN (already seen, or behind the replay
    /// window); silently drop regardless of reliability.
    Duplicate,
    /// A best-effort channel jumped ahead — deliver it and fast-forward.
    JumpForward,
    /// A reliable channel jumped ahead. Unlike `JumpForward` this is
    /// fatal: the caller tears the session down instead of delivering.
    Gap,
}

#[derive(Debug)]
pub struct RxChannel {
    expected: Sn,
    resolution: SnResolution,
    reliable: bool,
    pub defrag: Defrag,
}

impl RxChannel {
    pub fn new(initial_sn: Sn, resolution: SnResolution, reliable: bool, defrag_max_bytes: usize) -> Self {
        Self {
            expected: initial_sn,
            resolution,
            reliable,
            defrag: Defrag::new(defrag_max_bytes),
        }
    }

    /// Classify an incoming SN and, if accepted, advance the expectation.
    ///
    /// An SN that *precedes* `expected` (already seen, or behind the
    /// replay window) is always a duplicate and is dropped regardless of
    /// reliability. An SN that *follows* `expected` is a forward gap: on
    /// a best-effort channel it's accepted and the expectation
    /// fast-forwards past it; on a reliable channel it's a protocol error
    /// the caller tears the session down for, so `expected` is left
    /// untouched for diagnostics.
    pub fn classify(&mut self, sn: Sn) -> RxOutcome {
        if sn == self.expected {
            self.expected = sn.next(self.resolution);
            return RxOutcome::InOrder;
        }

        if self.expected.precedes(sn, self.resolution) {
            if self.reliable {
                return RxOutcome::Gap;
            }
            self.expected = sn.next(self.resolution);
            RxOutcome::JumpForward
        } else {
            RxOutcome::Duplicate
        }
    }

    pub fn expected(&self) -> Sn {
        self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_channel_counts_up_and_wraps() {
        let res = SnResolution(4);
        let mut tx = TxChannel::new(Sn(2), res);
        assert_eq!(tx.next_sn(), Sn(2));
        assert_eq!(tx.next_sn(), Sn(3));
        assert_eq!(tx.next_sn(), Sn(0));
    }

    #[test]
    fn rx_channel_accepts_in_order() {
        let res = SnResolution(256);
        let mut rx = RxChannel::new(Sn(0), res, true, 1024);
        assert_eq!(rx.classify(Sn(0)), RxOutcome::InOrder);
        assert_eq!(rx.classify(Sn(1)), RxOutcome::InOrder);
    }

    #[test]
    fn reliable_channel_reports_gap_without_advancing() {
        let res = SnResolution(256);
        let mut rx = RxChannel::new(Sn(0), res, true, 1024);
        assert_eq!(rx.classify(Sn(5)), RxOutcome::Gap);
        assert_eq!(rx.expected(), Sn(0));
    }

    #[test]
    fn reliable_channel_drops_replayed_duplicate_without_erroring() {
        let res = SnResolution(256);
        let mut rx = RxChannel::new(Sn(5), res, true, 1024);
        assert_eq!(rx.classify(Sn(2)), RxOutcome::Duplicate);
        assert_eq!(rx.expected(), Sn(5));
    }

    #[test]
    fn best_effort_channel_jumps_forward_on_loss() {
        let res = SnResolution(256);
        let mut rx = RxChannel::new(Sn(0), res, false, 1024);
        assert_eq!(rx.classify(Sn(5)), RxOutcome::JumpForward);
        assert_eq!(rx.expected(), Sn(6));
    }

    #[test]
    fn best_effort_channel_drops_stale_duplicate() {
        let res = SnResolution(256);
        let mut rx = RxChannel::new(Sn(10), res, false, 1024);
        assert_eq!(rx.classify(Sn(3)), RxOutcome::Duplicate);
        assert_eq!(rx.expected(), Sn(10));
    }
}
