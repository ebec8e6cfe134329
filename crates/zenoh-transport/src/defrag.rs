//! Fragment reassembly.
//!
//! A publication larger than the link's MTU is split into a run of
//! `Fragment` messages, the last of which has `more == false`. Each
//! (reliability, priority) channel gets its own [`Defrag`] buffer: an
//! out-of-bound fragment run (exceeding `max_bytes`) resets that buffer
//! rather than tearing down the session, since a misbehaving or confused
//! peer on one channel shouldn't take the whole session down with it.

use zenoh_protocol::sn::Sn;

/// Accumulates fragments for a single channel until a complete message
/// is assembled.
#[derive(Debug, Default)]
pub struct Defrag {
    buf: Vec<u8>,
    expected_sn: Option<Sn>,
    max_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// More fragments expected, nothing to deliver yet.
    Pending,
    /// The run completed; the caller should take the buffer.
    Complete,
    /// The run exceeded the bound and was discarded; the caller should
    /// log and continue, not close the session.
    Overflowed,
}

impl Defrag {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            expected_sn: None,
            max_bytes,
        }
    }

    /// Feed one fragment. `sn` is the fragment's own SN — a run with a
    /// non-contiguous SN restarts the buffer, since zenoh-pico does not
    /// interleave fragment runs from different messages on the same
    /// channel.
    pub fn push(&mut self, sn: Sn, more: bool, data: &[u8]) -> FragmentOutcome {
        match self.expected_sn {
            Some(expected) if expected.0 == sn.0 => {}
            _ => {
                self.buf.clear();
            }
        }

        if self.buf.len() + data.len() > self.max_bytes {
            self.reset();
            return FragmentOutcome::Overflowed;
        }

        self.buf.extend_from_slice(data);
        self.expected_sn = Some(Sn(sn.0.wrapping_add(1)));

        if more {
            FragmentOutcome::Pending
        } else {
            FragmentOutcome::Complete
        }
    }

    /// Take the assembled message, resetting the buffer for the next run.
    pub fn take(&mut self) -> Vec<u8> {
        let out = std::mem::take(&mut self.buf);
        self.expected_sn = None;
        out
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected_sn = None;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_two_fragment_run() {
        let mut d = Defrag::new(1024);
        assert_eq!(d.push(Sn(0), true, b"hello "), FragmentOutcome::Pending);
        assert_eq!(d.push(Sn(1), false, b"world"), FragmentOutcome::Complete);
        assert_eq!(d.take(), b"hello world".to_vec());
    }

    #[test]
    fn single_fragment_is_immediately_complete() {
        let mut d = Defrag::new(1024);
        assert_eq!(d.push(Sn(5), false, b"solo"), FragmentOutcome::Complete);
        assert_eq!(d.take(), b"solo".to_vec());
    }

    #[test]
    fn overflow_resets_without_panicking() {
        let mut d = Defrag::new(4);
        assert_eq!(d.push(Sn(0), true, b"ab"), FragmentOutcome::Pending);
        assert_eq!(d.push(Sn(1), true, b"cd"), FragmentOutcome::Pending);
        // total would be 6 bytes, over the 4-byte bound
        assert_eq!(d.push(Sn(2), false, b"ef"), FragmentOutcome::Overflowed);
        assert!(d.is_empty());
    }

    #[test]
    fn non_contiguous_sn_restarts_run() {
        let mut d = Defrag::new(1024);
        assert_eq!(d.push(Sn(0), true, b"stale"), FragmentOutcome::Pending);
        // a fresh run starting elsewhere discards the stale partial data
        assert_eq!(d.push(Sn(10), false, b"fresh"), FragmentOutcome::Complete);
        assert_eq!(d.take(), b"fresh".to_vec());
    }
}
