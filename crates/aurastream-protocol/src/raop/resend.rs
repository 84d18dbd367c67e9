//! Gap detection and resend-request bookkeeping for RAOP audio (spec.md
//! §6, §8 scenario S6).
//!
//! A single resend can be outstanding at a time, mirroring the original's
//! one-at-a-time semaphore-gated `RequestResend`/`TimerExpired` pair: a
//! second gap observed while a resend is already pending does not issue a
//! second request, it just waits for the current one to resolve.

use std::time::{Duration, Instant};

pub const RESEND_TIMEOUT: Duration = Duration::from_millis(80);

/// What the caller should do as a result of observing a newly arrived
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapAction {
    /// No gap; nothing to do.
    None,
    /// A gap was found; send a resend request for `(first_missing, count)`.
    RequestResend { first_missing: u16, count: u16 },
    /// A resend is already pending; this packet doesn't change that.
    ResendPending,
}

/// Tracks the last contiguous sequence number seen and any outstanding
/// resend request, so the caller (the RAOP audio receive loop) can decide
/// whether to request a resend, accept a resent packet, or time one out.
pub struct ResendTracker {
    last_seq: Option<u16>,
    pending: Option<PendingResend>,
}

struct PendingResend {
    first_missing: u16,
    count: u16,
    requested_at: Instant,
}

impl ResendTracker {
    pub fn new() -> Self {
        Self { last_seq: None, pending: None }
    }

    /// Called when a live (non-retransmit) packet with `seq` arrives.
    /// Returns what the caller should do about any gap this reveals.
    pub fn on_packet_received(&mut self, seq: u16, now: Instant) -> GapAction {
        if self.pending.is_some() {
            return GapAction::ResendPending;
        }
        let action = match self.last_seq {
            None => GapAction::None,
            Some(last) => {
                let gap = seq.wrapping_sub(last).wrapping_sub(1);
                if gap == 0 || seq == last {
                    GapAction::None
                } else {
                    let first_missing = last.wrapping_add(1);
                    self.pending = Some(PendingResend { first_missing, count: gap, requested_at: now });
                    GapAction::RequestResend { first_missing, count: gap }
                }
            }
        };
        self.last_seq = Some(seq);
        action
    }

    /// Called when a retransmitted packet arrives carrying `seq`. Clears
    /// the pending resend once every requested packet has been seen.
    pub fn on_retransmit_received(&mut self, seq: u16) {
        if let Some(pending) = &self.pending {
            let end = pending.first_missing.wrapping_add(pending.count - 1);
            if seq_in_range(pending.first_missing, end, seq) && seq == end {
                self.pending = None;
            }
        }
    }

    /// Poll for resend timeout (spec.md §8 S6: "on `ResendTimeout` (no
    /// reply within 80 ms), a `StreamInterrupted` is emitted and the
    /// stream continues with [the next live packet]").
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        let timed_out = self.pending.as_ref().is_some_and(|p| now.duration_since(p.requested_at) >= RESEND_TIMEOUT);
        if timed_out {
            self.pending = None;
        }
        timed_out
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for ResendTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn seq_in_range(start: u16, end: u16, seq: u16) -> bool {
    if start <= end {
        seq >= start && seq <= end
    } else {
        seq >= start || seq <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_sequence_has_no_gap() {
        let mut tracker = ResendTracker::new();
        let now = Instant::now();
        assert_eq!(tracker.on_packet_received(10, now), GapAction::None);
        assert_eq!(tracker.on_packet_received(11, now), GapAction::None);
    }

    #[test]
    fn gap_of_one_requests_single_packet_resend() {
        let mut tracker = ResendTracker::new();
        let now = Instant::now();
        tracker.on_packet_received(10, now);
        let action = tracker.on_packet_received(12, now);
        assert_eq!(action, GapAction::RequestResend { first_missing: 11, count: 1 });
    }

    #[test]
    fn retransmit_arrival_clears_pending() {
        let mut tracker = ResendTracker::new();
        let now = Instant::now();
        tracker.on_packet_received(10, now);
        tracker.on_packet_received(12, now);
        assert!(tracker.has_pending());
        tracker.on_retransmit_received(11);
        assert!(!tracker.has_pending());
    }

    #[test]
    fn timeout_fires_after_80ms_and_clears_pending() {
        let mut tracker = ResendTracker::new();
        let t0 = Instant::now();
        tracker.on_packet_received(10, t0);
        tracker.on_packet_received(12, t0);
        assert!(!tracker.poll_timeout(t0 + Duration::from_millis(50)));
        assert!(tracker.poll_timeout(t0 + Duration::from_millis(81)));
        assert!(!tracker.has_pending());
    }

    #[test]
    fn second_gap_while_pending_does_not_issue_a_new_request() {
        let mut tracker = ResendTracker::new();
        let now = Instant::now();
        tracker.on_packet_received(10, now);
        tracker.on_packet_received(12, now);
        assert_eq!(tracker.on_packet_received(14, now), GapAction::ResendPending);
    }
}
