//! Cooldown gating: at most one trigger per window, per channel.
//!
//! Checking a gate never consumes it; only `open` does, and callers open a
//! gate only when they actually emit. An optional busy window additionally
//! blocks while a clip is still playing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Millisecond time source. Injected so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic wall clock, counting from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Timer-gated admission control for one animation channel.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    window_ms: u64,
    last_opened_at: Option<u64>,
    busy_until: Option<u64>,
}

impl CooldownGate {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_opened_at: None,
            busy_until: None,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Whether a trigger at `now` would be admitted.
    pub fn allow(&self, now: u64) -> bool {
        let window_passed = self
            .last_opened_at
            .map_or(true, |t| now.saturating_sub(t) >= self.window_ms && now >= t);
        let idle = self.busy_until.map_or(true, |until| now >= until);
        window_passed && idle
    }

    /// Record an emitted trigger.
    pub fn open(&mut self, now: u64) {
        self.last_opened_at = Some(now);
    }

    /// Block until `until` as well. Extends an active busy window, never
    /// shortens it; a window that already lapsed at `now` is replaced.
    pub fn busy(&mut self, now: u64, until: u64) {
        self.busy_until = match self.busy_until {
            Some(current) if current > now => Some(current.max(until)),
            _ => Some(until),
        };
    }

    /// Admit-and-open in one step. Returns whether the gate was open.
    pub fn try_open(&mut self, now: u64) -> bool {
        if self.allow(now) {
            self.open(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_opened_at = None;
        self.busy_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_gate_is_open() {
        let gate = CooldownGate::new(4000);
        assert!(gate.allow(0));
        assert!(gate.allow(123_456));
    }

    #[test]
    fn window_blocks_then_releases() {
        let mut gate = CooldownGate::new(4000);
        let t0 = 10_000;
        gate.open(t0);
        for t in [t0, t0 + 1, t0 + 2000, t0 + 3999] {
            assert!(!gate.allow(t), "should be closed at {}", t);
        }
        assert!(gate.allow(t0 + 4000));
        assert!(gate.allow(t0 + 60_000));
    }

    #[test]
    fn allow_does_not_consume() {
        let mut gate = CooldownGate::new(1000);
        assert!(gate.allow(0));
        assert!(gate.allow(0));
        assert!(gate.try_open(0));
        assert!(!gate.try_open(500));
    }

    #[test]
    fn busy_window_extends_suppression() {
        let mut gate = CooldownGate::new(1000);
        gate.open(0);
        gate.busy(0, 1500);
        assert!(!gate.allow(1200), "cooldown passed but clip still playing");
        // Real clip length arrives later and is longer.
        gate.busy(100, 2500);
        assert!(!gate.allow(2000));
        assert!(gate.allow(2500));
    }

    #[test]
    fn busy_never_shortens_active_window() {
        let mut gate = CooldownGate::new(0);
        gate.busy(0, 3000);
        gate.busy(10, 500);
        assert!(!gate.allow(1000));
        assert!(gate.allow(3000));
    }

    #[test]
    fn reset_clears_everything() {
        let mut gate = CooldownGate::new(4000);
        gate.open(100);
        gate.busy(100, 9000);
        gate.reset();
        assert!(gate.allow(101));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(5);
        clock.advance(10);
        assert_eq!(clock.now_ms(), 15);
        clock.set(2);
        assert_eq!(clock.now_ms(), 2);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn closed_inside_window_open_after(
                window in 1u64..100_000,
                t0 in 0u64..1_000_000,
                offset in 0u64..200_000,
            ) {
                let mut gate = CooldownGate::new(window);
                gate.open(t0);
                prop_assert_eq!(gate.allow(t0 + offset), offset >= window);
            }
        }
    }
}
