//! Single authoritative playback clock.
//!
//! The clock owns the time cursor. It is advanced by ticks, moved by user
//! seeks, and nudged by renderer position reports only when those drift past
//! the configured threshold while playing. Every write clamps to
//! `[0, bound]`, where the bound is the current timeline duration.

use crate::config::{PlaybackConfig, MAX_TICK_HZ};
use cutline_core::types::TimeUs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing changed.
    Idle,
    Advanced(TimeUs),
    /// The cursor was at the end: the clock stopped and rewound to zero.
    ReachedEnd,
}

/// Point-in-time view of the clock, published to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub time: TimeUs,
    pub state: ClockState,
    pub duration: TimeUs,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    current_time: TimeUs,
    state: ClockState,
    bound: TimeUs,
    tick_hz: i64,
    /// Position the current run of ticks started from.
    anchor: TimeUs,
    /// Ticks since `anchor`; each position is computed from the anchor so
    /// fractional steps do not accumulate.
    ticks: i64,
    drift_threshold: TimeUs,
}

impl PlaybackClock {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            current_time: TimeUs::ZERO,
            state: ClockState::Stopped,
            bound: TimeUs::ZERO,
            tick_hz: i64::from(config.tick_hz.clamp(1, MAX_TICK_HZ)),
            anchor: TimeUs::ZERO,
            ticks: 0,
            drift_threshold: config.drift_threshold,
        }
    }

    pub fn current_time(&self) -> TimeUs {
        self.current_time
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Playing
    }

    pub fn bound(&self) -> TimeUs {
        self.bound
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            time: self.current_time,
            state: self.state,
            duration: self.bound,
        }
    }

    /// Start playing. Returns `false` if already playing.
    pub fn play(&mut self) -> bool {
        if self.state == ClockState::Playing {
            return false;
        }
        self.state = ClockState::Playing;
        self.rebase();
        tracing::debug!(time = %self.current_time, "clock playing");
        true
    }

    /// Halt at the current position. Returns `false` if not playing.
    pub fn pause(&mut self) -> bool {
        if self.state != ClockState::Playing {
            return false;
        }
        self.state = ClockState::Paused;
        tracing::debug!(time = %self.current_time, "clock paused");
        true
    }

    /// Halt without moving the cursor. Rewinding is reserved for reaching the end.
    pub fn stop(&mut self) {
        if self.state != ClockState::Stopped {
            tracing::debug!(time = %self.current_time, "clock stopped");
        }
        self.state = ClockState::Stopped;
    }

    /// Jump to `time` (clamped) regardless of state. Returns the applied time.
    pub fn seek(&mut self, time: TimeUs) -> TimeUs {
        self.current_time = self.clamp(time);
        self.rebase();
        tracing::debug!(time = %self.current_time, "clock seek");
        self.current_time
    }

    /// Advance one tick. A cursor already at the end stops the clock and
    /// rewinds it, so reaching the end lands on a tick boundary first.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != ClockState::Playing {
            return TickOutcome::Idle;
        }
        if self.current_time >= self.bound {
            self.state = ClockState::Stopped;
            self.current_time = TimeUs::ZERO;
            self.rebase();
            tracing::debug!("clock reached end");
            return TickOutcome::ReachedEnd;
        }
        self.ticks += 1;
        let elapsed = TimeUs(self.ticks.saturating_mul(1_000_000) / self.tick_hz);
        self.current_time = self.clamp(self.anchor + elapsed);
        TickOutcome::Advanced(self.current_time)
    }

    /// Consider a position reported by the renderer. It is adopted only while
    /// playing and only when it diverges by more than the drift threshold.
    pub fn reconcile(&mut self, reported: TimeUs) -> bool {
        if self.state != ClockState::Playing {
            return false;
        }
        if reported.abs_diff(self.current_time) <= self.drift_threshold {
            return false;
        }
        tracing::debug!(from = %self.current_time, to = %reported, "clock adopting renderer position");
        self.current_time = self.clamp(reported);
        self.rebase();
        true
    }

    /// Refresh the upper bound after the timeline changed shape.
    pub fn set_bound(&mut self, duration: TimeUs) {
        self.bound = duration.max(TimeUs::ZERO);
        let clamped = self.clamp(self.current_time);
        if clamped != self.current_time {
            self.current_time = clamped;
            self.rebase();
        }
    }

    fn rebase(&mut self) {
        self.anchor = self.current_time;
        self.ticks = 0;
    }

    fn clamp(&self, time: TimeUs) -> TimeUs {
        time.clamp(TimeUs::ZERO, self.bound)
    }
}
