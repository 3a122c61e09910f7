//! Tilecraft Scheduler
//!
//! Deterministic timers for widget state machines. Nothing here runs on its
//! own: the host ticks a widget with the current time and the widget drains
//! due timers one at a time with [`TimerSlots::pop_due`], handling each at
//! its own deadline.
//!
//! Two layers:
//!
//! - [`TimerScheduler`]: one-shot and interval timers keyed by [`TimerId`]
//! - [`TimerSlots`]: at most one timer per logical slot (hold, repeat, ...),
//!   always cleared before it is re-armed
//!
//! # Example
//!
//! ```rust
//! use tilecraft_scheduler::TimerSlots;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Slot { Hold, Repeat }
//!
//! let mut timers = TimerSlots::new();
//! timers.arm_once(Slot::Hold, 0, 500);
//! timers.arm_once(Slot::Hold, 100, 500); // replaces the first
//!
//! assert_eq!(timers.pop_due(599), None);
//! assert_eq!(timers.pop_due(600), Some((Slot::Hold, 600)));
//! assert!(!timers.is_armed(Slot::Hold));
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tilecraft_core::Timestamp;

new_key_type! {
    /// Handle to a scheduled timer
    pub struct TimerId;
}

/// Shortest interval period; zero would never let time advance
pub const MIN_PERIOD_MS: i64 = 1;

#[derive(Debug, Clone)]
struct Timer<T> {
    payload: T,
    deadline: Timestamp,
    period: Option<i64>,
    /// Arming order, breaks ties between equal deadlines
    seq: u64,
}

/// A timer that came due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub id: TimerId,
    pub payload: T,
    /// The deadline it fired for (not the tick time)
    pub at: Timestamp,
    /// Whether the timer is still scheduled (intervals)
    pub rearmed: bool,
}

/// One-shot and interval timers
#[derive(Debug, Clone)]
pub struct TimerScheduler<T> {
    timers: SlotMap<TimerId, Timer<T>>,
    next_seq: u64,
}

impl<T> Default for TimerScheduler<T> {
    fn default() -> Self {
        Self {
            timers: SlotMap::with_key(),
            next_seq: 0,
        }
    }
}

impl<T: Clone> TimerScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Fire once at `now + delay`
    pub fn once(&mut self, now: Timestamp, delay: i64, payload: T) -> TimerId {
        let seq = self.seq();
        self.timers.insert(Timer {
            payload,
            deadline: now + delay.max(0),
            period: None,
            seq,
        })
    }

    /// Fire every `period` ms, first at `now + period`
    pub fn interval(&mut self, now: Timestamp, period: i64, payload: T) -> TimerId {
        let period = period.max(MIN_PERIOD_MS);
        let seq = self.seq();
        self.timers.insert(Timer {
            payload,
            deadline: now + period,
            period: Some(period),
            seq,
        })
    }

    /// Cancel a timer; stale ids are ignored
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.timers.remove(id).map(|t| t.payload)
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Timestamp> {
        self.timers.get(id).map(|t| t.deadline)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Take the earliest timer due at or before `now`
    ///
    /// Intervals are re-armed one period after the deadline they fired for,
    /// so a late tick still produces every missed firing in order.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Fired<T>> {
        let (id, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.seq))?;

        let seq = self.seq();
        let timer = self.timers.get_mut(id)?;
        let at = timer.deadline;
        match timer.period {
            Some(period) => {
                timer.deadline += period;
                timer.seq = seq;
                Some(Fired {
                    id,
                    payload: timer.payload.clone(),
                    at,
                    rearmed: true,
                })
            }
            None => {
                let timer = self.timers.remove(id)?;
                Some(Fired {
                    id,
                    payload: timer.payload,
                    at,
                    rearmed: false,
                })
            }
        }
    }
}

/// Named timer slots with clear-then-arm semantics
///
/// Each key holds at most one pending timer. Arming a key that is already
/// armed cancels the old timer first, so overlapping intervals can never
/// accumulate.
#[derive(Debug, Clone)]
pub struct TimerSlots<K> {
    scheduler: TimerScheduler<K>,
    slots: FxHashMap<K, TimerId>,
}

impl<K> Default for TimerSlots<K> {
    fn default() -> Self {
        Self {
            scheduler: TimerScheduler::default(),
            slots: FxHashMap::default(),
        }
    }
}

impl<K> TimerSlots<K>
where
    K: Copy + Eq + Hash + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire once at `now + delay`
    pub fn arm_once(&mut self, key: K, now: Timestamp, delay: i64) {
        self.cancel(key);
        let id = self.scheduler.once(now, delay, key);
        self.slots.insert(key, id);
        tracing::trace!(?key, deadline = now + delay.max(0), "timer armed");
    }

    /// Arm `key` to fire every `period` ms
    pub fn arm_interval(&mut self, key: K, now: Timestamp, period: i64) {
        self.cancel(key);
        let id = self.scheduler.interval(now, period, key);
        self.slots.insert(key, id);
        tracing::trace!(?key, period, "interval armed");
    }

    /// Cancel the timer in `key`; returns whether one was pending
    pub fn cancel(&mut self, key: K) -> bool {
        match self.slots.remove(&key) {
            Some(id) => self.scheduler.cancel(id).is_some(),
            None => false,
        }
    }

    /// Cancel every slot
    pub fn cancel_all(&mut self) {
        if !self.slots.is_empty() {
            tracing::trace!(count = self.slots.len(), "all timers cancelled");
        }
        self.slots.clear();
        self.scheduler.clear();
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn deadline(&self, key: K) -> Option<Timestamp> {
        self.slots.get(&key).and_then(|&id| self.scheduler.deadline(id))
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.scheduler.next_deadline()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take the earliest slot due at or before `now`, with its deadline
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(K, Timestamp)> {
        let fired = self.scheduler.pop_due(now)?;
        if !fired.rearmed {
            self.slots.remove(&fired.payload);
        }
        Some((fired.payload, fired.at))
    }
}
