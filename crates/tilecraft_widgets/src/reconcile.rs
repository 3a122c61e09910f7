//! Optimistic state reconciliation
//!
//! After a local change the widget stops taking its value from backend
//! state, so a stale echo of the old state cannot overwrite what the user
//! just set. A reset timer turns tracking back on.
//!
//! ```text
//!            suppress()                  reset timer
//! Tracking ─────────────▶ Suppressed ─────────────────▶ Tracking
//!     ▲                    │   ▲  │                         (one re-derive)
//!     │  force_reset()     │   └──┘ suppress() re-arms
//!     └────────────────────┘
//! ```

use tilecraft_core::Timestamp;
use tilecraft_scheduler::TimerSlots;

use crate::pipeline::TimerKind;

/// Default delay before backend state is trusted again
pub const DEFAULT_RESET_DELAY_MS: i64 = 1_000;

/// The `from_hass` gate
#[derive(Debug, Clone)]
pub struct Reconciler {
    from_hass: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self { from_hass: true }
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether backend updates drive the displayed value
    pub fn is_tracking(&self) -> bool {
        self.from_hass
    }

    /// A local change took effect: close the gate and (re)arm the reset
    pub fn suppress(&mut self, timers: &mut TimerSlots<TimerKind>, now: Timestamp, delay: i64) {
        self.from_hass = false;
        timers.arm_once(TimerKind::ReconcileReset, now, delay);
        tracing::debug!(delay, "backend tracking suspended");
    }

    /// Close the gate with no reset pending, for edits still in progress
    pub fn hold(&mut self, timers: &mut TimerSlots<TimerKind>) {
        self.from_hass = false;
        timers.cancel(TimerKind::ReconcileReset);
    }

    /// Reopen the gate immediately
    pub fn force_reset(&mut self, timers: &mut TimerSlots<TimerKind>) {
        timers.cancel(TimerKind::ReconcileReset);
        if !self.from_hass {
            tracing::debug!("backend tracking restored early");
        }
        self.from_hass = true;
    }

    /// The reset timer fired
    pub fn on_reset(&mut self) {
        tracing::debug!("backend tracking resumed");
        self.from_hass = true;
    }
}
