//! The interaction pipeline shared by every widget
//!
//! Each widget owns one [`Pipeline`] and layers its own input handling on
//! top. The pipeline holds everything the variants have in common:
//!
//! - the entry and the backend snapshot it reads from
//! - the displayed value and the reconciliation gate guarding it
//! - template rendering against a context built from widget state
//! - action resolution, confirmation and dispatch
//! - the widget's timers and gesture classifier
//!
//! Nothing runs on its own. The host delivers input, snapshots and clock
//! ticks; timers come due only inside [`Pipeline::pop_timer`].

use std::sync::Arc;

use serde_json::{Map, Value};
use slotmap::SlotMap;
use tilecraft_core::resolver::number_of;
use tilecraft_core::template::{display, format_fixed, is_truthy, precision_of};
use tilecraft_core::{
    build_context, deep_render, render_template, resolve, Action, ActionKind, ConfigError,
    ContextInputs, DispatchError, Entry, HassSnapshot, InteractionKind, RenderContext, Resolved,
    TemplateEngine, TileId, Timestamp, LIVE_REFRESH_MS,
};
use tilecraft_scheduler::TimerSlots;

use crate::gesture::{
    GestureClassifier, GestureConfig, HoldMode, SwipeGuard, DEFAULT_DOUBLE_TAP_MS,
    DEFAULT_HOLD_MS, DEFAULT_REPEAT_MS,
};
use crate::host::{ConfirmationId, ConfirmationRequest, HapticKind, HostBridge};
use crate::reconcile::{Reconciler, DEFAULT_RESET_DELAY_MS};

/// Default `[min, max]` for numeric widgets
pub const DEFAULT_RANGE: (f64, f64) = (0.0, 100.0);
/// Default step for numeric widgets
pub const DEFAULT_STEP: f64 = 1.0;

/// Timer slots of one widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Hold threshold
    Hold,
    /// Repeat interval of a `repeat` hold
    Repeat,
    /// Double-tap window
    DoubleTap,
    /// Reopen the reconciliation gate
    ReconcileReset,
    /// Refresh a live value
    ValuePoll,
    /// Spinbox dispatch debounce
    Debounce,
}

/// Result of asking the pipeline to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No action, or `none` / `repeat`
    Skipped,
    /// Handed to the host
    Dispatched,
    /// Waiting for the user to answer a confirmation prompt
    AwaitingConfirmation(ConfirmationId),
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    action: Action,
    overrides: Option<Map<String, Value>>,
}

/// Shared per-widget state and behavior
pub struct Pipeline {
    id: TileId,
    entry: Entry,
    config_snapshot: Value,
    engine: Arc<dyn TemplateEngine>,
    hass: Option<Arc<HassSnapshot>>,
    value: Option<Value>,
    precision: Option<usize>,
    reconciler: Reconciler,
    timers: TimerSlots<TimerKind>,
    gesture: GestureClassifier,
    confirmations: SlotMap<ConfirmationId, PendingConfirmation>,
    connected: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("kind", &self.entry.kind)
            .field("value", &self.value)
            .field("tracking", &self.reconciler.is_tracking())
            .field("pending_confirmations", &self.confirmations.len())
            .finish()
    }
}

impl Pipeline {
    /// Build the pipeline for a validated entry
    pub fn new(mut entry: Entry, engine: Arc<dyn TemplateEngine>) -> Result<Self, ConfigError> {
        entry.validate()?;
        entry.autofill(None);
        let config_snapshot = serde_json::to_value(&entry)?;
        let mut pipeline = Self {
            id: TileId::next(),
            entry,
            config_snapshot,
            engine,
            hass: None,
            value: None,
            precision: None,
            reconciler: Reconciler::new(),
            timers: TimerSlots::new(),
            gesture: GestureClassifier::default(),
            confirmations: SlotMap::with_key(),
            connected: true,
        };
        pipeline.refresh_precision();
        tracing::debug!(id = ?pipeline.id, kind = ?pipeline.entry.kind, "pipeline created");
        Ok(pipeline)
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn hass(&self) -> Option<&HassSnapshot> {
        self.hass.as_deref()
    }

    /// Current displayed value (`None` is undefined)
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Decimal digits derived from the step, if a step is configured
    pub fn precision(&self) -> Option<usize> {
        self.precision
    }

    /// Whether backend state drives the displayed value
    pub fn is_tracking(&self) -> bool {
        self.reconciler.is_tracking()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn gesture(&self) -> &GestureClassifier {
        &self.gesture
    }

    pub fn timers(&self) -> &TimerSlots<TimerKind> {
        &self.timers
    }

    /// Gesture classifier and timers together, for input handlers
    pub fn gesture_parts(&mut self) -> (&mut GestureClassifier, &mut TimerSlots<TimerKind>) {
        (&mut self.gesture, &mut self.timers)
    }

    pub fn timers_mut(&mut self) -> &mut TimerSlots<TimerKind> {
        &mut self.timers
    }

    pub fn pending_confirmations(&self) -> usize {
        self.confirmations.len()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn context_with(
        &self,
        entity: Option<&str>,
        attribute: Option<&str>,
        overrides: Option<Map<String, Value>>,
    ) -> RenderContext<'_> {
        build_context(
            &*self.engine,
            self.hass.as_deref(),
            ContextInputs {
                value: self.value.as_ref(),
                precision: self.precision,
                unit: self.entry.unit_of_measurement.as_deref(),
                hold_secs: self.gesture.hold_secs(),
                pointer: self.gesture.deltas(),
                config: Some(self.config_snapshot.clone()),
                entity,
                attribute,
            },
            overrides,
        )
    }

    /// The full render context, with caller overrides on top
    pub fn context(&self, overrides: Option<Map<String, Value>>) -> RenderContext<'_> {
        let entity = self.entity_id();
        let attribute = self.value_attribute();
        self.context_with(entity.as_deref(), attribute.as_deref(), overrides)
    }

    /// Render one configuration value
    pub fn render(&self, raw: &Value) -> Value {
        render_template(&self.context(None), raw)
    }

    /// Render a string field to text
    pub fn render_str(&self, raw: &str) -> String {
        display(&self.render(&Value::String(raw.to_string())))
    }

    /// Render a numeric knob (number or template), falling back to `default`
    pub fn render_number(&self, raw: Option<&Value>, default: f64) -> f64 {
        raw.map(|raw| self.render(raw))
            .as_ref()
            .and_then(number_of)
            .filter(|n| n.is_finite())
            .unwrap_or(default)
    }

    fn render_ms(&self, raw: Option<&Value>, default: i64) -> i64 {
        self.render_number(raw, default as f64).max(0.0) as i64
    }

    /// Render a flag (bool or template)
    pub fn render_flag(&self, raw: Option<&Value>) -> bool {
        raw.map(|raw| is_truthy(&self.render(raw))).unwrap_or(false)
    }

    /// The rendered target entity id
    ///
    /// Rendered without `config.entity`, which is derived from it.
    pub fn entity_id(&self) -> Option<String> {
        let raw = self.entry.entity_id.as_deref()?;
        if !raw.contains("{{") {
            return Some(raw.to_string());
        }
        let ctx = self.context_with(None, None, None);
        let rendered = display(&render_template(&ctx, &Value::String(raw.to_string())));
        (!rendered.is_empty()).then_some(rendered)
    }

    /// The rendered value attribute path
    pub fn value_attribute(&self) -> Option<String> {
        let raw = self.entry.value_attribute.as_deref()?;
        if !raw.contains("{{") {
            return Some(raw.to_string());
        }
        let ctx = self.context_with(None, None, None);
        let rendered = display(&render_template(&ctx, &Value::String(raw.to_string())));
        (!rendered.is_empty()).then_some(rendered)
    }

    /// Rendered `[min, max]`, defaulting to `[0, 100]`
    pub fn range(&self) -> (f64, f64) {
        let (dmin, dmax) = DEFAULT_RANGE;
        let Some([min, max]) = &self.entry.range else {
            return DEFAULT_RANGE;
        };
        let min = self.render_number(Some(min), dmin);
        let max = self.render_number(Some(max), dmax);
        if min < max {
            (min, max)
        } else {
            tracing::warn!(min, max, "rendered range is empty; using default");
            DEFAULT_RANGE
        }
    }

    /// Rendered step, defaulting to 1
    pub fn step(&self) -> f64 {
        let step = self.render_number(self.entry.step.as_ref(), DEFAULT_STEP);
        if step > 0.0 {
            step
        } else {
            DEFAULT_STEP
        }
    }

    fn refresh_precision(&mut self) {
        self.precision = self.entry.step.as_ref().map(|_| precision_of(self.step()));
    }

    /// Displayed value as text, with the step's precision applied to numbers
    pub fn value_text(&self) -> Option<String> {
        let value = self.value.as_ref()?;
        let numeric = match value {
            Value::Number(_) | Value::String(_) => number_of(value),
            _ => None,
        };
        Some(match (self.precision, numeric) {
            (Some(p), Some(n)) => format_fixed(n, p),
            _ => display(value),
        })
    }

    // ========================================================================
    // Backend state
    // ========================================================================

    /// Take a new backend snapshot
    ///
    /// Returns whether the displayed value changed. While the gate is closed
    /// the snapshot is stored but the value is left alone.
    pub fn set_hass(&mut self, hass: Arc<HassSnapshot>, now: Timestamp) -> bool {
        self.hass = Some(hass);
        self.refresh_precision();
        self.update_value(now)
    }

    fn resolve_backend(&self, now: Timestamp) -> Resolved {
        let (Some(entity_id), Some(hass)) = (self.entity_id(), self.hass.as_deref()) else {
            return Resolved::default();
        };
        let Some(entity) = hass.get(&entity_id) else {
            tracing::trace!(%entity_id, "entity not in snapshot");
            return Resolved::default();
        };
        let attribute = self.value_attribute();
        resolve(&entity_id, entity, attribute.as_deref(), now)
    }

    /// Re-derive the value from backend state, if the gate allows it
    pub fn update_value(&mut self, now: Timestamp) -> bool {
        if !self.reconciler.is_tracking() {
            return false;
        }
        let resolved = self.resolve_backend(now);

        if resolved.live && self.connected {
            if !self.timers.is_armed(TimerKind::ValuePoll) {
                self.timers.arm_interval(TimerKind::ValuePoll, now, LIVE_REFRESH_MS);
            }
        } else {
            self.timers.cancel(TimerKind::ValuePoll);
        }

        let changed = resolved.value != self.value;
        self.value = resolved.value;
        changed
    }

    /// Set the value locally, without touching the gate
    pub fn set_local_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    /// A local change took effect: stop tracking until the reset delay passes
    pub fn suppress(&mut self, now: Timestamp) {
        let delay = self.render_ms(self.entry.value_from_hass_delay.as_ref(), DEFAULT_RESET_DELAY_MS);
        self.reconciler.suppress(&mut self.timers, now, delay);
    }

    /// Stop tracking while an edit is in progress
    pub fn hold_gate(&mut self) {
        self.reconciler.hold(&mut self.timers);
    }

    /// Resume tracking now and re-derive the value
    pub fn force_reset(&mut self, now: Timestamp) -> bool {
        self.reconciler.force_reset(&mut self.timers);
        self.update_value(now)
    }

    // ========================================================================
    // Gestures and timers
    // ========================================================================

    /// Gesture parameters from the entry's actions
    pub fn gesture_config(&self, swipe: Option<SwipeGuard>) -> GestureConfig {
        let hold = self
            .entry
            .hold_action
            .as_ref()
            .filter(|a| a.action != ActionKind::None);
        let double_tap = self
            .entry
            .double_tap_action
            .as_ref()
            .filter(|a| a.action.is_dispatchable());

        GestureConfig {
            hold: hold.map(|a| match a.action {
                ActionKind::Repeat => HoldMode::Repeat,
                _ => HoldMode::Fire,
            }),
            hold_time: self.render_ms(hold.and_then(|a| a.hold_time.as_ref()), DEFAULT_HOLD_MS),
            repeat_delay: self
                .render_ms(hold.and_then(|a| a.repeat_delay.as_ref()), DEFAULT_REPEAT_MS),
            double_tap_window: double_tap.map(|a| {
                self.render_ms(a.double_tap_window.as_ref(), DEFAULT_DOUBLE_TAP_MS)
            }),
            momentary: self.entry.momentary_start_action.is_some()
                || self.entry.momentary_end_action.is_some(),
            swipe,
        }
    }

    /// Refresh gesture parameters before a press
    pub fn configure_gesture(&mut self, config: GestureConfig) {
        self.gesture.configure(config);
    }

    /// Take the next timer due at or before `now`
    pub fn pop_timer(&mut self, now: Timestamp) -> Option<(TimerKind, Timestamp)> {
        if !self.connected {
            return None;
        }
        self.timers.pop_due(now)
    }

    /// Handle a timer common to all widgets
    ///
    /// Gesture timers may produce an interaction for the widget to act on.
    pub fn on_timer(
        &mut self,
        kind: TimerKind,
        at: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Option<InteractionKind> {
        match kind {
            TimerKind::Hold | TimerKind::Repeat | TimerKind::DoubleTap => {
                self.gesture.on_timer(kind, at, &mut self.timers)
            }
            TimerKind::ReconcileReset => {
                self.reconciler.on_reset();
                self.update_value(at);
                host.request_render();
                None
            }
            TimerKind::ValuePoll => {
                if self.update_value(at) {
                    host.request_render();
                }
                None
            }
            TimerKind::Debounce => None,
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Emit haptic feedback if the entry enables it
    pub fn haptic(&self, kind: HapticKind, host: &mut dyn HostBridge) {
        if self.render_flag(self.entry.haptics.as_ref()) {
            host.haptic(kind);
        }
    }

    /// Dispatch the entry's action for an interaction
    pub fn send_action(
        &mut self,
        kind: InteractionKind,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<DispatchOutcome, DispatchError> {
        let action = self.entry.action_for(kind).cloned();
        self.send_resolved(action, kind, None, now, host)
    }

    /// Dispatch an already resolved action
    ///
    /// The action is deep-rendered against the current context (plus
    /// `overrides`), then confirmed if its policy requires it, then handed to
    /// the host. A dispatch failure resets interaction state before it is
    /// returned.
    pub fn send_resolved(
        &mut self,
        action: Option<Action>,
        kind: InteractionKind,
        overrides: Option<Map<String, Value>>,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(action) = action.filter(|a| a.action.is_dispatchable()) else {
            tracing::trace!(?kind, "no dispatchable action");
            return Ok(DispatchOutcome::Skipped);
        };

        let rendered = match self.render_action(&action, overrides.clone()) {
            Ok(rendered) => rendered,
            Err(err) => {
                self.end_action(now);
                return Err(err);
            }
        };

        self.haptic(interaction_haptic(kind), host);

        let prompt = rendered
            .confirmation
            .as_ref()
            .filter(|policy| policy.required_for(host.user_id()))
            .map(|policy| {
                policy
                    .text()
                    .map(str::to_string)
                    .unwrap_or_else(|| default_confirmation_text(&rendered))
            });
        if let Some(text) = prompt {
            let id = self.confirmations.insert(PendingConfirmation {
                action: rendered,
                overrides,
            });
            tracing::debug!(?kind, "awaiting confirmation");
            self.haptic(HapticKind::Warning, host);
            host.request_confirmation(ConfirmationRequest {
                id,
                tile: self.id,
                text,
            });
            return Ok(DispatchOutcome::AwaitingConfirmation(id));
        }

        match self.execute(&rendered, overrides, host) {
            Ok(()) => Ok(DispatchOutcome::Dispatched),
            Err(err) => {
                tracing::warn!(%err, "dispatch failed; resetting interaction state");
                self.end_action(now);
                Err(err)
            }
        }
    }

    fn render_action(
        &self,
        action: &Action,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Action, DispatchError> {
        let raw = serde_json::to_value(action)
            .map_err(|e| DispatchError::InvalidAction(e.to_string()))?;
        let ctx = self.context(overrides);
        let rendered = deep_render(&ctx, &raw);
        serde_json::from_value(rendered).map_err(|e| DispatchError::InvalidAction(e.to_string()))
    }

    #[cfg_attr(not(feature = "eval"), allow(unused_variables))]
    fn execute(
        &self,
        action: &Action,
        overrides: Option<Map<String, Value>>,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        #[cfg(feature = "eval")]
        if action.action == ActionKind::Eval {
            let expression = action
                .eval
                .as_deref()
                .ok_or_else(|| DispatchError::InvalidAction("eval without expression".into()))?;
            tracing::debug!("running eval action");
            let ctx = self.context(overrides);
            return host.eval(expression, &ctx);
        }

        if let Some(intent) = action.to_host_action()? {
            tracing::debug!(?intent, "dispatching");
            host.perform(intent)?;
        }
        Ok(())
    }

    /// Answer a confirmation prompt
    pub fn confirm(
        &mut self,
        id: ConfirmationId,
        accepted: bool,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<DispatchOutcome, DispatchError> {
        let pending = self
            .confirmations
            .remove(id)
            .ok_or(DispatchError::UnknownConfirmation)?;

        if !accepted {
            tracing::debug!("confirmation declined");
            host.confirmation_failed(&self.entry);
            self.haptic(HapticKind::Failure, host);
            self.force_reset(now);
            host.request_render();
            return Ok(DispatchOutcome::Skipped);
        }

        match self.execute(&pending.action, pending.overrides, host) {
            Ok(()) => Ok(DispatchOutcome::Dispatched),
            Err(err) => {
                tracing::warn!(%err, "confirmed dispatch failed; resetting interaction state");
                self.end_action(now);
                Err(err)
            }
        }
    }

    /// Reset interaction state: timers, gesture and the gate
    pub fn end_action(&mut self, now: Timestamp) {
        self.gesture.reset(&mut self.timers);
        self.timers.cancel_all();
        self.reconciler.force_reset(&mut self.timers);
        self.update_value(now);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// Tear down: cancel every timer and drop pending confirmations
    pub fn disconnect(&mut self) {
        self.gesture.reset(&mut self.timers);
        self.timers.cancel_all();
        self.confirmations.clear();
        self.connected = false;
        tracing::debug!(id = ?self.id, "pipeline disconnected");
    }
}

fn interaction_haptic(kind: InteractionKind) -> HapticKind {
    match kind {
        InteractionKind::Tap | InteractionKind::MomentaryStart | InteractionKind::MomentaryEnd => {
            HapticKind::Light
        }
        InteractionKind::Hold => HapticKind::Medium,
        InteractionKind::DoubleTap => HapticKind::Success,
    }
}

fn default_confirmation_text(action: &Action) -> String {
    let name = action
        .perform_action
        .as_deref()
        .unwrap_or_else(|| action.action.tag());
    format!("Are you sure you want to run action '{name}'?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, RecordingHost};
    use serde_json::json;
    use tilecraft_core::{EntityState, HostAction, SimpleTemplates};

    fn pipeline(entry: Value) -> Pipeline {
        let entry = Entry::from_value(entry).unwrap();
        Pipeline::new(entry, Arc::new(SimpleTemplates::new())).unwrap()
    }

    fn snapshot(entity: &str, state: EntityState) -> Arc<HassSnapshot> {
        Arc::new(HassSnapshot::new().with_entity(entity, state))
    }

    #[test]
    fn test_value_tracks_backend() {
        let mut p = pipeline(json!({ "entity_id": "sensor.t", "value_attribute": "temperature" }));
        assert!(p.set_hass(snapshot("sensor.t", EntityState::new("ok").with_attr("temperature", 20)), 0));
        assert_eq!(p.value(), Some(&json!(20)));
        assert!(!p.set_hass(snapshot("sensor.t", EntityState::new("ok").with_attr("temperature", 20)), 1));
    }

    #[test]
    fn test_gate_blocks_backend_until_reset() {
        let mut p = pipeline(json!({ "entity_id": "input_number.x" }));
        let mut host = RecordingHost::new();
        p.set_hass(snapshot("input_number.x", EntityState::new("10")), 0);

        p.set_local_value(Some(json!(42)));
        p.suppress(100);

        // echoes and polls during the window are ignored
        for (i, state) in ["10", "11", "12"].iter().enumerate() {
            let now = 200 + i as i64 * 100;
            assert!(!p.set_hass(snapshot("input_number.x", EntityState::new(*state)), now));
            assert_eq!(p.value(), Some(&json!(42)));
        }

        while let Some((kind, at)) = p.pop_timer(1_100) {
            p.on_timer(kind, at, &mut host);
        }
        assert!(p.is_tracking());
        assert_eq!(p.value(), Some(&json!("12")));
        assert_eq!(host.render_requests(), 1);
    }

    #[test]
    fn test_templated_reset_delay() {
        let mut p = pipeline(json!({
            "entity_id": "input_number.x",
            "value_from_hass_delay": "{{ 2500 }}"
        }));
        p.suppress(0);
        assert_eq!(p.timers().deadline(TimerKind::ReconcileReset), Some(2_500));
    }

    #[test]
    fn test_live_value_polls() {
        let mut p = pipeline(json!({ "entity_id": "timer.tea", "value_attribute": "elapsed" }));
        let mut host = RecordingHost::new();
        let timer = EntityState::new("active")
            .with_attr("duration", "0:01:00")
            .with_attr("finishes_at", "1970-01-01T00:01:00+00:00");
        p.set_hass(snapshot("timer.tea", timer), 0);
        assert_eq!(p.value(), Some(&json!(0.0)));
        assert!(p.timers().is_armed(TimerKind::ValuePoll));

        while let Some((kind, at)) = p.pop_timer(1_000) {
            p.on_timer(kind, at, &mut host);
        }
        assert_eq!(p.value(), Some(&json!(1.0)));
        assert_eq!(host.render_requests(), 2);

        p.set_hass(snapshot("timer.tea", EntityState::new("idle")), 1_200);
        assert!(!p.timers().is_armed(TimerKind::ValuePoll));
    }

    #[test]
    fn test_send_action_dispatches_rendered_intent() {
        let mut p = pipeline(json!({
            "entity_id": "light.kitchen",
            "tap_action": {
                "action": "perform-action",
                "perform_action": "light.turn_on",
                "data": { "brightness_pct": "{{ value | int }}" }
            }
        }));
        let mut host = RecordingHost::new();
        p.set_local_value(Some(json!("40")));
        let outcome = p.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched);

        let performed = host.performed();
        let HostAction::CallService { domain, service, data, target } = performed[0] else {
            panic!("expected a service call");
        };
        assert_eq!((domain.as_str(), service.as_str()), ("light", "turn_on"));
        assert_eq!(data.get("brightness_pct"), Some(&json!(40)));
        // auto-filled target
        assert_eq!(target.get("entity_id"), Some(&json!("light.kitchen")));
    }

    #[test]
    fn test_hold_falls_back_to_tap_momentary_does_not() {
        let mut p = pipeline(json!({
            "tap_action": { "action": "navigate", "navigation_path": "/lights" }
        }));
        let mut host = RecordingHost::new();
        assert_eq!(
            p.send_action(InteractionKind::Hold, 0, &mut host),
            Ok(DispatchOutcome::Dispatched)
        );
        assert_eq!(
            p.send_action(InteractionKind::MomentaryStart, 0, &mut host),
            Ok(DispatchOutcome::Skipped)
        );
        assert_eq!(host.performed().len(), 1);
    }

    #[test]
    fn test_none_and_repeat_never_dispatch_or_confirm() {
        let mut p = pipeline(json!({
            "tap_action": { "action": "none", "confirmation": true },
            "hold_action": { "action": "repeat", "confirmation": true }
        }));
        let mut host = RecordingHost::new();
        assert_eq!(p.send_action(InteractionKind::Tap, 0, &mut host), Ok(DispatchOutcome::Skipped));
        assert_eq!(p.send_action(InteractionKind::Hold, 0, &mut host), Ok(DispatchOutcome::Skipped));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_confirmation_round_trip() {
        let mut p = pipeline(json!({
            "entity_id": "lock.door",
            "tap_action": {
                "action": "perform-action",
                "perform_action": "lock.unlock",
                "confirmation": { "text": "Unlock {{ config.entity }}?" }
            }
        }));
        let mut host = RecordingHost::new();

        let DispatchOutcome::AwaitingConfirmation(id) =
            p.send_action(InteractionKind::Tap, 0, &mut host).unwrap()
        else {
            panic!("expected a confirmation prompt");
        };
        assert_eq!(host.last_confirmation().unwrap().text, "Unlock lock.door?");
        assert!(host.performed().is_empty());

        assert_eq!(p.confirm(id, true, 10, &mut host), Ok(DispatchOutcome::Dispatched));
        assert_eq!(host.performed().len(), 1);
        // answered once only
        assert_eq!(
            p.confirm(id, true, 20, &mut host),
            Err(DispatchError::UnknownConfirmation)
        );
    }

    #[test]
    fn test_declined_confirmation_resets_gate() {
        let mut p = pipeline(json!({
            "entity_id": "input_number.x",
            "tap_action": {
                "action": "perform-action",
                "perform_action": "input_number.set_value",
                "confirmation": true
            }
        }));
        let mut host = RecordingHost::new();
        p.set_hass(snapshot("input_number.x", EntityState::new("5")), 0);

        p.set_local_value(Some(json!(9)));
        let outcome = p.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        p.suppress(0);
        let DispatchOutcome::AwaitingConfirmation(id) = outcome else {
            panic!("expected a confirmation prompt");
        };
        assert_eq!(
            host.last_confirmation().unwrap().text,
            "Are you sure you want to run action 'input_number.set_value'?"
        );

        assert_eq!(p.confirm(id, false, 50, &mut host), Ok(DispatchOutcome::Skipped));
        assert!(p.is_tracking());
        assert_eq!(p.value(), Some(&json!("5")));
        assert!(host.performed().is_empty());
        assert!(host
            .calls()
            .iter()
            .any(|c| matches!(c, HostCall::ConfirmationFailed { .. })));
    }

    #[test]
    fn test_exempt_user_skips_prompt() {
        let mut p = pipeline(json!({
            "tap_action": {
                "action": "navigate",
                "navigation_path": "/",
                "confirmation": { "exemptions": [{ "user": "abc123" }] }
            }
        }));
        let mut host = RecordingHost::new().with_user("abc123");
        assert_eq!(p.send_action(InteractionKind::Tap, 0, &mut host), Ok(DispatchOutcome::Dispatched));
        assert!(host.last_confirmation().is_none());

        let mut other = RecordingHost::new().with_user("someone");
        assert!(matches!(
            p.send_action(InteractionKind::Tap, 0, &mut other),
            Ok(DispatchOutcome::AwaitingConfirmation(_))
        ));
    }

    #[test]
    fn test_concurrent_confirmations_resolve_independently() {
        let mut p = pipeline(json!({
            "tap_action": { "action": "url", "url_path": "https://a", "confirmation": true }
        }));
        let mut host = RecordingHost::new();
        let first = p.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        let second = p.send_action(InteractionKind::Tap, 5, &mut host).unwrap();
        let (DispatchOutcome::AwaitingConfirmation(a), DispatchOutcome::AwaitingConfirmation(b)) =
            (first, second)
        else {
            panic!("expected two prompts");
        };
        assert_eq!(p.pending_confirmations(), 2);
        p.confirm(b, true, 10, &mut host).unwrap();
        p.confirm(a, false, 20, &mut host).unwrap();
        assert_eq!(host.performed().len(), 1);
        assert_eq!(p.pending_confirmations(), 0);
    }

    #[test]
    fn test_dispatch_failure_resets_and_propagates() {
        let mut p = pipeline(json!({
            "entity_id": "switch.x",
            "tap_action": { "action": "perform-action", "perform_action": "switch.toggle" }
        }));
        let mut host = RecordingHost::new();
        p.suppress(0);
        p.timers_mut().arm_once(TimerKind::Hold, 0, 500);

        host.fail_next_perform("backend unavailable");
        let result = p.send_action(InteractionKind::Tap, 0, &mut host);
        assert_eq!(result, Err(DispatchError::Host("backend unavailable".into())));
        assert!(p.is_tracking());
        assert!(p.timers().is_empty());
    }

    #[test]
    fn test_haptics_follow_flag() {
        let mut p = pipeline(json!({
            "haptics": "{{ true }}",
            "tap_action": { "action": "navigate", "navigation_path": "/" },
            "double_tap_action": { "action": "navigate", "navigation_path": "/x" }
        }));
        let mut host = RecordingHost::new();
        p.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        p.send_action(InteractionKind::DoubleTap, 0, &mut host).unwrap();
        assert_eq!(host.haptics(), vec![HapticKind::Light, HapticKind::Success]);

        let mut quiet = pipeline(json!({
            "tap_action": { "action": "navigate", "navigation_path": "/" }
        }));
        let mut host = RecordingHost::new();
        quiet.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        assert!(host.haptics().is_empty());
    }

    #[test]
    fn test_gesture_config_from_entry() {
        let p = pipeline(json!({
            "tap_action": { "action": "navigate", "navigation_path": "/" },
            "hold_action": { "action": "repeat", "hold_time": 800, "repeat_delay": "{{ 250 }}" },
            "double_tap_action": { "action": "more-info", "double_tap_window": 300 }
        }));
        let config = p.gesture_config(None);
        assert_eq!(config.hold, Some(HoldMode::Repeat));
        assert_eq!(config.hold_time, 800);
        assert_eq!(config.repeat_delay, 250);
        assert_eq!(config.double_tap_window, Some(300));
        assert!(!config.momentary);

        let bare = pipeline(json!({ "momentary_end_action": { "action": "none" } }));
        let config = bare.gesture_config(None);
        assert_eq!(config.hold, None);
        assert_eq!(config.double_tap_window, None);
        assert!(config.momentary);
    }

    #[test]
    fn test_disconnect_stops_everything() {
        let mut p = pipeline(json!({
            "tap_action": { "action": "url", "url_path": "https://a", "confirmation": true }
        }));
        let mut host = RecordingHost::new();
        p.send_action(InteractionKind::Tap, 0, &mut host).unwrap();
        p.suppress(0);

        p.disconnect();
        assert_eq!(p.pending_confirmations(), 0);
        assert_eq!(p.pop_timer(i64::MAX), None);
    }

    #[test]
    fn test_precision_from_step() {
        let mut p = pipeline(json!({ "type": "slider", "entity_id": "input_number.x", "step": 0.5 }));
        p.set_hass(snapshot("input_number.x", EntityState::new("3")), 0);
        assert_eq!(p.precision(), Some(1));
        assert_eq!(p.value_text().as_deref(), Some("3.0"));

        let plain = pipeline(json!({ "entity_id": "sensor.x" }));
        assert_eq!(plain.precision(), None);
    }
}
