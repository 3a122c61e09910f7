//! The seam between widgets and the dashboard framework
//!
//! Widgets never talk to the backend directly. Everything that leaves a
//! widget goes through [`HostBridge`]: service calls and other intents,
//! confirmation prompts, haptic feedback and render requests.

use serde::Serialize;
use slotmap::new_key_type;
use tilecraft_core::{DispatchError, Entry, HostAction, TileId};

#[cfg(feature = "eval")]
use tilecraft_core::RenderContext;

new_key_type! {
    /// A confirmation prompt awaiting the user's answer
    pub struct ConfirmationId;
}

/// Categorical haptic feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticKind {
    Light,
    Medium,
    Heavy,
    Selection,
    Success,
    Warning,
    Failure,
}

/// A prompt the host must show before an action is dispatched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationRequest {
    #[serde(skip)]
    pub id: ConfirmationId,
    /// The widget waiting for the answer
    pub tile: TileId,
    /// Rendered prompt text
    pub text: String,
}

/// Host framework entry points used by widgets
pub trait HostBridge {
    /// Execute a normalized intent (service call, navigation, ...)
    fn perform(&mut self, action: HostAction) -> Result<(), DispatchError>;

    /// Show a confirmation prompt; the answer comes back through the
    /// widget's `confirm`
    fn request_confirmation(&mut self, request: ConfirmationRequest);

    /// The user declined a confirmation for `entry`
    fn confirmation_failed(&mut self, entry: &Entry);

    /// Fire-and-forget haptic feedback
    fn haptic(&mut self, kind: HapticKind);

    /// A widget's view changed outside of an input event
    fn request_render(&mut self);

    /// The current user, for confirmation exemptions
    fn user_id(&self) -> Option<&str>;

    /// Run an `eval` action expression. Trusted configuration only.
    #[cfg(feature = "eval")]
    fn eval(&mut self, expression: &str, ctx: &RenderContext<'_>) -> Result<(), DispatchError>;
}

/// One recorded host interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    Perform { intent: HostAction },
    Confirmation(ConfirmationRequest),
    ConfirmationFailed { entity_id: Option<String> },
    Haptic { kind: HapticKind },
    Render,
    #[cfg(feature = "eval")]
    Eval { expression: String },
}

/// Host that records every call, for tests and trace replay
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Vec<HostCall>,
    user: Option<String>,
    fail_next: Option<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the current user id
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Make the next `perform` fail with `message`
    pub fn fail_next_perform(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Drain the recorded calls
    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    /// Intents handed to `perform`, in order
    pub fn performed(&self) -> Vec<&HostAction> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Perform { intent } => Some(intent),
                _ => None,
            })
            .collect()
    }

    /// Haptic signals, in order
    pub fn haptics(&self) -> Vec<HapticKind> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Haptic { kind } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// The most recent confirmation prompt
    pub fn last_confirmation(&self) -> Option<&ConfirmationRequest> {
        self.calls.iter().rev().find_map(|c| match c {
            HostCall::Confirmation(request) => Some(request),
            _ => None,
        })
    }

    pub fn render_requests(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HostCall::Render))
            .count()
    }
}

impl HostBridge for RecordingHost {
    fn perform(&mut self, action: HostAction) -> Result<(), DispatchError> {
        if let Some(message) = self.fail_next.take() {
            return Err(DispatchError::Host(message));
        }
        self.calls.push(HostCall::Perform { intent: action });
        Ok(())
    }

    fn request_confirmation(&mut self, request: ConfirmationRequest) {
        self.calls.push(HostCall::Confirmation(request));
    }

    fn confirmation_failed(&mut self, entry: &Entry) {
        self.calls.push(HostCall::ConfirmationFailed {
            entity_id: entry.entity_id.clone(),
        });
    }

    fn haptic(&mut self, kind: HapticKind) {
        self.calls.push(HostCall::Haptic { kind });
    }

    fn request_render(&mut self) {
        self.calls.push(HostCall::Render);
    }

    fn user_id(&self) -> Option<&str> {
        self.user.as_deref()
    }

    #[cfg(feature = "eval")]
    fn eval(&mut self, expression: &str, _ctx: &RenderContext<'_>) -> Result<(), DispatchError> {
        if let Some(message) = self.fail_next.take() {
            return Err(DispatchError::Eval(message));
        }
        self.calls.push(HostCall::Eval {
            expression: expression.to_string(),
        });
        Ok(())
    }
}
