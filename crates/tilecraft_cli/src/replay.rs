//! Trace replay
//!
//! A trace is a JSON array of timestamped steps. Before each step every
//! timer due by its timestamp fires, so the replay follows the same timeline
//! a live event loop would.
//!
//! ```json
//! [
//!   { "at": 0,    "event": "press",   "tile": 0, "x": 10, "y": 10 },
//!   { "at": 60,   "event": "release", "tile": 0, "x": 10, "y": 10 },
//!   { "at": 2000, "event": "advance" }
//! ]
//! ```

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tilecraft_core::{
    CardConfig, HassSnapshot, InputEvent, Key, KeyState, KeyboardEvent, Part, PointerEvent,
    PointerKind, SimpleTemplates, Timestamp,
};
use tilecraft_widgets::{Card, ConfirmationRequest, HostCall, RecordingHost};

/// One step of a trace
#[derive(Debug, Clone, Deserialize)]
pub struct TraceStep {
    pub at: Timestamp,
    #[serde(flatten)]
    pub event: TraceEvent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Press {
        tile: usize,
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        part: Part,
        #[serde(default)]
        pointer: PointerKind,
    },
    Move {
        tile: usize,
        x: f32,
        y: f32,
    },
    Release {
        tile: usize,
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
    },
    Leave {
        tile: usize,
        #[serde(default)]
        pointer: PointerKind,
    },
    Cancel {
        tile: usize,
    },
    /// DOM key name, e.g. `Enter` or `ArrowUp`
    Key {
        tile: usize,
        key: String,
        #[serde(default = "pressed")]
        state: KeyState,
    },
    Focus {
        tile: usize,
    },
    Edit {
        tile: usize,
        text: String,
    },
    Blur {
        tile: usize,
    },
    /// A click outside every tile
    OutsideClick,
    /// Only fire timers
    Advance,
    /// Answer the oldest open confirmation prompt
    Confirm {
        #[serde(default = "accepted")]
        accept: bool,
    },
    /// Replace the backend snapshot
    States {
        states: HassSnapshot,
    },
}

fn pressed() -> KeyState {
    KeyState::Pressed
}

fn accepted() -> bool {
    true
}

impl TraceEvent {
    /// The tile and input event this step delivers, if it is an input
    fn input(&self) -> Option<(usize, InputEvent)> {
        let input = match self {
            TraceEvent::Press {
                tile,
                x,
                y,
                part,
                pointer,
            } => (
                *tile,
                InputEvent::Pointer(PointerEvent::Down {
                    x: *x,
                    y: *y,
                    pointer: *pointer,
                    part: *part,
                }),
            ),
            TraceEvent::Move { tile, x, y } => (*tile, InputEvent::move_to(*x, *y)),
            TraceEvent::Release { tile, x, y } => (*tile, InputEvent::release(*x, *y)),
            TraceEvent::Leave { tile, pointer } => (
                *tile,
                InputEvent::Pointer(PointerEvent::Left { pointer: *pointer }),
            ),
            TraceEvent::Cancel { tile } => (*tile, InputEvent::Pointer(PointerEvent::Cancelled)),
            TraceEvent::Key { tile, key, state } => (
                *tile,
                InputEvent::Keyboard(KeyboardEvent::new(Key::from_dom(key), *state)),
            ),
            TraceEvent::Focus { tile } => (*tile, InputEvent::Focus),
            TraceEvent::Edit { tile, text } => (*tile, InputEvent::Edit(text.clone())),
            TraceEvent::Blur { tile } => (*tile, InputEvent::Blur),
            _ => return None,
        };
        Some(input)
    }
}

/// One printed line: a host call stamped with the step time
#[derive(Serialize)]
struct CallLine<'a> {
    at: Timestamp,
    #[serde(flatten)]
    call: &'a HostCall,
}

/// A mounted card driven by a recording host
pub struct Replay {
    card: Card,
    host: RecordingHost,
    prompts: VecDeque<ConfirmationRequest>,
}

impl Replay {
    pub fn new(config: CardConfig, hass: HassSnapshot) -> Result<Self> {
        let mut card = Card::from_config(config, Arc::new(SimpleTemplates::new()))?;
        card.connect();
        card.set_hass(Arc::new(hass), 0);
        Ok(Self {
            card,
            host: RecordingHost::new(),
            prompts: VecDeque::new(),
        })
    }

    pub fn run(&mut self, steps: &[TraceStep], out: &mut impl Write) -> Result<()> {
        for step in steps {
            self.card
                .advance(step.at, &mut self.host)
                .with_context(|| format!("Timer failed before step at {}", step.at))?;
            self.flush(step.at, out)?;

            self.apply(step)
                .with_context(|| format!("Step at {} failed", step.at))?;
            self.flush(step.at, out)?;
        }
        Ok(())
    }

    fn apply(&mut self, step: &TraceStep) -> Result<()> {
        if let Some((tile, input)) = step.event.input() {
            self.card.handle_input(tile, input, step.at, &mut self.host)?;
            return Ok(());
        }
        match &step.event {
            TraceEvent::OutsideClick => self.card.click_outside(),
            TraceEvent::Confirm { accept } => {
                let Some(prompt) = self.prompts.pop_front() else {
                    tracing::warn!(at = step.at, "no confirmation prompt to answer");
                    return Ok(());
                };
                self.card
                    .confirm(prompt.tile, prompt.id, *accept, step.at, &mut self.host)?;
            }
            TraceEvent::States { states } => {
                self.card.set_hass(Arc::new(states.clone()), step.at);
            }
            _ => {}
        }
        Ok(())
    }

    /// Print and drain the recorded calls, remembering new prompts
    fn flush(&mut self, at: Timestamp, out: &mut impl Write) -> Result<()> {
        for call in self.host.take_calls() {
            if let HostCall::Confirmation(request) = &call {
                self.prompts.push_back(request.clone());
            }
            writeln!(out, "{}", serde_json::to_string(&CallLine { at, call: &call })?)?;
        }
        Ok(())
    }

    pub fn write_views(&self, out: &mut impl Write) -> Result<()> {
        for view in self.card.views() {
            writeln!(out, "{}", serde_json::to_string(&view)?)?;
        }
        Ok(())
    }

    pub fn card(&self) -> &Card {
        &self.card
    }
}
