//! Value resolution from backend entity state
//!
//! Maps an entity snapshot plus an attribute path to the value a widget
//! displays. A handful of attributes get kind-specific post-processing;
//! two of them (`media_position` while playing, `elapsed` on an active
//! timer) are *live*: they change with wall-clock time, so the caller
//! re-resolves on [`LIVE_REFRESH_MS`] ticks while [`Resolved::live`] is set.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::state::{domain_of, EntityState};
use crate::time::{parse_duration_secs, parse_timestamp, TimeParseError, Timestamp};

/// Refresh period for live values
pub const LIVE_REFRESH_MS: i64 = 500;

/// Fallback color when `rgb_color` is not a 3-element array
pub const DEFAULT_COLOR: &str = "var(--state-icon-color)";

/// Outcome of resolving a value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolved {
    /// `None` is the undefined value (missing entity, out-of-range index)
    pub value: Option<Value>,
    /// The value depends on the current time and should be refreshed
    pub live: bool,
}

impl Resolved {
    fn fixed(value: Option<Value>) -> Self {
        Self { value, live: false }
    }

    fn live(value: Value) -> Self {
        Self {
            value: Some(value),
            live: true,
        }
    }
}

/// One `name[0][1]` segment of an attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    indices: SmallVec<[usize; 2]>,
}

/// Parsed `attr.sub[2]` attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<Segment>,
}

impl AttributePath {
    /// Parse a dot/bracket path; `None` if any segment is malformed
    pub fn parse(path: &str) -> Option<Self> {
        static SEGMENT: OnceLock<Regex> = OnceLock::new();
        let re = SEGMENT.get_or_init(|| {
            Regex::new(r"^([^\[\]]+)((?:\[\d+\])*)$").expect("segment pattern is valid")
        });
        static INDEX: OnceLock<Regex> = OnceLock::new();
        let index_re = INDEX.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("index pattern is valid"));

        let mut segments = Vec::new();
        for raw in path.trim().split('.') {
            let caps = re.captures(raw)?;
            let indices = index_re
                .captures_iter(caps.get(2).map_or("", |m| m.as_str()))
                .filter_map(|c| c[1].parse().ok())
                .collect();
            segments.push(Segment {
                name: caps[1].to_string(),
                indices,
            });
        }
        Some(Self { segments })
    }

    /// The leading attribute name
    pub fn root(&self) -> &str {
        &self.segments[0].name
    }

    /// A plain attribute name with no nesting or indexing
    fn is_simple(&self) -> bool {
        self.segments.len() == 1 && self.segments[0].indices.is_empty()
    }

    /// Walk the path through an entity's attributes
    fn lookup<'a>(&self, entity: &'a EntityState) -> Option<&'a Value> {
        let mut current: Option<&Value> = None;
        for (i, segment) in self.segments.iter().enumerate() {
            let mut value = if i == 0 {
                entity.attributes.get(&segment.name)?
            } else {
                current?.get(&segment.name)?
            };
            for &index in &segment.indices {
                value = value.as_array()?.get(index)?;
            }
            current = Some(value);
        }
        current
    }
}

/// Resolve the displayed value of `entity_id` for `attribute_path`
///
/// `state` (or no path) yields the primary state string. Parse failures in
/// derived computations are logged and fall back; this never fails.
pub fn resolve(
    entity_id: &str,
    entity: &EntityState,
    attribute_path: Option<&str>,
    now: Timestamp,
) -> Resolved {
    let path = match attribute_path.map(str::trim) {
        None | Some("") | Some("state") => {
            return Resolved::fixed(Some(Value::String(entity.state.clone())))
        }
        Some(path) => path,
    };

    let Some(path) = AttributePath::parse(path) else {
        tracing::warn!(path, "malformed attribute path");
        return Resolved::default();
    };

    if path.is_simple() {
        match path.root() {
            "brightness" => {
                return Resolved::fixed(Some(brightness_percent(entity.attr("brightness"))))
            }
            "rgb_color" => return Resolved::fixed(Some(rgb_css(entity.attr("rgb_color")))),
            "media_position" => return media_position(entity, now),
            "elapsed" if domain_of(entity_id) == "timer" => return timer_elapsed(entity, now),
            _ => {}
        }
    }

    Resolved::fixed(path.lookup(entity).cloned())
}

/// Scale a 0-255 brightness to 0-100, rounding halves up
fn brightness_percent(raw: Option<&Value>) -> Value {
    let raw = raw.and_then(number_of).unwrap_or(0.0);
    let percent = (raw / 255.0 * 100.0).round();
    Value::from(percent as i64)
}

fn rgb_css(raw: Option<&Value>) -> Value {
    let channels: Option<Vec<f64>> = raw
        .and_then(Value::as_array)
        .filter(|a| a.len() == 3)
        .and_then(|a| a.iter().map(number_of).collect());

    match channels {
        Some(c) => Value::String(format!("rgb({}, {}, {})", c[0], c[1], c[2])),
        None => Value::String(DEFAULT_COLOR.to_string()),
    }
}

fn media_position(entity: &EntityState, now: Timestamp) -> Resolved {
    let raw = entity.attr("media_position").cloned();
    if entity.state != "playing" {
        return Resolved::fixed(raw);
    }

    match live_media_position(entity, now) {
        Ok(position) => Resolved::live(Value::from(position)),
        Err(err) => {
            tracing::warn!(%err, "cannot compute live media position");
            Resolved::fixed(raw)
        }
    }
}

fn live_media_position(entity: &EntityState, now: Timestamp) -> Result<f64, TimeParseError> {
    let base = entity
        .attr("media_position")
        .and_then(number_of)
        .ok_or_else(|| TimeParseError::Duration("media_position".into()))?;
    let updated_at = entity
        .attr("media_position_updated_at")
        .and_then(Value::as_str)
        .ok_or_else(|| TimeParseError::Timestamp("media_position_updated_at".into()))?;
    let updated_at = parse_timestamp(updated_at)?;
    let duration = entity
        .attr("media_duration")
        .and_then(number_of)
        .unwrap_or(f64::INFINITY);

    let position = base + (now - updated_at) as f64 / 1000.0;
    Ok(position.clamp(0.0, duration.max(0.0)))
}

fn timer_elapsed(entity: &EntityState, now: Timestamp) -> Resolved {
    match entity.state.as_str() {
        "idle" => Resolved::fixed(Some(Value::from(0))),
        "active" => match active_timer_elapsed(entity, now) {
            Ok(elapsed) => Resolved::live(Value::from(elapsed)),
            Err(err) => {
                tracing::warn!(%err, "cannot compute active timer elapsed time");
                Resolved::fixed(Some(Value::from(0)))
            }
        },
        _ => match paused_timer_elapsed(entity) {
            Ok(elapsed) => Resolved::fixed(Some(Value::from(elapsed))),
            Err(err) => {
                tracing::warn!(%err, "cannot compute paused timer elapsed time");
                Resolved::fixed(Some(Value::from(0)))
            }
        },
    }
}

fn timer_duration(entity: &EntityState) -> Result<f64, TimeParseError> {
    let text = entity
        .attr("duration")
        .and_then(Value::as_str)
        .ok_or_else(|| TimeParseError::Duration("duration".into()))?;
    parse_duration_secs(text)
}

fn active_timer_elapsed(entity: &EntityState, now: Timestamp) -> Result<f64, TimeParseError> {
    let duration = timer_duration(entity)?;
    let finishes_at = entity
        .attr("finishes_at")
        .and_then(Value::as_str)
        .ok_or_else(|| TimeParseError::Timestamp("finishes_at".into()))?;
    let end = parse_timestamp(finishes_at)?;
    Ok(duration - (end - now) as f64 / 1000.0)
}

fn paused_timer_elapsed(entity: &EntityState) -> Result<f64, TimeParseError> {
    let duration = timer_duration(entity)?;
    let remaining = entity
        .attr("remaining")
        .and_then(Value::as_str)
        .ok_or_else(|| TimeParseError::Duration("remaining".into()))?;
    Ok(duration - parse_duration_secs(remaining)?)
}

/// Numbers, and strings holding numbers
pub fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
