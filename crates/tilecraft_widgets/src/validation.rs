//! Client-side validation for input and textbox widgets
//!
//! Validation never fails loudly: an invalid draft only sets the widget's
//! invalid flag and blocks the commit.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use serde_json::Value;
use tilecraft_core::resolver::number_of;
use tilecraft_core::{ConfigError, InputType, Timestamp};

/// Number constraints for numeric inputs
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumberConstraints {
    /// Minimum value (inclusive)
    pub min: Option<f64>,
    /// Maximum value (inclusive)
    pub max: Option<f64>,
    /// Step increment
    pub step: Option<f64>,
}

impl NumberConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Clamp a value to the constraints
    pub fn clamp(&self, value: f64) -> f64 {
        let mut result = value;
        if let Some(min) = self.min {
            result = result.max(min);
        }
        if let Some(max) = self.max {
            result = result.min(max);
        }
        result
    }

    /// Round to the nearest step counted from `min`, then clamp
    pub fn snap(&self, value: f64) -> f64 {
        let snapped = match self.step.filter(|s| *s > 0.0) {
            Some(step) => {
                let origin = self.min.unwrap_or(0.0);
                origin + ((value - origin) / step).round() * step
            }
            None => value,
        };
        self.clamp(snapped)
    }

    /// Validate a value against constraints
    pub fn validate(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

/// Rules for one input widget, built from its rendered entry
#[derive(Clone, Debug, Default)]
pub struct InputRules {
    pub input_type: InputType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Whole-value pattern
    pub pattern: Option<Regex>,
    /// Rendered lower bound (number, or date/time text)
    pub min: Option<Value>,
    /// Rendered upper bound (number, or date/time text)
    pub max: Option<Value>,
}

impl InputRules {
    pub fn new(input_type: InputType) -> Self {
        Self {
            input_type,
            ..Default::default()
        }
    }

    /// Builder: whole-value pattern, anchored at both ends
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.pattern = Some(Regex::new(&format!("^(?:{pattern})$"))?);
        Ok(self)
    }

    /// Builder: lower and upper bounds
    pub fn with_bounds(mut self, min: Option<Value>, max: Option<Value>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    fn numeric_bounds(&self) -> NumberConstraints {
        NumberConstraints {
            min: self.min.as_ref().and_then(number_of),
            max: self.max.as_ref().and_then(number_of),
            step: None,
        }
    }

    fn temporal_bound(&self, bound: Option<&Value>) -> Option<Timestamp> {
        parse_temporal(self.input_type, bound?.as_str()?)
    }

    /// Whether `text` may be committed
    pub fn check(&self, text: &str) -> bool {
        if self.input_type.is_textual() {
            let len = text.chars().count();
            if self.min_length.is_some_and(|min| len < min) {
                return false;
            }
            if self.max_length.is_some_and(|max| len > max) {
                return false;
            }
        }

        // Empty is valid unless a minimum length says otherwise
        if text.is_empty() {
            return true;
        }

        if let Some(pattern) = &self.pattern {
            if self.input_type.is_textual() && !pattern.is_match(text) {
                return false;
            }
        }

        match self.input_type {
            InputType::Number => text
                .trim()
                .parse::<f64>()
                .is_ok_and(|n| n.is_finite() && self.numeric_bounds().validate(n)),
            InputType::Email => {
                let parts: Vec<&str> = text.split('@').collect();
                parts.len() == 2 && !parts[0].is_empty() && parts[1].contains('.')
            }
            InputType::Url => text.starts_with("http://") || text.starts_with("https://"),
            InputType::Color => is_hex_color(text),
            t if t.is_temporal() => {
                let Some(at) = parse_temporal(t, text) else {
                    return false;
                };
                let above_min = self
                    .temporal_bound(self.min.as_ref())
                    .map_or(true, |min| at >= min);
                let below_max = self
                    .temporal_bound(self.max.as_ref())
                    .map_or(true, |max| at <= max);
                above_min && below_max
            }
            _ => true,
        }
    }
}

fn is_hex_color(text: &str) -> bool {
    text.len() == 7
        && text.starts_with('#')
        && text[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a date/time input value to epoch milliseconds (UTC)
///
/// `time` values are milliseconds since midnight. Returns `None` for
/// malformed text or non-temporal types.
pub fn parse_temporal(input_type: InputType, text: &str) -> Option<Timestamp> {
    let text = text.trim();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());

    match input_type {
        InputType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().and_then(midnight),
        InputType::Time => ["%H:%M:%S%.f", "%H:%M"]
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
            .map(|t| {
                let since = t.signed_duration_since(NaiveTime::MIN);
                since.num_milliseconds()
            }),
        InputType::DatetimeLocal => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
            .map(|dt| dt.and_utc().timestamp_millis()),
        InputType::Week => {
            let (year, week) = text.split_once("-W")?;
            let date = NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)?;
            midnight(date)
        }
        InputType::Month => {
            let (year, month) = text.split_once('-')?;
            if month.len() != 2 {
                return None;
            }
            let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
            midnight(date)
        }
        _ => None,
    }
}
