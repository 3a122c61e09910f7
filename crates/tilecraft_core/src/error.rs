//! Error types shared by every tilecraft crate

use thiserror::Error;

/// Errors raised while loading or validating an entry configuration
///
/// These are fatal to the widget being mounted and are returned from
/// construction rather than logged.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration was provided at all
    #[error("Invalid configuration: no configuration provided")]
    Missing,

    /// A required field was absent
    #[error("Invalid configuration: missing field `{0}`")]
    MissingField(&'static str),

    /// The configuration did not match the entry schema (unknown tag, wrong type)
    #[error("Invalid configuration: {0}")]
    Schema(#[from] serde_json::Error),

    /// A literal range whose minimum is not below its maximum
    #[error("Invalid range: min {min} must be less than max {max}")]
    InvalidRange { min: f64, max: f64 },

    /// A literal step that is zero, negative or not finite
    #[error("Invalid step: {0}")]
    InvalidStep(f64),

    /// An input pattern that does not compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors raised by a template evaluator
///
/// Never surfaced to widget callers: the rendering boundary logs them and
/// substitutes an empty string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Malformed template text
    #[error("Template syntax error: {0}")]
    Syntax(String),

    /// A construct the evaluator does not implement
    #[error("Unsupported template construct: {0}")]
    Unsupported(String),

    /// Nested `render` calls went too deep (likely self-referential)
    #[error("Template render depth exceeded ({0})")]
    DepthExceeded(usize),
}

/// Errors raised while handing an action to the host
///
/// These reset local interaction state and are then returned to the caller
/// so a failed service call stays visible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The rendered action is missing data needed to build a host intent
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// The host rejected or failed to execute the intent
    #[error("Host dispatch failed: {0}")]
    Host(String),

    /// A confirmation id that is unknown or already resolved
    #[error("Unknown confirmation request")]
    UnknownConfirmation,

    /// The eval escape hatch failed on the host side
    #[cfg(feature = "eval")]
    #[error("Eval action failed: {0}")]
    Eval(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
