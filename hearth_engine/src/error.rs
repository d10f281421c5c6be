use thiserror::Error;

/// Problems in the scene description. Any of these aborts session
/// construction; nothing is silently skipped.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("zone group `{group}` referenced by {referenced_by} has no zones")]
    MissingZoneGroup {
        group: String,
        referenced_by: String,
    },
    #[error("waypoint path `{path}` has no steps")]
    MissingWaypoints { path: String },
    #[error("waypoint path `{path}` needs a positive speed factor, got {factor}")]
    InvalidSpeedFactor { path: String, factor: f32 },
    #[error("dialogue script is empty")]
    EmptyScript,
    #[error("menu has no options")]
    EmptyMenu,
    #[error("menu option `{label}` has an empty action id")]
    MissingActionId { label: String },
    #[error("modal `{kind}` cannot be bound to a zone")]
    NotAmbient { kind: String },
    #[error("modal `{kind}` is bound more than once")]
    DuplicateModal { kind: String },
    #[error("{field} must be greater than zero")]
    ZeroTiming { field: &'static str },
    #[error("joystick deadzone must lie in [0, 1), got {0}")]
    InvalidDeadzone(f32),
}

/// Failures reported by the scene collaborator for fire-and-forget actions.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("could not open link {url}: {reason}")]
    LinkFailed { url: String, reason: String },
}
