//! Error taxonomy shared by every layer of dpui.
//!
//! Failures coming back from `displayplacer` are opaque text. Mapping that
//! text onto an [`Error`] variant is done by a [`FailureClassifier`]; the
//! default [`TextClassifier`] is a substring heuristic and can misfire, so
//! callers should treat the variant as a hint for the user, not as a
//! correctness signal.

use serde::Serialize;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("displayplacer not found: {0}")]
    ToolNotFound(String),

    #[error("displayplacer failed: {0}")]
    CommandFailed(String),

    #[error("display not found: {0}")]
    DisplayNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shortcut {0} is already in use")]
    ShortcutUnavailable(String),

    #[error("invalid shortcut format: {0}. Examples: Cmd+Shift+1, Ctrl+Alt+D")]
    InvalidShortcutFormat(String),

    #[error("at least one display must stay enabled")]
    LastDisplayProtected,

    #[error("preset not found: {0}")]
    PresetNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Unknown(String),
}

/// Payload-free discriminant of [`Error`], used in UI-facing events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ToolNotFound,
    CommandFailed,
    DisplayNotFound,
    PermissionDenied,
    InvalidConfig,
    ShortcutUnavailable,
    InvalidShortcutFormat,
    LastDisplayProtected,
    PresetNotFound,
    Storage,
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Error::CommandFailed(_) => ErrorKind::CommandFailed,
            Error::DisplayNotFound(_) => ErrorKind::DisplayNotFound,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::ShortcutUnavailable(_) => ErrorKind::ShortcutUnavailable,
            Error::InvalidShortcutFormat(_) => ErrorKind::InvalidShortcutFormat,
            Error::LastDisplayProtected => ErrorKind::LastDisplayProtected,
            Error::PresetNotFound(_) => ErrorKind::PresetNotFound,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Retrying cannot help until the user fixes their installation or
    /// grants the missing permission.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::PermissionDenied(_) | Error::ToolNotFound(_))
    }

    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Storage(format!("{}: {}", context, err))
    }
}

/// Maps an opaque failure of the external tool onto the taxonomy.
pub trait FailureClassifier {
    /// The tool ran but exited unsuccessfully with `message` on stderr/stdout.
    fn classify_output(&self, message: &str) -> Error;

    /// The tool could not be spawned at all.
    fn classify_spawn(&self, program: &str, err: &io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => {
                Error::ToolNotFound(format!("{} is not installed or not in PATH", program))
            }
            io::ErrorKind::PermissionDenied => {
                Error::PermissionDenied(format!("cannot execute {}: {}", program, err))
            }
            _ => Error::Unknown(format!("failed to execute {}: {}", program, err)),
        }
    }
}

/// Best-effort classifier based on phrases displayplacer and the shell are
/// known to print.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextClassifier;

const TOOL_MISSING: &[&str] = &["command not found", "no such file"];
const PERMISSION: &[&str] = &["permission", "not permitted", "accessibility"];
const DISPLAY_MISSING: &[&str] = &[
    "unable to find screen",
    "screen not found",
    "could not find",
    "no display",
];
const INVALID: &[&str] = &["invalid", "unrecognized", "could not parse", "usage:"];

impl FailureClassifier for TextClassifier {
    fn classify_output(&self, message: &str) -> Error {
        let message = message.trim();
        if message.is_empty() {
            return Error::Unknown("displayplacer failed without output".to_string());
        }

        let lower = message.to_lowercase();
        let has = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

        if has(TOOL_MISSING) {
            Error::ToolNotFound(message.to_string())
        } else if has(PERMISSION) {
            Error::PermissionDenied(message.to_string())
        } else if has(DISPLAY_MISSING) {
            Error::DisplayNotFound(message.to_string())
        } else if has(INVALID) {
            Error::InvalidConfig(message.to_string())
        } else {
            Error::CommandFailed(message.to_string())
        }
    }
}
