use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a level name does not match the closed name set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid level name {0:?}")]
pub struct ParseLevelError(pub String);

/// Log severity, ordered from most to least severe.
///
/// `None` is the out-of-band "unset" sentinel used when a source
/// severity has no mapping into the named set. It sorts after every
/// named level and has no numeric priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Emerg,
    Alert,
    Crit,
    Error,
    Warn,
    Notice,
    Info,
    Debug,
    Trace,
    None,
}

impl Level {
    /// Every named level, most severe first. Excludes the `None` sentinel.
    pub const NAMED: [Level; 9] = [
        Level::Emerg,
        Level::Alert,
        Level::Crit,
        Level::Error,
        Level::Warn,
        Level::Notice,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Emerg => "EMERG",
            Level::Alert => "ALERT",
            Level::Crit => "CRIT",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
            Level::None => "NONE",
        }
    }

    /// Numeric priority of a named level (0 = most severe). The `None`
    /// sentinel has no priority.
    pub fn priority(self) -> Option<u8> {
        match self {
            Level::None => None,
            named => Some(named as u8),
        }
    }

    /// Inverse of [`Level::priority`]: round-trips for every named level.
    pub fn from_priority(priority: u8) -> Option<Level> {
        Level::NAMED.get(priority as usize).copied()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive match against the canonical names. This is also the
/// command-line integration point: a level is settable from a single
/// textual token (e.g. `-log-level warn`).
impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Level, ParseLevelError> {
        match s.to_ascii_uppercase().as_str() {
            "EMERG" => Ok(Level::Emerg),
            "ALERT" => Ok(Level::Alert),
            "CRIT" => Ok(Level::Crit),
            "ERROR" => Ok(Level::Error),
            "WARN" => Ok(Level::Warn),
            "NOTICE" => Ok(Level::Notice),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            "NONE" => Ok(Level::None),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
