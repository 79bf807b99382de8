/*!
 * Event System
 * Canonical, versioned telemetry envelope shared by every sink
 *
 * Events are built once by a tracer, merged with hub attributes, and handed
 * to sinks by reference. Sinks never mutate them.
 */

use crate::core::errors::TelemetryError;
use crate::core::types::Fields;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Bump when envelope fields change in a backwards-incompatible way
pub const SCHEMA_VERSION: u32 = 3;

/// Event severity for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 10,
    Info = 20,
    Warn = 30,
    Error = 40,
}

impl Level {
    /// Numeric rank used for threshold comparisons
    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Lenient parse: unknown or empty input becomes INFO
    pub fn coerce(raw: &str) -> Level {
        raw.parse().unwrap_or(Level::Info)
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            _ => Err(TelemetryError::InvalidLevel(s.to_string())),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Cow::<'de, str>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One observability fact within a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: u32,
    pub runner_id: String,
    pub trace_id: String,
    /// Position within the trace, 1..N, gap-free
    pub event_seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts_utc: OffsetDateTime,
    /// Monotonic timestamp for duration math (not affected by NTP)
    pub mono_ns: Option<u64>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    /// Dot-namespaced, e.g. `pipeline.stage_started`
    pub name: String,
    pub level: Level,
    pub channel: String,
    /// Contextual attributes inherited from enclosing scopes
    pub attributes: Option<Fields>,
    /// Event-specific payload
    pub data: Fields,
}

impl Event {
    /// Attribute lookup that treats a missing map as empty
    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&crate::core::types::Value> {
        self.attributes.as_ref().and_then(|a| a.get(key))
    }

    /// Produce a copy with `base` merged underneath this event's attributes
    ///
    /// Keys already present on the event win.
    pub fn with_base_attributes(&self, base: &Fields) -> Event {
        let mut merged = base.clone();
        if let Some(own) = &self.attributes {
            merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Event {
            attributes: if merged.is_empty() { None } else { Some(merged) },
            ..self.clone()
        }
    }
}
