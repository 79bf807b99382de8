/*!
 * Sink Filter
 * Independent per-sink gating on enable flag, channel set and minimum level
 */

use crate::telemetry::events::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkFilter {
    pub enabled: bool,
    pub channels: BTreeSet<String>,
    pub min_level: Level,
}

impl SinkFilter {
    pub fn new<I, S>(channels: I, min_level: Level) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            channels: channels.into_iter().map(Into::into).collect(),
            min_level,
        }
    }

    /// A filter that rejects everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn accepts(&self, channel: &str, level: Level) -> bool {
        self.enabled && level.rank() >= self.min_level.rank() && self.channels.contains(channel)
    }
}

impl Default for SinkFilter {
    /// Enabled, `audit` + `ops`, INFO and above
    fn default() -> Self {
        Self::new(["audit", "ops"], Level::Info)
    }
}
