//! Events the operator reacts to.
use std::{path::Path, str::FromStr};

use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::CharmError;

/// Lifecycle and topology events delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Event {
    Install,
    Start,
    ConfigChanged,
    /// The metrics-discovery collaborator changed its scrape targets.
    TargetsChanged,
    Remove,
}

/// Suffixes of relation hooks that change the set of scrape targets.
const RELATION_HOOK_SUFFIXES: [&str; 4] = [
    "-relation-joined",
    "-relation-changed",
    "-relation-departed",
    "-relation-broken",
];

impl Event {
    /// Maps a Juju hook name onto an event.
    ///
    /// Any hook on `metrics_relation` becomes [`Event::TargetsChanged`].
    /// Returns `None` for hooks the operator does not observe.
    pub fn from_hook(hook: &str, metrics_relation: &str) -> Option<Self> {
        match hook {
            "install" => Some(Self::Install),
            "start" => Some(Self::Start),
            "config-changed" => Some(Self::ConfigChanged),
            "remove" => Some(Self::Remove),
            other => RELATION_HOOK_SUFFIXES
                .iter()
                .filter_map(|suffix| other.strip_suffix(suffix))
                .any(|endpoint| endpoint == metrics_relation)
                .then_some(Self::TargetsChanged),
        }
    }

    /// Extracts the hook name from a dispatch path such as `hooks/install`.
    pub fn hook_name(dispatch_path: &str) -> &str {
        Path::new(dispatch_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(dispatch_path)
    }

    /// Parses an event name as accepted on the command line.
    pub fn parse(name: &str) -> Result<Self, CharmError> {
        Self::from_str(name.trim()).map_err(|_| CharmError::UnknownEvent(name.to_string()))
    }
}
