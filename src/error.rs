//! Error handling for the Parca operator.
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while installing Parca.
///
/// This is the only error kind the event router recognises: its message is
/// surfaced verbatim as the unit's blocked status.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The release archive could not be fetched.
    #[error("failed to download parca from {url}: {reason}")]
    Download {
        /// Location the archive was fetched from.
        url: String,
        /// Transport or HTTP error description.
        reason: String,
    },

    /// The release archive did not match the configured digest.
    #[error("parca archive checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        /// Digest from the operator settings.
        expected: String,
        /// Digest of the archive on disk.
        actual: String,
    },

    /// The binary could not be unpacked from the archive.
    #[error("failed to extract parca: {0}")]
    Extract(String),

    /// The service manager rejected the unit.
    #[error("failed to register parca service: {0}")]
    Service(String),

    /// Filesystem error while laying out binaries and configs.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Defines every error that propagates out of an event handler.
#[derive(Debug, Error)]
pub enum CharmError {
    /// Installation failure.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing or rendering YAML.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error parsing JSON produced by a hook tool or relation data.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reading the operator settings file.
    #[error("Failed to read settings file {path}: {source}")]
    SettingsRead {
        /// Settings file location.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Settings file contains an invalid value.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings reference an environment variable that is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An external command could not be spawned.
    #[error("Failed to run '{program}': {source}")]
    CommandSpawn {
        /// The program that failed to start.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("'{program}' exited with status {code:?}: {stderr}")]
    CommandFailed {
        /// The program that failed.
        program: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// An external command did not finish in time.
    #[error("'{program}' timed out after {seconds}s")]
    CommandTimeout {
        /// The program that was killed.
        program: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// `parca --version` output could not be understood.
    #[error("Unrecognised parca version string: '{0}'")]
    InvalidVersion(String),

    /// Dispatch was requested without any way to tell which hook is running.
    #[error("No hook given and neither JUJU_DISPATCH_PATH nor JUJU_HOOK_NAME is set")]
    MissingHook,

    /// Hook or event name is not one the operator handles.
    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    /// The dispatch lock could not be taken.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        /// Lock file location.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

impl From<regex::Error> for CharmError {
    fn from(err: regex::Error) -> Self {
        CharmError::InvalidSettings(err.to_string())
    }
}
