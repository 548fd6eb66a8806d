//! Constants and default values for the Parca operator.
//!
//! This module centralizes the paths, names and status messages used by the
//! event handlers and the Parca adapter.

use std::time::Duration;

// ============================================================================
// Networking
// ============================================================================

/// TCP port serving the Parca API and dashboard.
pub const PARCA_PORT: u16 = 7070;

// ============================================================================
// File System Constants
// ============================================================================

/// Default location of the Parca binary.
pub const DEFAULT_BIN_PATH: &str = "/usr/local/bin/parca";

/// Default location of the Parca YAML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/parca/parca.yaml";

/// Default directory used for profile storage.
pub const DEFAULT_PROFILE_PATH: &str = "/var/lib/parca";

/// Default location of the systemd unit for Parca.
pub const DEFAULT_UNIT_PATH: &str = "/etc/systemd/system/parca.service";

/// Name of the systemd service.
pub const DEFAULT_SERVICE_NAME: &str = "parca";

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "parca-operator.yaml";

/// Lock file serialising operator invocations.
pub const DEFAULT_LOCK_PATH: &str = "/run/parca-operator.lock";

/// Marker recording a failed install until the next install or removal.
pub const DEFAULT_INSTALL_MARKER_PATH: &str = "/var/lib/parca-operator/install-failed";

// ============================================================================
// Release Download
// ============================================================================

/// Parca release installed when the settings do not pin one.
pub const DEFAULT_PARCA_VERSION: &str = "0.12.1";

/// Release archive location; `{version}` is substituted at install time.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com/parca-dev/parca/releases/download/v{version}/parca_{version}_Linux_x86_64.tar.gz";

/// Timeout for fetching the release archive.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Metrics Discovery
// ============================================================================

/// Relation endpoint providing scrape targets.
pub const METRICS_RELATION: &str = "metrics-endpoint";

// ============================================================================
// Process Execution
// ============================================================================

/// Default timeout for hook tools and service manager calls.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval while waiting on a child process.
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Parca Storage
// ============================================================================

/// Default in-memory storage limit, in MiB.
pub const DEFAULT_MEMORY_STORAGE_LIMIT: u64 = 1024;

/// Bytes per MiB, used to turn the storage limit into a flag value.
pub const BYTES_PER_MIB: u64 = 1_048_576;

// ============================================================================
// Status Messages
// ============================================================================

/// Maintenance message while installing.
pub const INSTALLING_MSG: &str = "installing parca";

/// Maintenance message while reconfiguring.
pub const RECONFIGURING_MSG: &str = "reconfiguring parca";

/// Maintenance message while removing.
pub const REMOVING_MSG: &str = "removing parca";
