//! Configuration management for the Parca operator.
//!
//! Two sources feed the operator: the operator settings file (paths, release
//! pinning, port) and the platform-supplied charm config read on every
//! reconfiguration.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{
        DEFAULT_BIN_PATH, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONFIG_PATH,
        DEFAULT_DOWNLOAD_URL, DEFAULT_INSTALL_MARKER_PATH, DEFAULT_LOCK_PATH,
        DEFAULT_MEMORY_STORAGE_LIMIT, DEFAULT_PARCA_VERSION, DEFAULT_PROFILE_PATH,
        DEFAULT_SERVICE_NAME, DEFAULT_SETTINGS_FILE, DEFAULT_UNIT_PATH, METRICS_RELATION,
        PARCA_PORT,
    },
    error::CharmError,
};

/// Represents the structure of the operator settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Port declared to the platform once Parca starts.
    pub port: u16,
    /// Relation endpoint carrying scrape targets.
    pub metrics_relation: String,
    /// Lock file serialising operator invocations.
    pub lock_path: PathBuf,
    /// File holding the message of a failed install across hook invocations.
    pub install_marker_path: PathBuf,
    /// Timeout for external commands, e.g. `"30s"` or `"2m"`.
    pub command_timeout: Option<String>,
    /// Parca installation layout.
    pub parca: ParcaSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: PARCA_PORT,
            metrics_relation: METRICS_RELATION.to_string(),
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            install_marker_path: PathBuf::from(DEFAULT_INSTALL_MARKER_PATH),
            command_timeout: None,
            parca: ParcaSettings::default(),
        }
    }
}

impl Settings {
    /// Resolved timeout for external commands.
    pub fn command_timeout(&self) -> Result<Duration, CharmError> {
        match self.command_timeout.as_deref() {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

/// Where Parca comes from and where its files live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParcaSettings {
    /// Release to install.
    pub version: String,
    /// Archive URL template; `{version}` is replaced with [`Self::version`].
    pub download_url: String,
    /// Expected SHA-256 of the archive, hex encoded.
    pub sha256: Option<String>,
    /// Local archive to install from instead of downloading.
    pub archive: Option<PathBuf>,
    pub bin_path: PathBuf,
    pub config_path: PathBuf,
    pub profile_path: PathBuf,
    pub unit_path: PathBuf,
    /// systemd service name.
    pub service: String,
}

impl Default for ParcaSettings {
    fn default() -> Self {
        Self {
            version: DEFAULT_PARCA_VERSION.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            sha256: None,
            archive: None,
            bin_path: PathBuf::from(DEFAULT_BIN_PATH),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
            unit_path: PathBuf::from(DEFAULT_UNIT_PATH),
            service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl ParcaSettings {
    /// Archive URL with the version substituted.
    pub fn resolved_download_url(&self) -> String {
        self.download_url.replace("{version}", &self.version)
    }
}

/// Charm configuration supplied by the platform (`config-get`).
///
/// Keys the operator does not interpret are kept in `extra` so the whole
/// object reaches the adapter unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CharmConfig {
    #[serde(default)]
    pub storage_persist: bool,
    /// In-memory storage limit in MiB.
    #[serde(default = "default_memory_storage_limit")]
    pub memory_storage_limit: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_memory_storage_limit() -> u64 {
    DEFAULT_MEMORY_STORAGE_LIMIT
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            storage_persist: false,
            memory_storage_limit: DEFAULT_MEMORY_STORAGE_LIMIT,
            extra: BTreeMap::new(),
        }
    }
}

/// Expands `$VAR` and `${VAR}` references within a string.
fn expand_env_vars(input: &str) -> Result<String, CharmError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(CharmError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Loads the operator settings.
///
/// An explicit path must exist. Without one, `parca-operator.yaml` in the
/// working directory is used when present and defaults apply otherwise.
pub fn load_settings(settings_path: Option<&str>) -> Result<Settings, CharmError> {
    let settings_path = match settings_path {
        Some(path) => Path::new(path),
        None if Path::new(DEFAULT_SETTINGS_FILE).exists() => Path::new(DEFAULT_SETTINGS_FILE),
        None => return Ok(Settings::default()),
    };

    let content =
        fs::read_to_string(settings_path).map_err(|source| CharmError::SettingsRead {
            path: settings_path.to_path_buf(),
            source,
        })?;

    let expanded = expand_env_vars(&content)?;
    if expanded.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_yaml::from_str(&expanded)?;
    settings.command_timeout()?;
    Ok(settings)
}

/// Parses a duration such as `90`, `30s`, `2m` or `1h`; a bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, CharmError> {
    let re = Regex::new(r"^(\d+)\s*([smh]?)$")?;
    let invalid = || CharmError::InvalidSettings(format!("Invalid duration value: '{raw}'"));

    let caps = re.captures(raw.trim()).ok_or_else(invalid)?;
    let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
    let unit_secs = match &caps[2] {
        "m" => 60,
        "h" => 3600,
        _ => 1,
    };

    Ok(Duration::from_secs(amount.saturating_mul(unit_secs)))
}
