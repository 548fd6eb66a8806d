//! Helpers for generating Parca configuration.
//!
//! Parca reads a YAML file describing where profiles are stored and which
//! targets to scrape, and takes its storage mode on the command line.
use std::path::Path;

use serde::Serialize;

use crate::{
    config::CharmConfig, constants::BYTES_PER_MIB, error::CharmError, scrape::ScrapeJob,
};

/// The Parca config file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcaConfig {
    object_storage: ObjectStorage,
    scrape_configs: Vec<ScrapeJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ObjectStorage {
    bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Bucket {
    #[serde(rename = "type")]
    kind: &'static str,
    config: BucketConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct BucketConfig {
    directory: String,
}

impl ParcaConfig {
    /// Builds a config storing profiles on the filesystem under `profile_path`.
    pub fn new(scrape_configs: Vec<ScrapeJob>, profile_path: &Path) -> Self {
        Self {
            object_storage: ObjectStorage {
                bucket: Bucket {
                    kind: "FILESYSTEM",
                    config: BucketConfig {
                        directory: profile_path.display().to_string(),
                    },
                },
            },
            scrape_configs,
        }
    }

    /// YAML representation written to disk.
    pub fn to_yaml(&self) -> Result<String, CharmError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Generates the Parca command line for the given charm config.
pub fn parca_command_line(
    config: &CharmConfig,
    bin_path: &Path,
    config_path: &Path,
    profile_path: &Path,
) -> Vec<String> {
    let mut cmd = vec![
        bin_path.display().to_string(),
        format!("--config-path={}", config_path.display()),
    ];

    if config.storage_persist {
        cmd.push("--storage-in-memory=false".to_string());
        cmd.push("--storage-persist".to_string());
        cmd.push(format!("--storage-path={}", profile_path.display()));
    } else {
        let limit = config.memory_storage_limit.saturating_mul(BYTES_PER_MIB);
        cmd.push("--storage-in-memory=true".to_string());
        cmd.push(format!("--storage-active-memory={limit}"));
    }

    cmd
}

/// Parses the output of `parca --version` into a representative string.
///
/// Unreleased builds (`-next`) are suffixed with the first six characters of
/// the commit they were built from, e.g. `v0.12.1-next+deadbe`.
pub fn parse_version(raw: &str) -> Result<String, CharmError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let version = fields
        .get(2)
        .ok_or_else(|| CharmError::InvalidVersion(raw.trim().to_string()))?;

    if !version.contains("-next") {
        return Ok(version.to_string());
    }

    let commit = fields
        .get(4)
        .ok_or_else(|| CharmError::InvalidVersion(raw.trim().to_string()))?;
    let short: String = commit.chars().take(6).collect();
    Ok(format!("{version}+{short}"))
}
