//! Installation and lifecycle of the Parca service.
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    config::{CharmConfig, ParcaSettings},
    constants::DOWNLOAD_TIMEOUT,
    error::{CharmError, InstallError},
    parca_config::{ParcaConfig, parca_command_line, parse_version},
    runner::CommandRunner,
    scrape::ScrapeJob,
};

/// Operations the event router performs on the managed agent.
pub trait Workload {
    /// Installs the agent and writes its initial configuration.
    fn install(&mut self) -> Result<(), InstallError>;

    /// Starts the agent.
    fn start(&mut self) -> Result<(), CharmError>;

    /// Rewrites the agent configuration and restarts it.
    fn configure(&mut self, config: &CharmConfig, jobs: &[ScrapeJob]) -> Result<(), CharmError>;

    /// Stops the agent and removes everything `install` laid down.
    fn remove(&mut self) -> Result<(), CharmError>;

    /// Reports the installed agent version.
    fn version(&self) -> Result<String, CharmError>;
}

/// Parca managed as a systemd service.
pub struct Parca<R> {
    settings: ParcaSettings,
    runner: R,
}

impl<R: CommandRunner> Parca<R> {
    pub fn new(settings: ParcaSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Renders the systemd unit running Parca with the given config.
    pub fn unit_file(&self, config: &CharmConfig) -> String {
        let exec_start = parca_command_line(
            config,
            &self.settings.bin_path,
            &self.settings.config_path,
            &self.settings.profile_path,
        )
        .join(" ");

        format!(
            "[Unit]\n\
             Description=Parca continuous profiling\n\
             After=network-online.target\n\
             Wants=network-online.target\n\
             \n\
             [Service]\n\
             ExecStart={exec_start}\n\
             Restart=on-failure\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n"
        )
    }

    /// Writes `parca.yaml` and the systemd unit.
    fn write_files(&self, config: &CharmConfig, jobs: &[ScrapeJob]) -> io::Result<()> {
        let rendered = ParcaConfig::new(jobs.to_vec(), &self.settings.profile_path)
            .to_yaml()
            .map_err(io::Error::other)?;
        write_file(&self.settings.config_path, &rendered)?;
        write_file(&self.settings.unit_path, &self.unit_file(config))
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), CharmError> {
        self.runner.run_checked("systemctl", args)?;
        Ok(())
    }

    /// Returns the release archive, downloading it unless a local one is configured.
    ///
    /// The temporary file is returned alongside the path to keep it alive.
    fn fetch_archive(&self) -> Result<(PathBuf, Option<NamedTempFile>), InstallError> {
        if let Some(archive) = &self.settings.archive {
            debug!("Installing parca from local archive {}", archive.display());
            return Ok((archive.clone(), None));
        }

        let url = self.settings.resolved_download_url();
        info!("Downloading parca {} from {url}", self.settings.version);
        let download_error = |reason: String| InstallError::Download {
            url: url.clone(),
            reason,
        };

        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| download_error(err.to_string()))?;
        let mut response = client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| download_error(err.to_string()))?;

        let mut file = NamedTempFile::new()?;
        response
            .copy_to(&mut file)
            .map_err(|err| download_error(err.to_string()))?;

        Ok((file.path().to_path_buf(), Some(file)))
    }

    fn verify_checksum(&self, archive: &Path) -> Result<(), InstallError> {
        let Some(expected) = &self.settings.sha256 else {
            return Ok(());
        };

        let actual = sha256_file(archive)?;
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(InstallError::ChecksumMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }
        debug!("Verified parca archive checksum {actual}");
        Ok(())
    }

    fn extract(&self, archive: &Path) -> Result<(), InstallError> {
        let bin_dir = parent_dir(&self.settings.bin_path);
        let archive = archive.display().to_string();
        let bin_dir = bin_dir.display().to_string();

        let output = self
            .runner
            .run("tar", &["-xzf", &archive, "-C", &bin_dir, "parca"])
            .map_err(|err| InstallError::Extract(err.to_string()))?;
        if !output.success() {
            return Err(InstallError::Extract(output.stderr.trim().to_string()));
        }

        let extracted = Path::new(&bin_dir).join("parca");
        if extracted != self.settings.bin_path {
            fs::rename(&extracted, &self.settings.bin_path)?;
        }
        Ok(())
    }
}

impl<R: CommandRunner> Workload for Parca<R> {
    fn install(&mut self) -> Result<(), InstallError> {
        fs::create_dir_all(parent_dir(&self.settings.bin_path))?;
        fs::create_dir_all(&self.settings.profile_path)?;

        let (archive, _download) = self.fetch_archive()?;
        self.verify_checksum(&archive)?;
        self.extract(&archive)?;

        self.write_files(&CharmConfig::default(), &[])?;
        self.runner
            .run_checked("systemctl", &["daemon-reload"])
            .map_err(|err| InstallError::Service(err.to_string()))?;

        info!("Installed parca to {}", self.settings.bin_path.display());
        Ok(())
    }

    fn start(&mut self) -> Result<(), CharmError> {
        self.systemctl(&["enable", "--now", &self.settings.service])?;
        info!("Started {}", self.settings.service);
        Ok(())
    }

    fn configure(&mut self, config: &CharmConfig, jobs: &[ScrapeJob]) -> Result<(), CharmError> {
        debug!("Configuring parca with {} scrape job(s)", jobs.len());
        self.write_files(config, jobs)?;
        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["restart", &self.settings.service])?;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), CharmError> {
        self.systemctl(&["disable", "--now", &self.settings.service])?;
        for path in [
            &self.settings.unit_path,
            &self.settings.config_path,
            &self.settings.bin_path,
        ] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!("{} already absent", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.systemctl(&["daemon-reload"])?;
        info!("Removed {}", self.settings.service);
        Ok(())
    }

    fn version(&self) -> Result<String, CharmError> {
        let bin = self.settings.bin_path.display().to_string();
        let output = self.runner.run_checked(&bin, &["--version"])?;
        parse_version(&output)
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    fs::create_dir_all(parent_dir(path))?;
    fs::write(path, contents)
}

/// Hex-encoded SHA-256 of a file.
fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
