//! Event router mapping platform events onto Parca lifecycle operations.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, warn};

use crate::{
    constants::{INSTALLING_MSG, RECONFIGURING_MSG, REMOVING_MSG},
    error::CharmError,
    event::Event,
    platform::{Platform, Protocol},
    scrape::MetricsDiscovery,
    status::UnitStatus,
    workload::Workload,
};

/// File holding the message of a failed install.
///
/// Every hook runs in a fresh process, so this is what keeps Start and
/// reconfiguration from running after an install failed.
#[derive(Debug, Clone)]
pub struct InstallMarker {
    path: PathBuf,
}

impl InstallMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Message recorded by an earlier failed install, if any.
    pub fn load(&self) -> Result<Option<String>, CharmError> {
        match fs::read_to_string(&self.path) {
            Ok(message) => Ok(Some(message.trim().to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn record(&self, message: &str) -> Result<(), CharmError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, message)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CharmError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared install marker {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Handler invoked for a single event occurrence.
type Handler<W, D, P> = fn(&mut ParcaCharm<W, D, P>) -> Result<(), CharmError>;

/// The Parca operator: one handler per event, run synchronously to completion.
pub struct ParcaCharm<W, D, P> {
    workload: W,
    discovery: D,
    platform: P,
    port: u16,
    status: UnitStatus,
    /// Message of the install failure that blocked the current lifecycle.
    install_failure: Option<String>,
    marker: Option<InstallMarker>,
}

impl<W, D, P> ParcaCharm<W, D, P>
where
    W: Workload,
    D: MetricsDiscovery,
    P: Platform,
{
    pub fn new(workload: W, discovery: D, platform: P, port: u16) -> Self {
        Self {
            workload,
            discovery,
            platform,
            port,
            status: UnitStatus::default(),
            install_failure: None,
            marker: None,
        }
    }

    /// Persists install failures in `marker`, resuming Blocked when an
    /// earlier invocation left one behind.
    pub fn with_install_marker(mut self, marker: InstallMarker) -> Result<Self, CharmError> {
        if let Some(message) = marker.load()? {
            debug!(
                "Install marker {} present; unit stays blocked",
                marker.path().display()
            );
            self.status = UnitStatus::blocked(message.clone());
            self.install_failure = Some(message);
        }
        self.marker = Some(marker);
        Ok(self)
    }

    /// Last status reported to the platform.
    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    #[cfg(test)]
    pub(crate) fn workload(&self) -> &W {
        &self.workload
    }

    #[cfg(test)]
    pub(crate) fn platform(&self) -> &P {
        &self.platform
    }

    /// Dispatch table from event to handler.
    fn handler(event: Event) -> Handler<W, D, P> {
        match event {
            Event::Install => Self::on_install,
            Event::Start => Self::on_start,
            Event::ConfigChanged => Self::on_config_changed,
            Event::TargetsChanged => Self::on_targets_changed,
            Event::Remove => Self::on_remove,
        }
    }

    /// Handles one event and returns the resulting unit status.
    pub fn handle(&mut self, event: Event) -> Result<UnitStatus, CharmError> {
        if let Some(message) = &self.install_failure
            && matches!(
                event,
                Event::Start | Event::ConfigChanged | Event::TargetsChanged
            )
        {
            warn!("Ignoring {event} event: installation failed ({message})");
            return Ok(self.status.clone());
        }

        debug!("Handling {event} event");
        Self::handler(event)(self)?;
        Ok(self.status.clone())
    }

    fn set_status(&mut self, status: UnitStatus) -> Result<(), CharmError> {
        self.platform.set_status(&status)?;
        info!("Unit status: {status}");
        self.status = status;
        Ok(())
    }

    /// Installs Parca and publishes its version.
    fn on_install(&mut self) -> Result<(), CharmError> {
        self.install_failure = None;
        if let Some(marker) = &self.marker {
            marker.clear()?;
        }
        self.set_status(UnitStatus::maintenance(INSTALLING_MSG))?;

        if let Err(err) = self.workload.install() {
            error!("Failed to install parca: {err}");
            let message = err.to_string();
            self.set_status(UnitStatus::blocked(message.clone()))?;
            if let Some(marker) = &self.marker {
                marker.record(&message)?;
            }
            self.install_failure = Some(message);
            return Ok(());
        }

        match self.workload.version() {
            Ok(version) => {
                if let Err(err) = self.platform.set_workload_version(&version) {
                    warn!("Failed to publish parca version {version}: {err}");
                }
            }
            Err(err) => warn!("Unable to determine parca version: {err}"),
        }
        Ok(())
    }

    fn on_start(&mut self) -> Result<(), CharmError> {
        self.workload.start()?;
        self.open_port();
        self.set_status(UnitStatus::active())
    }

    fn on_config_changed(&mut self) -> Result<(), CharmError> {
        self.reconfigure()
    }

    fn on_targets_changed(&mut self) -> Result<(), CharmError> {
        self.reconfigure()
    }

    fn on_remove(&mut self) -> Result<(), CharmError> {
        self.set_status(UnitStatus::maintenance(REMOVING_MSG))?;
        self.workload.remove()?;
        if let Some(marker) = &self.marker {
            marker.clear()?;
        }
        Ok(())
    }

    /// Re-derives the Parca configuration from charm config and scrape targets.
    fn reconfigure(&mut self) -> Result<(), CharmError> {
        self.set_status(UnitStatus::maintenance(RECONFIGURING_MSG))?;
        let config = self.platform.config()?;
        let jobs = self.discovery.jobs()?;
        self.workload.configure(&config, &jobs)?;
        self.set_status(UnitStatus::active())
    }

    /// Declares the Parca port; failure is logged, never fatal.
    fn open_port(&self) {
        if let Err(err) = self.platform.open_port(self.port, Protocol::Tcp) {
            error!("error opening port {}/tcp: {err}", self.port);
        }
    }
}
