//! Access to the orchestration platform through Juju hook tools.
use std::collections::BTreeMap;

use strum_macros::{AsRefStr, Display};
use tracing::debug;

use crate::{config::CharmConfig, error::CharmError, runner::CommandRunner, status::UnitStatus};

/// Transport protocol of a declared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
}

/// Unit-level operations offered by the platform.
pub trait Platform {
    /// Publishes the unit status.
    fn set_status(&self, status: &UnitStatus) -> Result<(), CharmError>;

    /// Declares a port for ingress.
    fn open_port(&self, port: u16, protocol: Protocol) -> Result<(), CharmError>;

    /// Reads the current charm configuration.
    fn config(&self) -> Result<CharmConfig, CharmError>;

    /// Publishes the version of the managed workload.
    fn set_workload_version(&self, version: &str) -> Result<(), CharmError>;
}

/// Read access to relation data.
pub trait RelationData {
    /// Relation ids established on `endpoint`, in platform order.
    fn relation_ids(&self, endpoint: &str) -> Result<Vec<String>, CharmError>;

    /// Remote units participating in a relation.
    fn related_units(&self, relation_id: &str) -> Result<Vec<String>, CharmError>;

    /// Application databag published by the remote `app`.
    fn app_data(
        &self,
        relation_id: &str,
        app: &str,
    ) -> Result<BTreeMap<String, String>, CharmError>;

    /// Unit databag published by the remote `unit`.
    fn unit_data(
        &self,
        relation_id: &str,
        unit: &str,
    ) -> Result<BTreeMap<String, String>, CharmError>;
}

/// Platform implementation backed by the hook tools available during a hook.
#[derive(Debug, Clone)]
pub struct HookTools<R> {
    runner: R,
}

impl<R: CommandRunner> HookTools<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn json<T: serde::de::DeserializeOwned + Default>(
        &self,
        tool: &str,
        args: &[&str],
    ) -> Result<T, CharmError> {
        let stdout = self.runner.run_checked(tool, args)?;
        let trimmed = stdout.trim();
        // Some hook tools print nothing at all rather than `null`.
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}

impl<R: CommandRunner> Platform for HookTools<R> {
    fn set_status(&self, status: &UnitStatus) -> Result<(), CharmError> {
        debug!("Setting unit status to {status}");
        let kind = status.kind();
        let mut args = vec![kind.as_ref()];
        if !status.message().is_empty() {
            // Messages such as "-bash: ..." must not be read as flags.
            args.extend(["--", status.message()]);
        }
        self.runner.run_checked("status-set", &args)?;
        Ok(())
    }

    fn open_port(&self, port: u16, protocol: Protocol) -> Result<(), CharmError> {
        let port_range = format!("{port}/{protocol}");
        self.runner.run_checked("open-port", &[&port_range])?;
        Ok(())
    }

    fn config(&self) -> Result<CharmConfig, CharmError> {
        self.json("config-get", &["--format=json"])
    }

    fn set_workload_version(&self, version: &str) -> Result<(), CharmError> {
        self.runner.run_checked("application-version-set", &[version])?;
        Ok(())
    }
}

impl<R: CommandRunner> RelationData for HookTools<R> {
    fn relation_ids(&self, endpoint: &str) -> Result<Vec<String>, CharmError> {
        self.json("relation-ids", &["--format=json", endpoint])
    }

    fn related_units(&self, relation_id: &str) -> Result<Vec<String>, CharmError> {
        self.json("relation-list", &["--format=json", "-r", relation_id])
    }

    fn app_data(
        &self,
        relation_id: &str,
        app: &str,
    ) -> Result<BTreeMap<String, String>, CharmError> {
        self.json(
            "relation-get",
            &["--format=json", "-r", relation_id, "--app", "-", app],
        )
    }

    fn unit_data(
        &self,
        relation_id: &str,
        unit: &str,
    ) -> Result<BTreeMap<String, String>, CharmError> {
        self.json("relation-get", &["--format=json", "-r", relation_id, "-", unit])
    }
}
