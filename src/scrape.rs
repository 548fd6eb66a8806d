//! Scrape-job discovery over the metrics relation.
//!
//! Remote applications publish their scrape jobs as JSON in the application
//! databag and their addresses in each unit databag. Jobs targeting `*`
//! are expanded into one static config per remote unit.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::CharmError, platform::RelationData};

/// Application databag key holding the JSON list of jobs.
const SCRAPE_JOBS_KEY: &str = "scrape_jobs";
/// Application databag key holding the topology of the remote application.
const SCRAPE_METADATA_KEY: &str = "scrape_metadata";
/// Unit databag key holding the unit's reachable address.
const UNIT_ADDRESS_KEY: &str = "prometheus_scrape_unit_address";
/// Unit databag key holding the unit's name.
const UNIT_NAME_KEY: &str = "prometheus_scrape_unit_name";

/// A descriptor telling Parca where and how to pull profiles.
///
/// Keys without a field of their own (`profiling_config`, `relabel_configs`,
/// `tls_config`, ...) are carried in `extra` and rendered unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    #[serde(default)]
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<String>,
    #[serde(default)]
    pub static_configs: Vec<StaticConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A group of targets sharing the same labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source of the current scrape jobs.
pub trait MetricsDiscovery {
    /// Returns the ordered list of scrape jobs.
    fn jobs(&self) -> Result<Vec<ScrapeJob>, CharmError>;
}

/// Topology published by the remote application.
#[derive(Debug, Clone, Deserialize)]
struct ScrapeMetadata {
    model: String,
    model_uuid: String,
    application: String,
}

impl ScrapeMetadata {
    fn job_name(&self, job_name: &str) -> String {
        let short_uuid: String = self.model_uuid.chars().take(7).collect();
        format!(
            "juju_{}_{}_{}_prometheus_scrape_{}",
            self.model, short_uuid, self.application, job_name
        )
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("juju_model".to_string(), self.model.clone()),
            ("juju_model_uuid".to_string(), self.model_uuid.clone()),
            ("juju_application".to_string(), self.application.clone()),
        ])
    }
}

/// A remote unit that published an address.
#[derive(Debug, Clone)]
struct RemoteUnit {
    name: String,
    address: String,
}

/// Consumer side of the metrics relation.
pub struct MetricsEndpointConsumer<R> {
    relations: R,
    endpoint: String,
}

impl<R: RelationData> MetricsEndpointConsumer<R> {
    pub fn new(relations: R, endpoint: impl Into<String>) -> Self {
        Self {
            relations,
            endpoint: endpoint.into(),
        }
    }

    fn relation_jobs(&self, relation_id: &str) -> Result<Vec<ScrapeJob>, CharmError> {
        let units = self.relations.related_units(relation_id)?;
        let Some(first) = units.first() else {
            debug!("Relation {relation_id} has no remote units yet");
            return Ok(Vec::new());
        };
        let app = first.split('/').next().unwrap_or(first.as_str());

        let app_data = self.relations.app_data(relation_id, app)?;
        let Some(raw_jobs) = app_data.get(SCRAPE_JOBS_KEY) else {
            debug!("Application '{app}' has not published scrape jobs on {relation_id}");
            return Ok(Vec::new());
        };
        let jobs: Vec<ScrapeJob> = serde_json::from_str(raw_jobs)?;
        let metadata = app_data
            .get(SCRAPE_METADATA_KEY)
            .map(|raw| serde_json::from_str::<ScrapeMetadata>(raw))
            .transpose()?;

        let mut remote_units = Vec::with_capacity(units.len());
        for unit in &units {
            let data = self.relations.unit_data(relation_id, unit)?;
            match data.get(UNIT_ADDRESS_KEY) {
                Some(address) => remote_units.push(RemoteUnit {
                    name: data
                        .get(UNIT_NAME_KEY)
                        .cloned()
                        .unwrap_or_else(|| unit.clone()),
                    address: address.clone(),
                }),
                None => warn!("Unit '{unit}' on {relation_id} has not published an address"),
            }
        }

        Ok(jobs
            .into_iter()
            .map(|job| label_job(job, metadata.as_ref(), &remote_units))
            .collect())
    }
}

impl<R: RelationData> MetricsDiscovery for MetricsEndpointConsumer<R> {
    fn jobs(&self) -> Result<Vec<ScrapeJob>, CharmError> {
        let mut jobs = Vec::new();
        for relation_id in self.relations.relation_ids(&self.endpoint)? {
            jobs.extend(self.relation_jobs(&relation_id)?);
        }
        debug!("Discovered {} scrape job(s) on '{}'", jobs.len(), self.endpoint);
        Ok(jobs)
    }
}

/// Applies topology naming and labels to a job and expands wildcard targets.
fn label_job(
    mut job: ScrapeJob,
    metadata: Option<&ScrapeMetadata>,
    units: &[RemoteUnit],
) -> ScrapeJob {
    if job.job_name.is_empty() {
        job.job_name = "default".to_string();
    }
    let Some(metadata) = metadata else {
        return job;
    };

    job.job_name = metadata.job_name(&job.job_name);
    let topology = metadata.labels();

    let mut static_configs = Vec::new();
    for config in job.static_configs {
        let (wildcard, fixed): (Vec<String>, Vec<String>) = config
            .targets
            .into_iter()
            .partition(|target| target.starts_with("*:") || target == "*");

        if !fixed.is_empty() {
            let mut labels = config.labels.clone();
            labels.extend(topology.clone());
            static_configs.push(StaticConfig {
                targets: fixed,
                labels,
                extra: config.extra.clone(),
            });
        }

        for target in wildcard {
            let port = target.strip_prefix('*').unwrap_or_default();
            for unit in units {
                let mut labels = config.labels.clone();
                labels.extend(topology.clone());
                labels.insert("juju_unit".to_string(), unit.name.clone());
                static_configs.push(StaticConfig {
                    targets: vec![format!("{}{}", unit.address, port)],
                    labels,
                    extra: config.extra.clone(),
                });
            }
        }
    }
    job.static_configs = static_configs;
    job
}
