use chrono::{DateTime, Utc};
use cloud_runner::{EnvironmentVariable, Result};
use std::collections::BTreeMap;

/// Everything needed to declare one batch job: the main container, the data
/// volume claim it mounts and the secret exposed to it as environment.
#[derive(Debug, Clone)]
pub struct JobDefinition {
  pub name: String,
  pub image: String,
  pub script: String,
  pub environment: Vec<EnvironmentVariable>,
  pub secret_name: String,
  pub claim_name: String,
  pub mount_path: String,
  pub working_dir: String,
  pub memory: String,
  pub cpu: String,
  /// Optional command run by the container's pre-stop hook.
  pub pre_stop_command: String,
}

/// The state of a job's pod as last observed.
#[derive(Debug, Clone, Default)]
pub struct PodObservation {
  pub name: String,
  pub phase: String,
  pub exit_code: Option<i32>,
}

/// The cluster verbs the provider needs. Implemented against the cluster
/// API server in production and in memory in tests.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
  async fn create_secret(&self, name: &str, data: BTreeMap<String, String>) -> Result<()>;
  async fn delete_secret(&self, name: &str) -> Result<()>;
  async fn create_volume_claim(&self, name: &str, size: &str) -> Result<()>;
  async fn volume_claim_phase(&self, name: &str) -> Result<String>;
  async fn delete_volume_claim(&self, name: &str) -> Result<()>;
  async fn create_job(&self, job: &JobDefinition) -> Result<()>;
  async fn delete_job(&self, name: &str) -> Result<()>;
  /// The pod the job scheduled, if one exists yet.
  async fn find_job_pod(&self, job_name: &str) -> Result<Option<PodObservation>>;
  async fn observe_pod(&self, name: &str) -> Result<PodObservation>;
  /// The pod's log text since the given time, with timestamps per line.
  async fn pod_logs(&self, name: &str, since: Option<DateTime<Utc>>) -> Result<String>;
}
