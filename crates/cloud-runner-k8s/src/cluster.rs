use crate::{
  api::{ClusterApi, JobDefinition, PodObservation},
  job::build_job,
};
use chrono::{DateTime, Utc};
use cloud_runner::{Error, Result};
use k8s_openapi::{
  api::{
    batch::v1::Job,
    core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod, Secret,
      VolumeResourceRequirements},
  },
  apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use std::collections::BTreeMap;

fn cluster_error(context: &str, err: kube::Error) -> Error {
  Error::internal_runtime_error(format!("{}: {}", context, err))
}

/// Cluster verbs implemented against the API server.
pub struct KubeClusterApi {
  client: kube::Client,
  namespace: String,
}

impl KubeClusterApi {
  pub async fn connect(namespace: impl Into<String>) -> Result<Self> {
    let client = kube::Client::try_default()
      .await
      .map_err(|err| Error::provisioning_failed(format!("Failed to connect to cluster: {}", err)))?;

    Ok(Self {
      client,
      namespace: namespace.into(),
    })
  }

  fn jobs(&self) -> Api<Job> {
    Api::namespaced(self.client.clone(), &self.namespace)
  }

  fn pods(&self) -> Api<Pod> {
    Api::namespaced(self.client.clone(), &self.namespace)
  }

  fn secrets(&self) -> Api<Secret> {
    Api::namespaced(self.client.clone(), &self.namespace)
  }

  fn claims(&self) -> Api<PersistentVolumeClaim> {
    Api::namespaced(self.client.clone(), &self.namespace)
  }
}

fn observe(pod: &Pod) -> PodObservation {
  let name = pod.metadata.name.clone().unwrap_or_default();
  let status = pod.status.as_ref();
  let phase = status
    .and_then(|status| status.phase.clone())
    .unwrap_or_default();
  let exit_code = status
    .and_then(|status| status.container_statuses.as_ref())
    .and_then(|statuses| statuses.first())
    .and_then(|status| status.state.as_ref())
    .and_then(|state| state.terminated.as_ref())
    .map(|terminated| terminated.exit_code);

  PodObservation {
    name,
    phase,
    exit_code,
  }
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterApi {
  async fn create_secret(&self, name: &str, data: BTreeMap<String, String>) -> Result<()> {
    let secret = Secret {
      metadata: ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
      },
      type_: Some("Opaque".to_string()),
      string_data: Some(data),
      ..Default::default()
    };

    self
      .secrets()
      .create(&PostParams::default(), &secret)
      .await
      .map_err(|err| cluster_error("Failed to create secret", err))?;

    Ok(())
  }

  async fn delete_secret(&self, name: &str) -> Result<()> {
    self
      .secrets()
      .delete(name, &DeleteParams::default())
      .await
      .map_err(|err| cluster_error("Failed to delete secret", err))?;

    Ok(())
  }

  async fn create_volume_claim(&self, name: &str, size: &str) -> Result<()> {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.to_string()));

    let claim = PersistentVolumeClaim {
      metadata: ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
      },
      spec: Some(PersistentVolumeClaimSpec {
        access_modes: Some(vec!["ReadWriteOnce".to_string()]),
        volume_mode: Some("Filesystem".to_string()),
        resources: Some(VolumeResourceRequirements {
          requests: Some(requests),
          ..Default::default()
        }),
        ..Default::default()
      }),
      ..Default::default()
    };

    self
      .claims()
      .create(&PostParams::default(), &claim)
      .await
      .map_err(|err| Error::provisioning_failed(format!("Failed to create volume claim: {}", err)))?;

    Ok(())
  }

  async fn volume_claim_phase(&self, name: &str) -> Result<String> {
    let claim = self
      .claims()
      .get(name)
      .await
      .map_err(|err| cluster_error("Failed to read volume claim", err))?;

    Ok(
      claim
        .status
        .and_then(|status| status.phase)
        .unwrap_or_default(),
    )
  }

  async fn delete_volume_claim(&self, name: &str) -> Result<()> {
    self
      .claims()
      .delete(name, &DeleteParams::default())
      .await
      .map_err(|err| cluster_error("Failed to delete volume claim", err))?;

    Ok(())
  }

  async fn create_job(&self, job: &JobDefinition) -> Result<()> {
    let job = build_job(job);

    self
      .jobs()
      .create(&PostParams::default(), &job)
      .await
      .map_err(|err| Error::provisioning_failed(format!("Failed to create job: {}", err)))?;

    Ok(())
  }

  async fn delete_job(&self, name: &str) -> Result<()> {
    self
      .jobs()
      .delete(name, &DeleteParams::background())
      .await
      .map_err(|err| cluster_error("Failed to delete job", err))?;

    Ok(())
  }

  async fn find_job_pod(&self, job_name: &str) -> Result<Option<PodObservation>> {
    let pods = self
      .pods()
      .list(&ListParams::default().labels(&format!("job-name={}", job_name)))
      .await
      .map_err(|err| cluster_error("Failed to list job pods", err))?;

    Ok(pods.items.first().map(observe))
  }

  async fn observe_pod(&self, name: &str) -> Result<PodObservation> {
    let pod = self
      .pods()
      .get(name)
      .await
      .map_err(|err| cluster_error("Failed to read pod", err))?;

    Ok(observe(&pod))
  }

  async fn pod_logs(&self, name: &str, since: Option<DateTime<Utc>>) -> Result<String> {
    let params = LogParams {
      timestamps: true,
      since_time: since,
      ..Default::default()
    };

    self
      .pods()
      .logs(name, &params)
      .await
      .map_err(|err| cluster_error("Failed to read pod logs", err))
  }
}
