use crate::{
  api::{ClusterApi, JobDefinition, PodObservation},
  cluster::KubeClusterApi,
};
use chrono::{DateTime, Utc};
use cloud_runner::{BuildContext, BuildTask, EnvironmentVariable, Error, Provider, Result};
use parking_lot::Mutex;
use std::{
  collections::BTreeMap,
  sync::Arc,
  time::{Duration, Instant},
};

const PENDING: &str = "Pending";
const RUNNING: &str = "Running";

struct SharedVolume {
  claim_name: String,
  /// Caller-supplied claims are adopted, not owned, and never deleted.
  owned: bool,
}

struct TaskSizing {
  memory: String,
  cpu: String,
  pre_stop_command: String,
}

/// # K8sProvider
/// Runs build tasks as namespaced batch jobs. A per-build persistent volume
/// claim is shared by every stage; each task gets its own job and secret,
/// both removed again in the same `run_build_task` call whatever the
/// outcome.
pub struct K8sProvider {
  api: Arc<dyn ClusterApi>,
  poll_interval: Duration,
  start_timeout: Duration,
  shared: Mutex<Option<SharedVolume>>,
  sizing: Mutex<TaskSizing>,
}

impl K8sProvider {
  pub async fn connect(namespace: impl Into<String>) -> Result<Self> {
    log::info!("Connecting to the cluster");
    let api = KubeClusterApi::connect(namespace).await?;

    Ok(Self::with_api(Arc::new(api)))
  }

  pub fn with_api(api: Arc<dyn ClusterApi>) -> Self {
    Self {
      api,
      poll_interval: Duration::from_secs(10),
      start_timeout: Duration::from_secs(600),
      shared: Mutex::new(None),
      sizing: Mutex::new(TaskSizing {
        memory: "3500Mi".to_string(),
        cpu: "1.0".to_string(),
        pre_stop_command: String::new(),
      }),
    }
  }

  /// Shrink the poll cadence, mainly for tests.
  pub fn with_timing(mut self, poll_interval: Duration, start_timeout: Duration) -> Self {
    self.poll_interval = poll_interval;
    self.start_timeout = start_timeout;
    self
  }
}

#[async_trait::async_trait]
impl Provider for K8sProvider {
  async fn setup_shared_resources(&self, ctx: &BuildContext) -> Result<()> {
    *self.sizing.lock() = TaskSizing {
      memory: ctx.params.memory.clone(),
      cpu: ctx.params.cpu.clone(),
      pre_stop_command: ctx.params.pre_stop_command.clone(),
    };

    let (claim_name, owned) = if ctx.params.kube_volume.is_empty() {
      (dns_name(&format!("build-volume-{}", ctx.build_id)), true)
    } else {
      (ctx.params.kube_volume.clone(), false)
    };

    if owned {
      self
        .api
        .create_volume_claim(&claim_name, &ctx.params.kube_volume_size)
        .await?;
      log::info!("Volume claim created, waiting for ready state");

      self.wait_for_claim(&claim_name).await?;
      log::info!("Volume ready for claims");
    } else {
      log::info!("Adopting caller-supplied volume claim {}", claim_name);
    }

    *self.shared.lock() = Some(SharedVolume { claim_name, owned });

    Ok(())
  }

  async fn cleanup_shared_resources(&self, _ctx: &BuildContext) -> Result<()> {
    let shared = self.shared.lock().take();

    if let Some(shared) = shared {
      if shared.owned {
        log::info!("Deleting volume claim {}", shared.claim_name);
        self.api.delete_volume_claim(&shared.claim_name).await?;
      }
    }

    Ok(())
  }

  async fn run_build_task(&self, task: BuildTask) -> Result<()> {
    let claim_name = self
      .shared
      .lock()
      .as_ref()
      .map(|shared| shared.claim_name.clone())
      .ok_or_else(|| Error::provisioning_failed("Shared volume claim has not been set up"))?;

    let uid = uuid::Uuid::new_v4();
    let job_name = format!("build-job-{}", uid);
    let secret_name = format!("build-credentials-{}", uid);

    let data: BTreeMap<String, String> = task
      .secrets
      .iter()
      .filter(|secret| !secret.is_empty())
      .map(|secret| {
        (
          secret.environment_variable.clone(),
          secret.parameter_value.clone(),
        )
      })
      .collect();
    self.api.create_secret(&secret_name, data).await?;

    let mut environment = task.environment.clone();
    environment.push(EnvironmentVariable::new("BUILDID", &task.build_id));

    let job = {
      let sizing = self.sizing.lock();
      JobDefinition {
        name: job_name.clone(),
        image: task.image.clone(),
        script: task.script(),
        environment,
        secret_name: secret_name.clone(),
        claim_name,
        mount_path: task.mount_dir.clone(),
        working_dir: task.working_dir.clone(),
        memory: sizing.memory.clone(),
        cpu: sizing.cpu.clone(),
        pre_stop_command: sizing.pre_stop_command.clone(),
      }
    };

    let result = self.execute_job(&job).await;

    // The job and its secret go away whether the task succeeded or not
    if let Err(err) = self.api.delete_job(&job_name).await {
      log::error!("Failed to delete job {}: {}", job_name, err);
    }
    if let Err(err) = self.api.delete_secret(&secret_name).await {
      log::error!("Failed to delete secret {}: {}", secret_name, err);
    }

    result
  }
}

impl K8sProvider {
  async fn wait_for_claim(&self, name: &str) -> Result<()> {
    let started = Instant::now();

    loop {
      tokio::time::sleep(self.poll_interval).await;

      let phase = self.api.volume_claim_phase(name).await?;
      if phase != PENDING {
        return Ok(());
      }

      if started.elapsed() >= self.start_timeout {
        return Err(Error::provisioning_failed(format!(
          "Timed out waiting for volume claim {} to leave Pending",
          name
        )));
      }
    }
  }

  async fn execute_job(&self, job: &JobDefinition) -> Result<()> {
    self.api.create_job(job).await?;
    log::info!("Job {} created", job.name);

    let pod = self.wait_for_pod_start(&job.name).await?;
    log::info!("Watching build job pod {} ({})", pod.name, pod.phase);

    self.stream_logs(&pod.name).await?;

    let observation = self.api.observe_pod(&pod.name).await?;
    let exit_code = observation.exit_code.unwrap_or(-1);

    if exit_code != 0 {
      log::error!(
        "Build task failed with exit code {} (pod {} is {})",
        exit_code,
        pod.name,
        observation.phase
      );

      return Err(Error::task_failed(exit_code));
    }

    log::info!("Build task has finished successfully");

    Ok(())
  }

  async fn wait_for_pod_start(&self, job_name: &str) -> Result<PodObservation> {
    let started = Instant::now();

    loop {
      tokio::time::sleep(self.poll_interval).await;

      if let Some(pod) = self.api.find_job_pod(job_name).await? {
        // Failed still proceeds: the logs and exit code tell the story
        if pod.phase != PENDING {
          log::info!("Pod is no longer pending");

          return Ok(pod);
        }
      }

      if started.elapsed() >= self.start_timeout {
        let pod = self.api.find_job_pod(job_name).await?;
        log::error!(
          "Build task has not started: {}",
          pod
            .map(|pod| pod.phase)
            .unwrap_or_else(|| "no pod scheduled".to_string())
        );

        return Err(Error::task_start_failed(format!(
          "Timed out waiting for job {} to start",
          job_name
        )));
      }
    }
  }

  async fn stream_logs(&self, pod_name: &str) -> Result<()> {
    let mut cursor: Option<DateTime<Utc>> = None;

    loop {
      tokio::time::sleep(self.poll_interval).await;

      let text = self.api.pod_logs(pod_name, cursor).await?;
      for line in text.lines() {
        let (time, message) = match line.split_once(' ') {
          Some(parts) => parts,
          None => continue,
        };

        // The since cursor is inclusive, skip lines already surfaced
        let time = DateTime::parse_from_rfc3339(time)
          .ok()
          .map(|time| time.with_timezone(&Utc));
        if let (Some(time), Some(cursor)) = (time, cursor) {
          if time <= cursor {
            continue;
          }
        }

        if let Some(time) = time {
          cursor = Some(cursor.map_or(time, |current| current.max(time)));
        }

        log::info!("{}", message);
      }

      let observation = self.api.observe_pod(pod_name).await?;
      if observation.phase != RUNNING {
        return Ok(());
      }
    }
  }
}

fn dns_name(value: &str) -> String {
  value
    .to_lowercase()
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dns_name() {
    assert_eq!(
      dns_name("build-volume-StandaloneLinux64-7"),
      "build-volume-standalonelinux64-7"
    );
    assert_eq!(dns_name("build_volume!"), "buildvolume");
  }
}
