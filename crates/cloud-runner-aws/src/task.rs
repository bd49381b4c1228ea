use crate::{
  api::{ComputeApi, LogStreamApi, StackApi, StackStatus, TaskSubmission},
  records::decode_log_lines,
  resources::TaskResources,
  wait::{wait_for_stack_status, WaitSettings},
};
use cloud_runner::{BuildTask, EnvironmentVariable, Error, Result};
use std::{
  sync::Arc,
  time::{Duration, Instant},
};

const RUNNING: &str = "RUNNING";
const STOPPED: &str = "STOPPED";

/// Lines carrying this marker mean the engine discarded the restored
/// library cache and is reimporting every asset.
const ASSET_DATABASE_WARNING: &str =
  "Rebuilding Library because the asset database could not be found!";

/// # TaskRunner
/// Drives one submitted task from `Submitted` through `Running` to
/// `Stopped`, streaming its logs until the task's sentinel line is observed
/// or the stabilization window elapses, then resolves success or failure
/// from the terminal exit code.
pub struct TaskRunner {
  stacks: Arc<dyn StackApi>,
  compute: Arc<dyn ComputeApi>,
  logs: Arc<dyn LogStreamApi>,
  poll_interval: Duration,
  stabilization_timeout: Duration,
  start_timeout: Duration,
  stop_timeout: Duration,
  stack_wait: WaitSettings,
}

impl TaskRunner {
  pub fn new(
    stacks: Arc<dyn StackApi>,
    compute: Arc<dyn ComputeApi>,
    logs: Arc<dyn LogStreamApi>,
  ) -> Self {
    Self {
      stacks,
      compute,
      logs,
      poll_interval: Duration::from_millis(1500),
      stabilization_timeout: Duration::from_secs(30),
      start_timeout: Duration::from_secs(600),
      stop_timeout: Duration::from_secs(600),
      stack_wait: WaitSettings::default(),
    }
  }

  /// Shrink the poll cadence, mainly for tests.
  pub fn with_timing(
    mut self,
    poll_interval: Duration,
    stabilization_timeout: Duration,
    stack_wait: WaitSettings,
  ) -> Self {
    self.poll_interval = poll_interval;
    self.stabilization_timeout = stabilization_timeout;
    self.start_timeout = stack_wait.timeout;
    self.stop_timeout = stack_wait.timeout;
    self.stack_wait = stack_wait;
    self
  }

  pub async fn run(&self, resources: &TaskResources, task: &BuildTask) -> Result<()> {
    let script = format!("{}\necho \"{}\"", task.script(), resources.log_id);

    let mut environment = task.environment.clone();
    environment.push(EnvironmentVariable::new("BUILDID", &task.build_id));

    let submission = TaskSubmission {
      cluster: resources.cluster.clone(),
      task_definition: resources.task_definition.clone(),
      container_name: resources.stack_name.clone(),
      subnets: resources.subnets.clone(),
      security_group: resources.security_group.clone(),
      command: vec!["-c".to_string(), script],
      environment,
    };

    let task_id = self
      .compute
      .run_task(submission)
      .await
      .map_err(|err| Error::task_start_failed(err))?;

    log::info!("Build task is starting");

    if let Err(err) = self
      .wait_for_status(&resources.cluster, &task_id, RUNNING, self.start_timeout)
      .await
    {
      // Give the service a moment to settle, then surface what it knows
      tokio::time::sleep(Duration::from_secs(3)).await;
      let last_status = self
        .compute
        .observe_task(&resources.cluster, &task_id)
        .await
        .map(|observation| observation.last_status)
        .unwrap_or_default();
      log::error!("Build task has ended: {}", last_status);

      return Err(Error::task_start_failed(err));
    }

    log::info!("Build task is running");

    self.stream_logs(resources, &task_id).await?;

    self
      .wait_for_status(&resources.cluster, &task_id, STOPPED, self.stop_timeout)
      .await?;

    let observation = self
      .compute
      .observe_task(&resources.cluster, &task_id)
      .await?;
    let exit_code = observation.exit_code.unwrap_or(-1);

    if exit_code != 0 {
      let description = self
        .compute
        .describe_task(&resources.cluster, &task_id)
        .await
        .unwrap_or_default();
      log::error!(
        "Build task failed with exit code {}: {}",
        exit_code,
        description
      );

      return Err(Error::task_failed(exit_code));
    }

    log::info!("Build task has finished successfully");

    Ok(())
  }

  async fn wait_for_status(
    &self,
    cluster: &str,
    task_id: &str,
    expected: &str,
    timeout: Duration,
  ) -> Result<()> {
    let started = Instant::now();

    loop {
      let observation = self.compute.observe_task(cluster, task_id).await?;

      if observation.last_status == expected {
        return Ok(());
      }
      // A short-lived task can stop before the running state is observed
      if expected == RUNNING && observation.last_status == STOPPED {
        return Ok(());
      }

      if started.elapsed() >= timeout {
        return Err(Error::internal_runtime_error(format!(
          "Timed out waiting for task {} to reach {}",
          task_id, expected
        )));
      }

      tokio::time::sleep(self.poll_interval).await;
    }
  }

  async fn stream_logs(&self, resources: &TaskResources, task_id: &str) -> Result<()> {
    let mut cursor = self.logs.open_cursor(&resources.log_stream_name).await?;

    // The TTL stack finishing creation doubles as a startup delay before
    // the first poll; it is not a real dependency of the log stream.
    wait_for_stack_status(
      self.stacks.as_ref(),
      &resources.ttl_stack_name,
      StackStatus::CreateComplete,
      &self.stack_wait,
    )
    .await?;

    let observation = self
      .compute
      .observe_task(&resources.cluster, task_id)
      .await?;
    log::info!("Build task status is {}", observation.last_status);
    log::info!(
      "Full logs are available in the {} log group",
      resources.stack_name
    );

    let mut reading = true;
    let mut stopped_at: Option<Instant> = None;

    while reading {
      tokio::time::sleep(self.poll_interval).await;

      let observation = self
        .compute
        .observe_task(&resources.cluster, task_id)
        .await?;
      if observation.last_status != RUNNING {
        match stopped_at {
          None => {
            log::info!("Build task stopped, streaming end of logs");
            stopped_at = Some(Instant::now());
          }
          Some(at) if at.elapsed() >= self.stabilization_timeout => {
            log::info!("Build task is no longer running, last query for logs");
            reading = false;
          }
          Some(_) => {}
        }
      }

      let batch = self.logs.read_records(&cursor).await?;
      for record in &batch.records {
        for line in decode_log_lines(record)? {
          if line.contains(&resources.log_id) {
            log::info!("End of build task logs");
            reading = false;
          } else {
            if line.contains(ASSET_DATABASE_WARNING) {
              log::warn!("Library cache was not restored");
            }
            log::info!("{}", line);
          }
        }
      }

      if let Some(next) = batch.next {
        cursor = next;
      }
    }

    Ok(())
  }
}
