use crate::{
  api::{ComputeApi, LogStreamApi, StackApi},
  resources::TaskProvisioner,
  sdk::{CloudFormationApi, EcsApi, KinesisApi},
  task::TaskRunner,
};
use cloud_runner::{BuildContext, BuildParams, BuildTask, Provider, Result};
use std::{sync::Arc, time::Instant};

/// # AwsProvider
/// Runs build tasks as serverless container tasks. Every task gets its own
/// declarative stack pair (execution definition plus TTL safety net), both
/// deleted again in the same `run_build_task` call whatever the outcome.
///
/// The long-lived base stack is converged while provisioning the first
/// task, so the shared setup and cleanup hooks have nothing to do here.
pub struct AwsProvider {
  provisioner: TaskProvisioner,
  runner: TaskRunner,
}

impl AwsProvider {
  /// Connect against the environment's credential chain.
  pub async fn connect(params: &BuildParams) -> Result<Self> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let stacks: Arc<dyn StackApi> = Arc::new(CloudFormationApi::new(&config));
    let compute: Arc<dyn ComputeApi> = Arc::new(EcsApi::new(&config));
    let logs: Arc<dyn LogStreamApi> = Arc::new(KinesisApi::new(&config));

    Ok(Self::with_apis(&params.base_stack_name, stacks, compute, logs))
  }

  pub fn with_apis(
    base_stack_name: &str,
    stacks: Arc<dyn StackApi>,
    compute: Arc<dyn ComputeApi>,
    logs: Arc<dyn LogStreamApi>,
  ) -> Self {
    Self {
      provisioner: TaskProvisioner::new(stacks.clone(), base_stack_name),
      runner: TaskRunner::new(stacks, compute, logs),
    }
  }

  pub fn with_provisioner_and_runner(provisioner: TaskProvisioner, runner: TaskRunner) -> Self {
    Self {
      provisioner,
      runner,
    }
  }
}

#[async_trait::async_trait]
impl Provider for AwsProvider {
  async fn setup_shared_resources(&self, _ctx: &BuildContext) -> Result<()> {
    log::trace!("Shared resources are converged together with the task stacks");

    Ok(())
  }

  async fn cleanup_shared_resources(&self, _ctx: &BuildContext) -> Result<()> {
    log::trace!("Task stacks already removed their resources");

    Ok(())
  }

  async fn run_build_task(&self, task: BuildTask) -> Result<()> {
    let setup_started = Instant::now();
    let resources = self.provisioner.provision(&task).await?;
    log::info!("Task setup time: {}s", setup_started.elapsed().as_secs());

    let run_started = Instant::now();
    let run_result = self.runner.run(&resources, &task).await;
    if run_result.is_ok() {
      log::info!("Task run time: {}s", run_started.elapsed().as_secs());
    }

    // Teardown runs whether the task succeeded, failed or errored
    let cleanup_started = Instant::now();
    let cleanup_result = self.provisioner.teardown(&resources).await;
    log::info!("Task cleanup time: {}s", cleanup_started.elapsed().as_secs());

    run_result?;
    cleanup_result
  }
}
