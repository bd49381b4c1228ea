use crate::{BuildContext, BuildTask, Result};

/// # Provider
/// A `Provider` owns the remote resources one build needs and is solely
/// responsible for deleting them again. The pipeline selects one provider at
/// startup and never branches on the concrete variant afterwards.
///
/// `run_build_task` submits one task, streams its logs to the `log` sink
/// until completion and resolves success or failure from the task's terminal
/// exit code. A non-zero exit code surfaces as `Error::TaskFailed`.
///
/// ## Example
///
/// ```rust
/// struct Provider;
///
/// #[cloud_runner::async_trait]
/// impl cloud_runner::Provider for Provider {
///   async fn setup_shared_resources(&self, _ctx: &cloud_runner::BuildContext) -> cloud_runner::Result<()> {
///     Ok(())
///   }
///
///   async fn cleanup_shared_resources(&self, _ctx: &cloud_runner::BuildContext) -> cloud_runner::Result<()> {
///     Ok(())
///   }
///
///   async fn run_build_task(&self, task: cloud_runner::BuildTask) -> cloud_runner::Result<()> {
///     log::info!("Running {}", task.build_id);
///
///     Ok(())
///   }
/// }
/// ```
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
  async fn setup_shared_resources(&self, ctx: &BuildContext) -> Result<()>;
  async fn cleanup_shared_resources(&self, ctx: &BuildContext) -> Result<()>;
  async fn run_build_task(&self, task: BuildTask) -> Result<()>;
}
