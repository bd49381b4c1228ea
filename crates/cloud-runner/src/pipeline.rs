use crate::{stages, BuildContext, Error, Provider, Result};
use std::{future::Future, sync::Arc, time::Instant};

/// # Pipeline
/// The top-level sequencer. Stage order is fixed: setup, build, optional
/// caller-supplied steps, compress, upload, optional deploy. Every stage is
/// one `run_build_task` call against the active provider; a later stage
/// never starts before the previous one's remote side effects completed.
///
/// Shared resources are cleaned up exactly once per build, whether the run
/// succeeded or a stage failed.
pub struct Pipeline {
  provider: Arc<dyn Provider>,
  ctx: BuildContext,
  base_image: String,
}

impl Pipeline {
  pub fn new(provider: Arc<dyn Provider>, ctx: BuildContext, base_image: impl Into<String>) -> Self {
    Self {
      provider,
      ctx,
      base_image: base_image.into(),
    }
  }

  pub async fn run(&self) -> Result<()> {
    log::info!("Starting build {}", self.ctx.build_id);
    let started = Instant::now();

    let result = self.run_stages().await;

    let cleanup = self.provider.cleanup_shared_resources(&self.ctx).await;

    match result {
      Ok(()) => {
        cleanup?;
        log::info!(
          "Build {} finished in {}s",
          self.ctx.build_id,
          started.elapsed().as_secs()
        );

        Ok(())
      }
      Err(err) => {
        if let Err(cleanup_err) = cleanup {
          log::error!("Failed to clean up shared resources: {}", cleanup_err);
        }
        log::error!("Build {} failed: {}", self.ctx.build_id, err);

        Err(err)
      }
    }
  }

  async fn run_stages(&self) -> Result<()> {
    self.provider.setup_shared_resources(&self.ctx).await?;

    let provider = self.provider.as_ref();
    let ctx = &self.ctx;

    self
      .stage("setup", stages::setup::run(provider, ctx))
      .await?;
    self
      .stage("build", stages::build::run(provider, ctx, &self.base_image))
      .await?;

    if !ctx.params.custom_build_steps.is_empty() {
      self
        .stage("custom", stages::custom::run(provider, ctx))
        .await?;
    }

    self
      .stage("compress", stages::compress::run(provider, ctx))
      .await?;
    self
      .stage("upload", stages::upload::run(provider, ctx))
      .await?;

    if ctx.source.steam_deploy {
      self
        .stage("deploy", stages::deploy::run(provider, ctx))
        .await?;
    }

    Ok(())
  }

  async fn stage<F>(&self, name: &str, stage: F) -> Result<()>
  where
    F: Future<Output = Result<()>>,
  {
    stage
      .await
      .map_err(|err| Error::stage_failed(name, err))
  }
}
