use crate::{BuildContext, BuildTask, Provider, Result};

/// Archive the library cache and the build output.
pub async fn run(provider: &dyn Provider, ctx: &BuildContext) -> Result<()> {
  log::info!("Starting compression stage");

  let commands = vec![
    "apk update -q".to_string(),
    "apk add zip -q".to_string(),
    format!("cd {}", ctx.library_path),
    format!("zip -r lib-{}.zip .*", ctx.build_id),
    format!(
      "mv lib-{}.zip \"{}/lib/lib-{}.zip\"",
      ctx.build_id, ctx.cache_path, ctx.build_id
    ),
    format!("cd {}", ctx.project_path),
    format!("ls -lh {}", ctx.params.build_path),
    format!(
      "zip -r build-{}.zip {}/*",
      ctx.build_id, ctx.params.build_path
    ),
    format!(
      "mv build-{}.zip {}/build-{}.zip",
      ctx.build_id, ctx.build_path, ctx.build_id
    ),
  ];

  let task = BuildTask {
    build_id: format!("compress-{}", ctx.build_id),
    image: "alpine".to_string(),
    commands,
    mount_dir: ctx.volume_path.clone(),
    working_dir: ctx.volume_path.clone(),
    environment: ctx.default_environment(),
    secrets: ctx.default_secrets.clone(),
  };

  provider.run_build_task(task).await?;

  log::info!("Compression stage complete");

  Ok(())
}
