use crate::{BuildContext, BuildTask, EnvironmentVariable, Provider, Result, Secret};

const STORAGE_BUCKET: &str = "game-ci-storage";

/// Ship the build archive to object storage.
pub async fn run(provider: &dyn Provider, ctx: &BuildContext) -> Result<()> {
  log::info!("Starting upload stage");

  // The workspace is kept around when a deploy stage still needs it
  let remove_prefix = if ctx.source.steam_deploy { "#" } else { "" };

  let commands = vec![
    format!(
      "aws s3 cp {}/build-{}.zip s3://{}/",
      ctx.build_id, ctx.build_id, STORAGE_BUCKET
    ),
    format!("{}rm -r {}", remove_prefix, ctx.build_id),
  ];

  let mut secrets = vec![
    Secret::new(
      "AWSAccessKeyID",
      "AWS_ACCESS_KEY_ID",
      std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
    ),
    Secret::new(
      "AWSSecretAccessKey",
      "AWS_SECRET_ACCESS_KEY",
      std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
    ),
  ];
  secrets.extend(ctx.default_secrets.clone());

  let mut environment = ctx.default_environment();
  environment.push(EnvironmentVariable::new(
    "AWS_DEFAULT_REGION",
    std::env::var("AWS_DEFAULT_REGION").unwrap_or_default(),
  ));

  let task = BuildTask {
    build_id: format!("upload-{}", ctx.build_id),
    image: "amazon/aws-cli".to_string(),
    commands,
    mount_dir: ctx.volume_path.clone(),
    working_dir: ctx.volume_path.clone(),
    environment,
    secrets,
  };

  provider.run_build_task(task).await
}
