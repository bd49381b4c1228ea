use crate::{BuildContext, BuildTask, Provider, Result, Secret};

/// Hand the finished build to the external distribution tool.
pub async fn run(provider: &dyn Provider, ctx: &BuildContext) -> Result<()> {
  log::info!("Starting deployment stage");

  let commands = vec![
    format!("cp -r {}/action/entrypoint.sh /entrypoint.sh", ctx.steam_path),
    format!("cp -r {}/action/steps/ /steps", ctx.steam_path),
    "chmod -R +x /entrypoint.sh".to_string(),
    "chmod -R +x /steps".to_string(),
    "/entrypoint.sh".to_string(),
    format!("rm -r {}", ctx.build_path),
  ];

  let mut secrets = vec![
    Secret::new(
      "appId",
      "INPUT_APPID",
      std::env::var("APP_ID").unwrap_or_default(),
    ),
    Secret::new(
      "buildDescription",
      "INPUT_BUILDDESCRIPTION",
      std::env::var("BUILD_DESCRIPTION").unwrap_or_default(),
    ),
    Secret::new("rootPath", "INPUT_ROOTPATH", ctx.params.build_path.clone()),
    Secret::new(
      "releaseBranch",
      "INPUT_RELEASEBRANCH",
      std::env::var("RELEASE_BRANCH").unwrap_or_default(),
    ),
    Secret::new(
      "localContentServer",
      "INPUT_LOCALCONTENTSERVER",
      std::env::var("LOCAL_CONTENT_SERVER").unwrap_or_default(),
    ),
    Secret::new(
      "previewEnabled",
      "INPUT_PREVIEWENABLED",
      std::env::var("PREVIEW_ENABLED").unwrap_or_default(),
    ),
  ];
  secrets.extend(ctx.default_secrets.clone());

  let task = BuildTask {
    build_id: format!("deploy-{}", ctx.build_id),
    image: "cm2network/steamcmd:root".to_string(),
    commands,
    mount_dir: ctx.volume_path.clone(),
    working_dir: format!("{}/action/", ctx.steam_path),
    environment: ctx.default_environment(),
    secrets,
  };

  provider.run_build_task(task).await
}
