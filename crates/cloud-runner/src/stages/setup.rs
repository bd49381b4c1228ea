use crate::{BuildContext, BuildTask, EnvironmentVariable, Provider, Result};

const BUILDER_REPOSITORY: &str = "game-ci/unity-builder";
const STEAM_DEPLOY_REPOSITORY: &str = "game-ci/steam-deploy";
const BUILDER_BRANCH: &str = "cloud-runner/unified-providers";

/// Clone the utility repositories and the target repository without
/// large-file content, restore the cache partition, then pull the large
/// files and archive them back into the cache.
pub async fn run(provider: &dyn Provider, ctx: &BuildContext) -> Result<()> {
  log::info!("Starting setup stage (clone repositories and restore cache)");

  let token = &ctx.params.github_token;
  let lfs_directory = format!("{}/.git/lfs", ctx.repo_path);
  let test_lfs_file = format!("{}/Assets/LFS_Test_File.jpg", ctx.project_path);

  let builder_repo = format!("https://{}@github.com/{}.git", token, BUILDER_REPOSITORY);
  let steam_repo = format!("https://{}@github.com/{}.git", token, STEAM_DEPLOY_REPOSITORY);
  let target_repo = format!("https://{}@github.com/{}.git", token, ctx.source.repository);

  let clone_no_lfs = format!(
    "{}/dist/cloud-runner/cloneNoLFS.sh {} {} $GITHUB_SHA {}",
    ctx.builder_path, ctx.repo_path, target_repo, test_lfs_file
  );
  let handle_caching = format!(
    "{}/dist/cloud-runner/handleCaching.sh {} {} {} {} {}",
    ctx.builder_path, ctx.cache_path, ctx.cache_key, ctx.library_path, lfs_directory, ctx.source.purge_cache
  );

  let commands = vec![
    "apk update -q".to_string(),
    "apk add unzip zip git-lfs jq tree -q".to_string(),
    format!("mkdir -p {}", ctx.build_path),
    format!("mkdir -p {}", ctx.builder_path),
    format!("mkdir -p {}", ctx.repo_path),
    format!("mkdir -p {}", ctx.steam_path),
    "echo 'Cloning utility repositories for the build'".to_string(),
    format!(
      "git clone -q --branch \"{}\" {} {}",
      BUILDER_BRANCH, builder_repo, ctx.builder_path
    ),
    format!("git clone -q {} {}", steam_repo, ctx.steam_path),
    "echo 'Initializing source repository for cloning with caching of LFS files'".to_string(),
    clone_no_lfs,
    "echo 'Source repository initialized'".to_string(),
    "echo 'Checking cache for the project library and git LFS files'".to_string(),
    handle_caching,
    "echo 'Caching complete'".to_string(),
    format!("cd {}", ctx.repo_path),
    "git lfs pull".to_string(),
    format!("zip -r lib-{}.zip \"{}\"", ctx.build_id, lfs_directory),
    format!(
      "cp lib-{}.zip \"{}/{}/lfs\"",
      ctx.build_id, ctx.cache_path, ctx.cache_key
    ),
    format!(
      "tree -L 3 {} > {}/buildVolumeReport.txt",
      ctx.build_path, ctx.repo_path
    ),
  ];

  let task = BuildTask {
    build_id: format!("setup-{}", ctx.build_id),
    image: "alpine/git".to_string(),
    commands,
    mount_dir: ctx.volume_path.clone(),
    working_dir: ctx.volume_path.clone(),
    environment: vec![EnvironmentVariable::new("GITHUB_SHA", &ctx.source.sha)],
    secrets: ctx.default_secrets.clone(),
  };

  provider.run_build_task(task).await
}
