use crate::{BuildParams, EnvironmentVariable, Error, Result, Secret};

pub const BUILD_VOLUME_FOLDER: &str = "data";
pub const CACHE_FOLDER: &str = "cache";
pub const REPOSITORY_FOLDER: &str = "repo";

/// What the surrounding CI run tells us about itself. Collected once so the
/// rest of the code never reads the process environment for control flow.
#[derive(Debug, Clone, Default)]
pub struct BuildSource {
  pub run_id: String,
  pub source_ref: String,
  pub sha: String,
  /// `owner/name` of the repository being built.
  pub repository: String,
  pub cache_key_override: Option<String>,
  pub purge_cache: bool,
  pub steam_deploy: bool,
  pub debug: bool,
}

impl BuildSource {
  pub fn from_env() -> Result<Self> {
    let run_id = std::env::var("GITHUB_RUN_NUMBER").unwrap_or_default();
    if run_id.is_empty() {
      return Err(Error::config_error("No run number found, exiting"));
    }

    Ok(Self {
      run_id,
      source_ref: std::env::var("GITHUB_REF").unwrap_or_default(),
      sha: std::env::var("GITHUB_SHA").unwrap_or_default(),
      repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
      cache_key_override: std::env::var("REMOTE_BUILDER_CACHE").ok(),
      purge_cache: std::env::var("PURGE_REMOTE_BUILDER_CACHE").is_ok(),
      steam_deploy: std::env::var("STEAM_DEPLOY").is_ok(),
      debug: std::env::var("DEBUG").is_ok(),
    })
  }
}

/// Immutable per-build state shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub build_id: String,
  pub params: BuildParams,
  pub source: BuildSource,
  /// Branch-derived key namespacing the persistent build cache.
  pub cache_key: String,
  pub volume_path: String,
  pub cache_path: String,
  pub build_path: String,
  pub builder_path: String,
  pub steam_path: String,
  pub repo_path: String,
  pub project_path: String,
  pub library_path: String,
  pub default_secrets: Vec<Secret>,
}

impl BuildContext {
  pub fn new(params: BuildParams, source: BuildSource) -> Self {
    let build_id = generate_build_id(&params.platform, &source.run_id);
    let cache_key = source
      .cache_key_override
      .clone()
      .unwrap_or_else(|| branch_cache_key(&source.source_ref));

    let volume_path = format!("/{}", BUILD_VOLUME_FOLDER);
    let cache_path = format!("{}/{}", volume_path, CACHE_FOLDER);
    let build_path = format!("{}/{}", volume_path, build_id);
    let builder_path = format!("{}/builder", build_path);
    let steam_path = format!("{}/steam", build_path);
    let repo_path = format!("{}/{}", build_path, REPOSITORY_FOLDER);
    let project_path = format!("{}/{}", repo_path, params.project_path);
    let library_path = format!("{}/Library", project_path);

    let default_secrets = vec![Secret::new(
      "GithubToken",
      "GITHUB_TOKEN",
      params.github_token.clone(),
    )];

    Self {
      build_id,
      params,
      source,
      cache_key,
      volume_path,
      cache_path,
      build_path,
      builder_path,
      steam_path,
      repo_path,
      project_path,
      library_path,
      default_secrets,
    }
  }

  /// The environment every stage's task receives.
  pub fn default_environment(&self) -> Vec<EnvironmentVariable> {
    vec![EnvironmentVariable::new("GITHUB_SHA", &self.source.sha)]
  }
}

/// Reduce a value to the characters that are safe in stack and job names.
pub(crate) fn safe_name(value: &str) -> String {
  value
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
    .collect()
}

fn generate_build_id(platform: &str, run_id: &str) -> String {
  safe_name(&format!("{}-{}", platform, run_id))
}

/// A source ref collapsed into a single path-free token, e.g.
/// `refs/heads/main` becomes `refsheadsmain`.
fn branch_cache_key(source_ref: &str) -> String {
  source_ref
    .split('/')
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join("")
}
