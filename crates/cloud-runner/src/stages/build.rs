use crate::{BuildContext, BuildTask, EnvironmentVariable, Provider, Result, Secret};

/// Stage the build-script payloads into the task filesystem and run the
/// builder entrypoint against the base image.
pub async fn run(provider: &dyn Provider, ctx: &BuildContext, base_image: &str) -> Result<()> {
  log::info!("Starting build stage");

  let mut secrets = ctx.default_secrets.clone();
  secrets.extend(license_secrets());
  secrets.extend(keystore_secrets(ctx));
  secrets.retain(|secret| !secret.is_empty());

  // The tree listings are only useful when debugging a build volume layout
  let debug_prefix = if ctx.source.debug { "" } else { "#" };

  let commands = vec![
    "printenv".to_string(),
    format!("export GITHUB_WORKSPACE=\"{}\"", ctx.repo_path),
    format!(
      "cp -r \"{}/dist/default-build-script/\" \"/UnityBuilderAction\"",
      ctx.builder_path
    ),
    format!(
      "cp -r \"{}/dist/entrypoint.sh\" \"/entrypoint.sh\"",
      ctx.builder_path
    ),
    format!("cp -r \"{}/dist/steps/\" \"/steps\"", ctx.builder_path),
    "chmod -R +x \"/entrypoint.sh\"".to_string(),
    "chmod -R +x \"/steps\"".to_string(),
    "/entrypoint.sh".to_string(),
    format!("{}tree -L 4 \"{}\"", debug_prefix, ctx.build_path),
    format!("{}ls -lh \"{}\"", debug_prefix, ctx.volume_path),
  ];

  let environment = vec![
    EnvironmentVariable::new("ContainerMemory", &ctx.params.memory),
    EnvironmentVariable::new("ContainerCpu", &ctx.params.cpu),
    EnvironmentVariable::new("GITHUB_WORKSPACE", format!("{}/", ctx.repo_path)),
    EnvironmentVariable::new("PROJECT_PATH", &ctx.params.project_path),
    EnvironmentVariable::new("BUILD_PATH", &ctx.params.build_path),
    EnvironmentVariable::new("BUILD_FILE", &ctx.params.build_file),
    EnvironmentVariable::new("BUILD_NAME", &ctx.params.build_name),
    EnvironmentVariable::new("BUILD_METHOD", &ctx.params.build_method),
    EnvironmentVariable::new("CUSTOM_PARAMETERS", &ctx.params.custom_parameters),
    EnvironmentVariable::new("BUILD_TARGET", &ctx.params.platform),
    EnvironmentVariable::new("CHOWN_FILES_TO", &ctx.params.chown_files_to),
    EnvironmentVariable::new("ANDROID_VERSION_CODE", &ctx.params.android_version_code),
    EnvironmentVariable::new("ANDROID_KEYSTORE_NAME", &ctx.params.android_keystore_name),
    EnvironmentVariable::new("ANDROID_KEYALIAS_NAME", &ctx.params.android_keyalias_name),
  ];

  let task = BuildTask {
    build_id: format!("build-{}", ctx.build_id),
    image: base_image.to_string(),
    commands,
    mount_dir: ctx.volume_path.clone(),
    working_dir: ctx.project_path.clone(),
    environment,
    secrets,
  };

  provider.run_build_task(task).await
}

fn license_secrets() -> Vec<Secret> {
  ["UNITY_LICENSE", "UNITY_EMAIL", "UNITY_PASSWORD", "UNITY_SERIAL"]
    .iter()
    .filter_map(|name| {
      std::env::var(name)
        .ok()
        .map(|value| Secret::new(pascal_case(name), *name, value))
    })
    .collect()
}

fn keystore_secrets(ctx: &BuildContext) -> Vec<Secret> {
  vec![
    Secret::new(
      "AndroidKeystoreBase64",
      "ANDROID_KEYSTORE_BASE64",
      ctx.params.android_keystore_base64.clone(),
    ),
    Secret::new(
      "AndroidKeystorePass",
      "ANDROID_KEYSTORE_PASS",
      ctx.params.android_keystore_pass.clone(),
    ),
    Secret::new(
      "AndroidKeyAliasPass",
      "ANDROID_KEYALIAS_PASS",
      ctx.params.android_keyalias_pass.clone(),
    ),
  ]
}

fn pascal_case(name: &str) -> String {
  name
    .split('_')
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pascal_case() {
    assert_eq!(pascal_case("UNITY_LICENSE"), "UnityLicense");
    assert_eq!(pascal_case("UNITY_EMAIL"), "UnityEmail");
  }
}
