use crate::{BuildContext, BuildTask, Error, Provider, Result, Secret};
use serde::{Deserialize, Serialize};

/// One caller-supplied post-build step, parsed from the YAML payload in the
/// build parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomStep {
  pub name: Option<String>,
  pub image: String,
  pub commands: Vec<String>,
  #[serde(default)]
  pub secrets: Vec<CustomStepSecret>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomStepSecret {
  pub name: String,
  pub value: String,
}

pub fn parse(payload: &str) -> Result<Vec<CustomStep>> {
  serde_yaml::from_str(payload)
    .map_err(|err| Error::config_error(format!("Failed to parse custom build steps: {}", err)))
}

pub async fn run(provider: &dyn Provider, ctx: &BuildContext) -> Result<()> {
  log::info!("Running caller-supplied build steps");

  let steps = parse(&ctx.params.custom_build_steps)?;

  for (index, step) in steps.iter().enumerate() {
    let name = step
      .name
      .clone()
      .unwrap_or_else(|| format!("custom-{}", index));
    log::info!("Running custom step {}", name);

    let mut secrets = ctx.default_secrets.clone();
    secrets.extend(
      step
        .secrets
        .iter()
        .map(|secret| Secret::from_env_pair(&secret.name, &secret.value)),
    );

    let task = BuildTask {
      build_id: format!("{}-{}", crate::context::safe_name(&name), ctx.build_id),
      image: step.image.clone(),
      commands: step.commands.clone(),
      mount_dir: ctx.volume_path.clone(),
      working_dir: ctx.volume_path.clone(),
      environment: ctx.default_environment(),
      secrets,
    };

    provider.run_build_task(task).await?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse() {
    let payload = r#"
- name: notify
  image: alpine
  commands:
    - echo done
  secrets:
    - name: WEBHOOK_URL
      value: https://example.com/hook
- image: alpine
  commands:
    - echo anonymous
"#;

    let steps = parse(payload).unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].name.as_deref(), Some("notify"));
    assert_eq!(steps[0].image, "alpine");
    assert_eq!(steps[0].commands, vec!["echo done".to_string()]);
    assert_eq!(steps[0].secrets[0].name, "WEBHOOK_URL");
    assert_eq!(steps[1].name, None);
    assert!(steps[1].secrets.is_empty());
  }

  #[test]
  fn test_parse_invalid_payload() {
    let res = parse("image: not-a-list");

    assert!(matches!(res.unwrap_err(), Error::ConfigError(_)));
  }
}
