use cloud_runner::{Error, Result, Secret};

pub const TASK_DEFINITION_TEMPLATE: &str = include_str!("../templates/task-definition.yml");
pub const BASE_STACK_TEMPLATE: &str = include_str!("../templates/base-stack.yml");
pub const STACK_TTL_TEMPLATE: &str = include_str!("../templates/stack-ttl.yml");

pub const PARAMETERS_MARKER: &str = "# p1 - input parameters";
pub const SECRETS_MARKER: &str = "# p2 - secret resources";
pub const CONTAINER_SECRETS_MARKER: &str = "# p3 - container secret definitions";

/// # TaskTemplate
/// Renders the task-definition template for one task by inserting, per
/// non-empty secret, a parameter declaration, a secret resource and a
/// container secret reference at the template's marked insertion points.
///
/// Rendering is deterministic: the same template and secret set always
/// produce byte-identical output.
pub struct TaskTemplate {
  body: String,
}

impl TaskTemplate {
  pub fn new(body: impl Into<String>) -> Self {
    Self { body: body.into() }
  }

  pub fn render(mut self, secrets: &[Secret]) -> Result<String> {
    for secret in secrets.iter().filter(|secret| !secret.is_empty()) {
      let key = secret.template_key();

      self.insert(PARAMETERS_MARKER, &parameter_fragment(&key))?;
      self.insert(SECRETS_MARKER, &secret_fragment(&key))?;
      self.insert(
        CONTAINER_SECRETS_MARKER,
        &container_secret_fragment(&secret.environment_variable, &key),
      )?;
    }

    Ok(self.body)
  }

  fn insert(&mut self, marker: &str, fragment: &str) -> Result<()> {
    let start = self
      .body
      .find(marker)
      .ok_or_else(|| Error::provisioning_failed(format!("Template marker not found: {}", marker)))?;

    // Insert right below the marker line
    let index = std::cmp::min(start + marker.len() + 1, self.body.len());
    self.body.insert_str(index, fragment);

    Ok(())
  }
}

fn parameter_fragment(key: &str) -> String {
  format!("  {}:\n    Type: String\n    Default: ''\n", key)
}

fn secret_fragment(key: &str) -> String {
  format!(
    "  {key}Secret:\n    Type: AWS::SecretsManager::Secret\n    Properties:\n      Name: !Join [ \"\", [ '{key}', !Ref BUILDID ] ]\n      SecretString: !Ref {key}\n",
    key = key
  )
}

fn container_secret_fragment(environment_variable: &str, key: &str) -> String {
  format!(
    "            - Name: '{}'\n              ValueFrom: !Ref {}Secret\n",
    environment_variable, key
  )
}
