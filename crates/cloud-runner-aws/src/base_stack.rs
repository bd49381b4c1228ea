use crate::{
  api::{StackApi, StackParameter, StackStatus},
  templates::BASE_STACK_TEMPLATE,
  wait::{wait_for_stack_status, WaitSettings},
};
use cloud_runner::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// # SharedStack
/// Idempotently provisions the long-lived base stack shared by every build
/// task of an environment. A content hash over the template and its
/// non-secret parameters is stored in the stack's `Version` parameter;
/// repeated invocations with unchanged inputs never mutate the remote stack.
pub struct SharedStack {
  api: Arc<dyn StackApi>,
  name: String,
  wait: WaitSettings,
}

impl SharedStack {
  pub fn new(api: Arc<dyn StackApi>, name: impl Into<String>) -> Self {
    Self {
      api,
      name: name.into(),
      wait: WaitSettings::default(),
    }
  }

  pub fn with_wait(mut self, wait: WaitSettings) -> Self {
    self.wait = wait;
    self
  }

  pub async fn ensure_ready(&self) -> Result<()> {
    let parameters = vec![
      StackParameter::new("EnvironmentName", &self.name),
      StackParameter::new("Storage", format!("{}-storage", self.name)),
    ];
    let version = content_hash(BASE_STACK_TEMPLATE, &parameters);

    let mut versioned = parameters;
    versioned.push(StackParameter::new("Version", &version));

    let ready_stacks = self.api.list_ready_stacks().await?;
    let exists = ready_stacks.contains(&self.name);

    if let Err(err) = self.converge(exists, &version, &versioned).await {
      // Surface the full remote state before propagating
      match self.api.describe_stack(&self.name).await {
        Ok(state) => log::error!("Current base stack state: {:?}", state),
        Err(describe_err) => log::error!("Failed to describe base stack: {}", describe_err),
      }

      return Err(err);
    }

    Ok(())
  }

  async fn converge(
    &self,
    exists: bool,
    version: &str,
    parameters: &[StackParameter],
  ) -> Result<()> {
    if !exists {
      log::info!("Base stack {} does not exist, creating", self.name);
      self
        .api
        .create_stack(&self.name, BASE_STACK_TEMPLATE, parameters)
        .await?;
      log::info!("Created base stack (version: {})", version);
    }

    let state = self
      .api
      .describe_stack(&self.name)
      .await?
      .ok_or_else(|| {
        Error::provisioning_failed(format!(
          "Base stack {} does not exist, even after creation",
          self.name
        ))
      })?;

    // Never create or update concurrently with an in-flight transition
    if state.status == StackStatus::CreateInProgress {
      wait_for_stack_status(
        self.api.as_ref(),
        &self.name,
        StackStatus::CreateComplete,
        &self.wait,
      )
      .await?;
    }

    if exists {
      let recorded = state.parameter("Version");
      log::info!(
        "Base stack exists (version: {}, local version: {})",
        recorded.unwrap_or("unknown"),
        version
      );

      if recorded != Some(version) {
        log::info!("Updating base stack");
        self
          .api
          .update_stack(&self.name, BASE_STACK_TEMPLATE, parameters)
          .await?;

        let state = self.api.describe_stack(&self.name).await?.ok_or_else(|| {
          Error::provisioning_failed(format!(
            "Base stack {} does not exist, even after updating",
            self.name
          ))
        })?;

        if state.status == StackStatus::UpdateInProgress {
          wait_for_stack_status(
            self.api.as_ref(),
            &self.name,
            StackStatus::UpdateComplete,
            &self.wait,
          )
          .await?;
        }
      } else {
        log::info!("No base stack update required");
      }
    }

    log::info!("Base stack is ready");

    Ok(())
  }
}

pub(crate) fn content_hash(template: &str, parameters: &[StackParameter]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(template.as_bytes());

  for parameter in parameters {
    hasher.update(parameter.key.as_bytes());
    hasher.update(parameter.value.as_bytes());
  }

  format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_content_hash_is_stable() {
    let parameters = vec![StackParameter::new("EnvironmentName", "cloud-runner")];

    assert_eq!(
      content_hash("template", &parameters),
      content_hash("template", &parameters)
    );
  }

  #[test]
  fn test_content_hash_tracks_inputs() {
    let parameters = vec![StackParameter::new("EnvironmentName", "cloud-runner")];
    let changed = vec![StackParameter::new("EnvironmentName", "other")];

    assert_ne!(
      content_hash("template", &parameters),
      content_hash("other template", &parameters)
    );
    assert_ne!(
      content_hash("template", &parameters),
      content_hash("template", &changed)
    );
  }
}
