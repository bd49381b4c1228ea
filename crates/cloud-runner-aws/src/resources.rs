use crate::{
  api::{StackApi, StackParameter, StackResource, StackStatus},
  base_stack::SharedStack,
  templates::{TaskTemplate, STACK_TTL_TEMPLATE, TASK_DEFINITION_TEMPLATE},
  wait::{wait_for_stack_status, WaitSettings},
};
use cloud_runner::{BuildTask, Result, Secret};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

/// Minutes until the TTL safety net deletes a task stack that normal
/// cleanup never reached.
const STACK_TTL_MINUTES: &str = "100";

const LOG_ID_LENGTH: usize = 9;

/// The provisioned infrastructure of one build task: both stack names, the
/// rendered template, the log sentinel and the resolved physical ids needed
/// to submit the task. Lives exactly as long as the `run_build_task` call
/// that created it.
#[derive(Debug, Clone)]
pub struct TaskResources {
  pub stack_name: String,
  pub ttl_stack_name: String,
  pub template: String,
  /// Random marker echoed at the end of the task's command stream and
  /// watched for in the log tail.
  pub log_id: String,
  pub cluster: String,
  pub task_definition: String,
  pub subnets: Vec<String>,
  pub security_group: String,
  pub log_stream_name: String,
}

/// # TaskProvisioner
/// Creates and destroys the per-task infrastructure: the task's execution
/// definition stack plus an independent self-expiring cleanup stack, then
/// resolves the physical resource ids the submission needs.
pub struct TaskProvisioner {
  api: Arc<dyn StackApi>,
  base_stack_name: String,
  wait: WaitSettings,
}

impl TaskProvisioner {
  pub fn new(api: Arc<dyn StackApi>, base_stack_name: impl Into<String>) -> Self {
    Self {
      api,
      base_stack_name: base_stack_name.into(),
      wait: WaitSettings::default(),
    }
  }

  pub fn with_wait(mut self, wait: WaitSettings) -> Self {
    self.wait = wait;
    self
  }

  pub async fn provision(&self, task: &BuildTask) -> Result<TaskResources> {
    SharedStack::new(self.api.clone(), &self.base_stack_name)
      .with_wait(self.wait.clone())
      .ensure_ready()
      .await?;

    let log_id = new_log_id();
    let secrets: Vec<Secret> = task
      .secrets
      .iter()
      .filter(|secret| !secret.is_empty())
      .cloned()
      .collect();

    let stack_name = format!("{}-{}", self.base_stack_name, task.build_id);
    let ttl_stack_name = format!("{}-cleanup", stack_name);
    let template = TaskTemplate::new(TASK_DEFINITION_TEMPLATE).render(&secrets)?;

    let mut parameters = vec![
      StackParameter::new("EnvironmentName", &self.base_stack_name),
      StackParameter::new("ImageUrl", &task.image),
      StackParameter::new("ServiceName", &stack_name),
      StackParameter::new(
        "Command",
        "echo \"this template is overridden when running a task\"",
      ),
      StackParameter::new("EntryPoint", "/bin/sh"),
      StackParameter::new("WorkingDirectory", &task.working_dir),
      StackParameter::new("EFSMountDirectory", &task.mount_dir),
      StackParameter::new("BUILDID", &task.build_id),
    ];
    parameters.extend(
      secrets
        .iter()
        .map(|secret| StackParameter::new(secret.template_key(), &secret.parameter_value)),
    );

    if let Err(err) = self
      .create_stacks(&stack_name, &ttl_stack_name, &template, &parameters, task)
      .await
    {
      self
        .report_creation_failure(&stack_name, &template, &parameters, &secrets)
        .await;

      return Err(err);
    }

    let task_resources = self.api.stack_resources(&stack_name).await?;
    let base_resources = self.api.stack_resources(&self.base_stack_name).await?;

    Ok(TaskResources {
      cluster: physical_id(&base_resources, "ECSCluster"),
      task_definition: physical_id(&task_resources, "TaskDefinition"),
      subnets: vec![
        physical_id(&base_resources, "PublicSubnetOne"),
        physical_id(&base_resources, "PublicSubnetTwo"),
      ],
      security_group: physical_id(&base_resources, "ContainerSecurityGroup"),
      log_stream_name: physical_id(&task_resources, "KinesisStream"),
      stack_name,
      ttl_stack_name,
      template,
      log_id,
    })
  }

  async fn create_stacks(
    &self,
    stack_name: &str,
    ttl_stack_name: &str,
    template: &str,
    parameters: &[StackParameter],
    task: &BuildTask,
  ) -> Result<()> {
    self
      .api
      .create_stack(stack_name, template, parameters)
      .await?;
    log::info!("Creating build task stack {}", stack_name);

    let ttl_parameters = vec![
      StackParameter::new("StackName", stack_name),
      StackParameter::new("DeleteStackName", ttl_stack_name),
      StackParameter::new("TTL", STACK_TTL_MINUTES),
      StackParameter::new("BUILDID", &task.build_id),
      StackParameter::new("EnvironmentName", &self.base_stack_name),
    ];
    self
      .api
      .create_stack(ttl_stack_name, STACK_TTL_TEMPLATE, &ttl_parameters)
      .await?;

    wait_for_stack_status(
      self.api.as_ref(),
      stack_name,
      StackStatus::CreateComplete,
      &self.wait,
    )
    .await
  }

  async fn report_creation_failure(
    &self,
    stack_name: &str,
    template: &str,
    parameters: &[StackParameter],
    secrets: &[Secret],
  ) {
    let secret_keys: Vec<String> = secrets.iter().map(|secret| secret.template_key()).collect();

    log::error!("Task stack parameters:");
    for parameter in parameters {
      // Secret-carrying parameters are masked in the dump
      let value = if secret_keys.contains(&parameter.key) {
        "***"
      } else {
        parameter.value.as_str()
      };
      log::error!("  {} = {}", parameter.key, value);
    }

    log::error!("Task stack secrets: {:?}", secrets);
    log::error!("Task stack template:\n{}", template);

    if let Ok(events) = self.api.stack_events(stack_name).await {
      for event in events {
        log::error!(
          "Stack event: {} {} {}",
          event.logical_id,
          event.status,
          event.reason
        );
      }
    }
    if let Ok(resources) = self.api.stack_resources(stack_name).await {
      for resource in resources {
        log::error!(
          "Stack resource: {} = {}",
          resource.logical_id,
          resource.physical_id
        );
      }
    }
  }

  pub async fn teardown(&self, resources: &TaskResources) -> Result<()> {
    log::info!("Cleanup starting");

    self.api.delete_stack(&resources.stack_name).await?;
    self.api.delete_stack(&resources.ttl_stack_name).await?;

    wait_for_stack_status(
      self.api.as_ref(),
      &resources.stack_name,
      StackStatus::DeleteComplete,
      &self.wait,
    )
    .await?;
    wait_for_stack_status(
      self.api.as_ref(),
      &resources.ttl_stack_name,
      StackStatus::DeleteComplete,
      &self.wait,
    )
    .await?;

    log::info!(
      "Deleted stacks: {}, {}",
      resources.stack_name,
      resources.ttl_stack_name
    );

    let remaining = self.api.list_active_stacks().await?;
    log::info!("Stacks: {:?}", remaining);

    log::info!("Cleanup complete");

    Ok(())
  }
}

fn physical_id(resources: &[StackResource], logical_id: &str) -> String {
  resources
    .iter()
    .find(|resource| resource.logical_id == logical_id)
    .map(|resource| resource.physical_id.clone())
    .unwrap_or_default()
}

pub(crate) fn new_log_id() -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(LOG_ID_LENGTH)
    .map(char::from)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_physical_id() {
    let resources = vec![
      StackResource {
        logical_id: "ECSCluster".to_string(),
        physical_id: "arn:cluster".to_string(),
      },
      StackResource {
        logical_id: "TaskDefinition".to_string(),
        physical_id: "arn:task-def".to_string(),
      },
    ];

    assert_eq!(physical_id(&resources, "ECSCluster"), "arn:cluster");
    // a missing logical id resolves to an empty id and fails later at use
    assert_eq!(physical_id(&resources, "KinesisStream"), "");
  }

  #[test]
  fn test_log_id_shape() {
    let log_id = new_log_id();

    assert_eq!(log_id.len(), 9);
    assert!(log_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(new_log_id(), new_log_id());
  }
}
