use crate::api::{
  ComputeApi, LogCursor, LogRecordBatch, LogStreamApi, StackApi, StackEventRecord, StackParameter,
  StackResource, StackState, StackStatus, TaskObservation, TaskSubmission,
};
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_ecs::types::{
  AssignPublicIp, AwsVpcConfiguration, ContainerOverride, KeyValuePair, LaunchType,
  NetworkConfiguration, TaskOverride,
};
use aws_sdk_kinesis::types::ShardIteratorType;
use cloud_runner::{Error, Result};

const FARGATE_PLATFORM_VERSION: &str = "1.4.0";

fn provisioning_error(context: &str, err: impl std::fmt::Debug) -> Error {
  Error::provisioning_failed(format!("{}: {:?}", context, err))
}

fn runtime_error(context: &str, err: impl std::fmt::Debug) -> Error {
  Error::internal_runtime_error(format!("{}: {:?}", context, err))
}

/// Stack verbs backed by CloudFormation.
pub struct CloudFormationApi {
  client: aws_sdk_cloudformation::Client,
}

impl CloudFormationApi {
  pub fn new(config: &aws_config::SdkConfig) -> Self {
    Self {
      client: aws_sdk_cloudformation::Client::new(config),
    }
  }
}

fn to_sdk_parameter(parameter: &StackParameter) -> Parameter {
  Parameter::builder()
    .parameter_key(&parameter.key)
    .parameter_value(&parameter.value)
    .build()
}

fn to_stack_status(status: &str) -> StackStatus {
  match status {
    "CREATE_IN_PROGRESS" => StackStatus::CreateInProgress,
    "CREATE_COMPLETE" => StackStatus::CreateComplete,
    "UPDATE_IN_PROGRESS" => StackStatus::UpdateInProgress,
    "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
    "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
    "DELETE_COMPLETE" => StackStatus::DeleteComplete,
    other => StackStatus::Other(other.to_string()),
  }
}

#[async_trait::async_trait]
impl StackApi for CloudFormationApi {
  async fn create_stack(
    &self,
    name: &str,
    template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()> {
    self
      .client
      .create_stack()
      .stack_name(name)
      .template_body(template_body)
      .capabilities(Capability::CapabilityIam)
      .set_parameters(Some(parameters.iter().map(to_sdk_parameter).collect()))
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to create stack", err))?;

    Ok(())
  }

  async fn update_stack(
    &self,
    name: &str,
    template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()> {
    self
      .client
      .update_stack()
      .stack_name(name)
      .template_body(template_body)
      .capabilities(Capability::CapabilityIam)
      .set_parameters(Some(parameters.iter().map(to_sdk_parameter).collect()))
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to update stack", err))?;

    Ok(())
  }

  async fn delete_stack(&self, name: &str) -> Result<()> {
    self
      .client
      .delete_stack()
      .stack_name(name)
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to delete stack", err))?;

    Ok(())
  }

  async fn describe_stack(&self, name: &str) -> Result<Option<StackState>> {
    let output = match self.client.describe_stacks().stack_name(name).send().await {
      Ok(output) => output,
      Err(err) => {
        // Describing a deleted stack is a validation error, not an outage
        let description = format!("{:?}", err);
        if description.contains("does not exist") {
          return Ok(None);
        }

        return Err(provisioning_error("Failed to describe stack", err));
      }
    };

    let state = output.stacks().first().map(|stack| StackState {
      name: stack.stack_name().unwrap_or_default().to_string(),
      status: stack
        .stack_status()
        .map(|status| to_stack_status(status.as_str()))
        .unwrap_or(StackStatus::Other(String::new())),
      parameters: stack
        .parameters()
        .iter()
        .map(|parameter| StackParameter {
          key: parameter.parameter_key().unwrap_or_default().to_string(),
          value: parameter.parameter_value().unwrap_or_default().to_string(),
        })
        .collect(),
    });

    Ok(state)
  }

  async fn list_ready_stacks(&self) -> Result<Vec<String>> {
    let output = self
      .client
      .list_stacks()
      .stack_status_filter(aws_sdk_cloudformation::types::StackStatus::CreateComplete)
      .stack_status_filter(aws_sdk_cloudformation::types::StackStatus::UpdateComplete)
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to list stacks", err))?;

    Ok(
      output
        .stack_summaries()
        .iter()
        .filter_map(|summary| summary.stack_name().map(|name| name.to_string()))
        .collect(),
    )
  }

  async fn list_active_stacks(&self) -> Result<Vec<String>> {
    let output = self
      .client
      .list_stacks()
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to list stacks", err))?;

    Ok(
      output
        .stack_summaries()
        .iter()
        .filter(|summary| {
          summary
            .stack_status()
            .map(|status| status.as_str() != "DELETE_COMPLETE")
            .unwrap_or(true)
        })
        .filter_map(|summary| summary.stack_name().map(|name| name.to_string()))
        .collect(),
    )
  }

  async fn stack_resources(&self, name: &str) -> Result<Vec<StackResource>> {
    let output = self
      .client
      .describe_stack_resources()
      .stack_name(name)
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to describe stack resources", err))?;

    Ok(
      output
        .stack_resources()
        .iter()
        .map(|resource| StackResource {
          logical_id: resource.logical_resource_id().unwrap_or_default().to_string(),
          physical_id: resource
            .physical_resource_id()
            .unwrap_or_default()
            .to_string(),
        })
        .collect(),
    )
  }

  async fn stack_events(&self, name: &str) -> Result<Vec<StackEventRecord>> {
    let output = self
      .client
      .describe_stack_events()
      .stack_name(name)
      .send()
      .await
      .map_err(|err| provisioning_error("Failed to describe stack events", err))?;

    Ok(
      output
        .stack_events()
        .iter()
        .map(|event| StackEventRecord {
          logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
          status: event
            .resource_status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_default(),
          reason: event.resource_status_reason().unwrap_or_default().to_string(),
        })
        .collect(),
    )
  }
}

/// Task verbs backed by the serverless container service.
pub struct EcsApi {
  client: aws_sdk_ecs::Client,
}

impl EcsApi {
  pub fn new(config: &aws_config::SdkConfig) -> Self {
    Self {
      client: aws_sdk_ecs::Client::new(config),
    }
  }
}

#[async_trait::async_trait]
impl ComputeApi for EcsApi {
  async fn run_task(&self, submission: TaskSubmission) -> Result<String> {
    let vpc_configuration = AwsVpcConfiguration::builder()
      .set_subnets(Some(submission.subnets.clone()))
      .security_groups(&submission.security_group)
      .assign_public_ip(AssignPublicIp::Enabled)
      .build()
      .map_err(|err| runtime_error("Invalid network configuration", err))?;

    let mut container_override = ContainerOverride::builder().name(&submission.container_name);
    for argument in &submission.command {
      container_override = container_override.command(argument);
    }
    for variable in &submission.environment {
      container_override = container_override.environment(
        KeyValuePair::builder()
          .name(&variable.name)
          .value(&variable.value)
          .build(),
      );
    }

    let output = self
      .client
      .run_task()
      .cluster(&submission.cluster)
      .task_definition(&submission.task_definition)
      .launch_type(LaunchType::Fargate)
      .platform_version(FARGATE_PLATFORM_VERSION)
      .network_configuration(
        NetworkConfiguration::builder()
          .awsvpc_configuration(vpc_configuration)
          .build(),
      )
      .overrides(
        TaskOverride::builder()
          .container_overrides(container_override.build())
          .build(),
      )
      .send()
      .await
      .map_err(|err| runtime_error("Failed to submit task", err))?;

    let task_arn = output
      .tasks()
      .first()
      .and_then(|task| task.task_arn())
      .ok_or_else(|| Error::task_start_failed("Task submission returned no task"))?;

    Ok(task_arn.to_string())
  }

  async fn observe_task(&self, cluster: &str, task_id: &str) -> Result<TaskObservation> {
    let output = self
      .client
      .describe_tasks()
      .cluster(cluster)
      .tasks(task_id)
      .send()
      .await
      .map_err(|err| runtime_error("Failed to describe task", err))?;

    let task = output
      .tasks()
      .first()
      .ok_or_else(|| Error::internal_runtime_error("Task not found"))?;

    Ok(TaskObservation {
      last_status: task.last_status().unwrap_or_default().to_string(),
      exit_code: task
        .containers()
        .first()
        .and_then(|container| container.exit_code()),
    })
  }

  async fn describe_task(&self, cluster: &str, task_id: &str) -> Result<String> {
    let output = self
      .client
      .describe_tasks()
      .cluster(cluster)
      .tasks(task_id)
      .send()
      .await
      .map_err(|err| runtime_error("Failed to describe task", err))?;

    Ok(format!("{:?}", output.tasks()))
  }
}

/// Log record retrieval backed by the shard-iterator protocol.
pub struct KinesisApi {
  client: aws_sdk_kinesis::Client,
}

impl KinesisApi {
  pub fn new(config: &aws_config::SdkConfig) -> Self {
    Self {
      client: aws_sdk_kinesis::Client::new(config),
    }
  }
}

#[async_trait::async_trait]
impl LogStreamApi for KinesisApi {
  async fn open_cursor(&self, stream_name: &str) -> Result<LogCursor> {
    let output = self
      .client
      .list_shards()
      .stream_name(stream_name)
      .send()
      .await
      .map_err(|err| runtime_error("Failed to list log stream shards", err))?;

    let shard_id = output
      .shards()
      .first()
      .map(|shard| shard.shard_id().to_string())
      .ok_or_else(|| Error::internal_runtime_error("Log stream has no shards"))?;

    let output = self
      .client
      .get_shard_iterator()
      .stream_name(stream_name)
      .shard_id(shard_id)
      .shard_iterator_type(ShardIteratorType::TrimHorizon)
      .send()
      .await
      .map_err(|err| runtime_error("Failed to open log cursor", err))?;

    let iterator = output
      .shard_iterator()
      .ok_or_else(|| Error::internal_runtime_error("Log stream returned no cursor"))?;

    Ok(LogCursor(iterator.to_string()))
  }

  async fn read_records(&self, cursor: &LogCursor) -> Result<LogRecordBatch> {
    let output = self
      .client
      .get_records()
      .shard_iterator(&cursor.0)
      .send()
      .await
      .map_err(|err| runtime_error("Failed to read log records", err))?;

    let records = output
      .records()
      .iter()
      .map(|record| record.data().as_ref().to_vec())
      .collect();
    let next = output
      .next_shard_iterator()
      .map(|iterator| LogCursor(iterator.to_string()));

    Ok(LogRecordBatch { records, next })
  }
}
