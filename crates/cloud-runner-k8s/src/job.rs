use crate::api::JobDefinition;
use k8s_openapi::{
  api::{
    batch::v1::{Job, JobSpec},
    core::v1::{
      Container, EnvFromSource, EnvVar, ExecAction, Lifecycle, LifecycleHandler,
      PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements,
      SecretEnvSource, Volume, VolumeMount,
    },
  },
  apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};
use std::collections::BTreeMap;

const DATA_VOLUME: &str = "data";

/// Build the declarative batch job object for one task.
pub(crate) fn build_job(definition: &JobDefinition) -> Job {
  let mut requests = BTreeMap::new();
  requests.insert("memory".to_string(), Quantity(definition.memory.clone()));
  requests.insert("cpu".to_string(), Quantity(definition.cpu.clone()));

  let env = definition
    .environment
    .iter()
    .map(|variable| EnvVar {
      name: variable.name.clone(),
      value: Some(variable.value.clone()),
      value_from: None,
    })
    .collect();

  let lifecycle = if definition.pre_stop_command.is_empty() {
    None
  } else {
    Some(Lifecycle {
      pre_stop: Some(LifecycleHandler {
        exec: Some(ExecAction {
          command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            definition.pre_stop_command.clone(),
          ]),
        }),
        ..Default::default()
      }),
      ..Default::default()
    })
  };

  let container = Container {
    name: "main".to_string(),
    image: Some(definition.image.clone()),
    command: Some(vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      definition.script.clone(),
    ]),
    working_dir: Some(definition.working_dir.clone()),
    env: Some(env),
    env_from: Some(vec![EnvFromSource {
      secret_ref: Some(SecretEnvSource {
        name: Some(definition.secret_name.clone()),
        optional: Some(false),
      }),
      ..Default::default()
    }]),
    resources: Some(ResourceRequirements {
      requests: Some(requests),
      ..Default::default()
    }),
    volume_mounts: Some(vec![VolumeMount {
      name: DATA_VOLUME.to_string(),
      mount_path: definition.mount_path.clone(),
      ..Default::default()
    }]),
    lifecycle,
    ..Default::default()
  };

  let volumes = vec![Volume {
    name: DATA_VOLUME.to_string(),
    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
      claim_name: definition.claim_name.clone(),
      read_only: None,
    }),
    ..Default::default()
  }];

  Job {
    metadata: ObjectMeta {
      name: Some(definition.name.clone()),
      labels: Some(BTreeMap::from([(
        "app".to_string(),
        "cloud-runner".to_string(),
      )])),
      ..Default::default()
    },
    spec: Some(JobSpec {
      backoff_limit: Some(1),
      template: PodTemplateSpec {
        metadata: None,
        spec: Some(PodSpec {
          containers: vec![container],
          volumes: Some(volumes),
          restart_policy: Some("Never".to_string()),
          ..Default::default()
        }),
      },
      ..Default::default()
    }),
    status: None,
  }
}
