mod api;
mod base_stack;
mod provider;
mod records;
mod resources;
mod sdk;
mod task;
mod templates;
mod wait;

pub use api::*;
pub use base_stack::SharedStack;
pub use provider::AwsProvider;
pub use resources::{TaskProvisioner, TaskResources};
pub use sdk::{CloudFormationApi, EcsApi, KinesisApi};
pub use task::TaskRunner;
pub use templates::{
  TaskTemplate, BASE_STACK_TEMPLATE, STACK_TTL_TEMPLATE, TASK_DEFINITION_TEMPLATE,
};
pub use wait::WaitSettings;
