use cloud_runner::{EnvironmentVariable, Result};

/// One key/value template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct StackParameter {
  pub key: String,
  pub value: String,
}

impl StackParameter {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackStatus {
  CreateInProgress,
  CreateComplete,
  UpdateInProgress,
  UpdateComplete,
  DeleteInProgress,
  DeleteComplete,
  Other(String),
}

impl StackStatus {
  pub fn is_ready(&self) -> bool {
    matches!(self, Self::CreateComplete | Self::UpdateComplete)
  }
}

#[derive(Debug, Clone)]
pub struct StackState {
  pub name: String,
  pub status: StackStatus,
  pub parameters: Vec<StackParameter>,
}

impl StackState {
  pub fn parameter(&self, key: &str) -> Option<&str> {
    self
      .parameters
      .iter()
      .find(|parameter| parameter.key == key)
      .map(|parameter| parameter.value.as_str())
  }
}

/// A provisioned resource inside a stack, addressed by the logical id the
/// template declared and resolved to the physical id the service assigned.
#[derive(Debug, Clone)]
pub struct StackResource {
  pub logical_id: String,
  pub physical_id: String,
}

#[derive(Debug, Clone)]
pub struct StackEventRecord {
  pub logical_id: String,
  pub status: String,
  pub reason: String,
}

/// Everything needed to submit one task run.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
  pub cluster: String,
  pub task_definition: String,
  pub container_name: String,
  pub subnets: Vec<String>,
  pub security_group: String,
  pub command: Vec<String>,
  pub environment: Vec<EnvironmentVariable>,
}

/// The task state the compute service reports on a describe call.
#[derive(Debug, Clone, Default)]
pub struct TaskObservation {
  pub last_status: String,
  pub exit_code: Option<i32>,
}

/// Opaque resume position in the log delivery stream.
#[derive(Debug, Clone, PartialEq)]
pub struct LogCursor(pub String);

/// One poll's worth of raw (still compressed) log records plus the cursor to
/// resume from.
#[derive(Debug, Default)]
pub struct LogRecordBatch {
  pub records: Vec<Vec<u8>>,
  pub next: Option<LogCursor>,
}

/// Stack lifecycle verbs of the infrastructure-template service.
#[async_trait::async_trait]
pub trait StackApi: Send + Sync {
  async fn create_stack(
    &self,
    name: &str,
    template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()>;
  async fn update_stack(
    &self,
    name: &str,
    template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()>;
  async fn delete_stack(&self, name: &str) -> Result<()>;
  /// `None` when the stack does not exist.
  async fn describe_stack(&self, name: &str) -> Result<Option<StackState>>;
  /// Names of stacks that finished creating or updating.
  async fn list_ready_stacks(&self) -> Result<Vec<String>>;
  /// Names of stacks in any state except deleted.
  async fn list_active_stacks(&self) -> Result<Vec<String>>;
  async fn stack_resources(&self, name: &str) -> Result<Vec<StackResource>>;
  async fn stack_events(&self, name: &str) -> Result<Vec<StackEventRecord>>;
}

/// Task submission and observation verbs of the compute service.
#[async_trait::async_trait]
pub trait ComputeApi: Send + Sync {
  /// Submit the task and return its identifier.
  async fn run_task(&self, submission: TaskSubmission) -> Result<String>;
  async fn observe_task(&self, cluster: &str, task_id: &str) -> Result<TaskObservation>;
  /// A human-readable dump of the full task description, for diagnostics.
  async fn describe_task(&self, cluster: &str, task_id: &str) -> Result<String>;
}

/// Cursor-based record retrieval from the log delivery stream.
#[async_trait::async_trait]
pub trait LogStreamApi: Send + Sync {
  async fn open_cursor(&self, stream_name: &str) -> Result<LogCursor>;
  async fn read_records(&self, cursor: &LogCursor) -> Result<LogRecordBatch>;
}
