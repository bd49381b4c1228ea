use cloud_runner::{BuildTask, EnvironmentVariable, Error, Result, Secret};
use cloud_runner_aws::{
  AwsProvider, ComputeApi, LogCursor, LogRecordBatch, LogStreamApi, SharedStack, StackApi,
  StackEventRecord, StackParameter, StackResource, StackState, StackStatus, TaskObservation,
  TaskProvisioner, TaskRunner, TaskSubmission, WaitSettings,
};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;
use std::{
  collections::{HashMap, VecDeque},
  io::Write,
  sync::Arc,
  time::Duration,
};

const BASE_STACK: &str = "cloud-runner";

fn fast_wait() -> WaitSettings {
  WaitSettings {
    poll_interval: Duration::from_millis(1),
    timeout: Duration::from_millis(500),
  }
}

#[derive(Clone)]
struct StoredStack {
  status: StackStatus,
  parameters: Vec<StackParameter>,
}

#[derive(Default)]
struct StacksState {
  stacks: HashMap<String, StoredStack>,
  create_calls: Vec<(String, Vec<StackParameter>)>,
  update_calls: Vec<String>,
  delete_calls: Vec<String>,
}

struct FakeStacks {
  state: Mutex<StacksState>,
  fail_create: bool,
}

impl FakeStacks {
  fn new() -> Self {
    Self {
      state: Mutex::new(StacksState::default()),
      fail_create: false,
    }
  }

  fn failing_create() -> Self {
    Self {
      state: Mutex::new(StacksState::default()),
      fail_create: true,
    }
  }
}

#[async_trait::async_trait]
impl StackApi for FakeStacks {
  async fn create_stack(
    &self,
    name: &str,
    _template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()> {
    if self.fail_create && name != BASE_STACK {
      return Err(Error::provisioning_failed("Stack creation rejected"));
    }

    let mut state = self.state.lock();
    state
      .create_calls
      .push((name.to_string(), parameters.to_vec()));
    state.stacks.insert(
      name.to_string(),
      StoredStack {
        status: StackStatus::CreateComplete,
        parameters: parameters.to_vec(),
      },
    );

    Ok(())
  }

  async fn update_stack(
    &self,
    name: &str,
    _template_body: &str,
    parameters: &[StackParameter],
  ) -> Result<()> {
    let mut state = self.state.lock();
    state.update_calls.push(name.to_string());
    state.stacks.insert(
      name.to_string(),
      StoredStack {
        status: StackStatus::UpdateComplete,
        parameters: parameters.to_vec(),
      },
    );

    Ok(())
  }

  async fn delete_stack(&self, name: &str) -> Result<()> {
    let mut state = self.state.lock();
    state.delete_calls.push(name.to_string());
    state.stacks.remove(name);

    Ok(())
  }

  async fn describe_stack(&self, name: &str) -> Result<Option<StackState>> {
    Ok(self.state.lock().stacks.get(name).map(|stack| StackState {
      name: name.to_string(),
      status: stack.status.clone(),
      parameters: stack.parameters.clone(),
    }))
  }

  async fn list_ready_stacks(&self) -> Result<Vec<String>> {
    Ok(
      self
        .state
        .lock()
        .stacks
        .iter()
        .filter(|(_, stack)| stack.status.is_ready())
        .map(|(name, _)| name.clone())
        .collect(),
    )
  }

  async fn list_active_stacks(&self) -> Result<Vec<String>> {
    Ok(self.state.lock().stacks.keys().cloned().collect())
  }

  async fn stack_resources(&self, name: &str) -> Result<Vec<StackResource>> {
    if name == BASE_STACK {
      return Ok(vec![
        resource("ECSCluster", "cluster-1"),
        resource("PublicSubnetOne", "subnet-1"),
        resource("PublicSubnetTwo", "subnet-2"),
        resource("ContainerSecurityGroup", "sg-1"),
      ]);
    }

    if name.ends_with("-cleanup") {
      return Ok(vec![]);
    }

    Ok(vec![
      resource("TaskDefinition", "task-def-1"),
      resource("KinesisStream", "stream-1"),
    ])
  }

  async fn stack_events(&self, _name: &str) -> Result<Vec<StackEventRecord>> {
    Ok(vec![])
  }
}

fn resource(logical_id: &str, physical_id: &str) -> StackResource {
  StackResource {
    logical_id: logical_id.to_string(),
    physical_id: physical_id.to_string(),
  }
}

struct FakeCompute {
  observations: Mutex<VecDeque<TaskObservation>>,
  final_observation: TaskObservation,
  submissions: Mutex<Vec<TaskSubmission>>,
  sentinel: Arc<Mutex<Option<String>>>,
}

impl FakeCompute {
  fn new(
    observations: Vec<TaskObservation>,
    final_observation: TaskObservation,
    sentinel: Arc<Mutex<Option<String>>>,
  ) -> Self {
    Self {
      observations: Mutex::new(observations.into()),
      final_observation,
      submissions: Mutex::new(vec![]),
      sentinel,
    }
  }
}

fn observation(last_status: &str, exit_code: Option<i32>) -> TaskObservation {
  TaskObservation {
    last_status: last_status.to_string(),
    exit_code,
  }
}

#[async_trait::async_trait]
impl ComputeApi for FakeCompute {
  async fn run_task(&self, submission: TaskSubmission) -> Result<String> {
    // The sentinel travels to the log stream through the task's own output
    if let Some(script) = submission.command.last() {
      if let Some(line) = script.lines().last() {
        let marker = line
          .trim()
          .trim_start_matches("echo \"")
          .trim_end_matches('"');
        *self.sentinel.lock() = Some(marker.to_string());
      }
    }

    self.submissions.lock().push(submission);

    Ok("arn:aws:ecs:task/1".to_string())
  }

  async fn observe_task(&self, _cluster: &str, _task_id: &str) -> Result<TaskObservation> {
    let mut observations = self.observations.lock();

    Ok(
      observations
        .pop_front()
        .unwrap_or_else(|| self.final_observation.clone()),
    )
  }

  async fn describe_task(&self, _cluster: &str, _task_id: &str) -> Result<String> {
    Ok("full task description".to_string())
  }
}

struct FakeLogs {
  batches: Mutex<VecDeque<Vec<u8>>>,
  emit_sentinel: bool,
  sentinel: Arc<Mutex<Option<String>>>,
  sentinel_emitted: Mutex<bool>,
}

impl FakeLogs {
  fn new(batches: Vec<Vec<u8>>, emit_sentinel: bool, sentinel: Arc<Mutex<Option<String>>>) -> Self {
    Self {
      batches: Mutex::new(batches.into()),
      emit_sentinel,
      sentinel,
      sentinel_emitted: Mutex::new(false),
    }
  }
}

#[async_trait::async_trait]
impl LogStreamApi for FakeLogs {
  async fn open_cursor(&self, _stream_name: &str) -> Result<LogCursor> {
    Ok(LogCursor("0".to_string()))
  }

  async fn read_records(&self, cursor: &LogCursor) -> Result<LogRecordBatch> {
    if let Some(batch) = self.batches.lock().pop_front() {
      return Ok(LogRecordBatch {
        records: vec![batch],
        next: Some(LogCursor(format!("{}+", cursor.0))),
      });
    }

    if self.emit_sentinel && !*self.sentinel_emitted.lock() {
      if let Some(sentinel) = self.sentinel.lock().clone() {
        *self.sentinel_emitted.lock() = true;

        return Ok(LogRecordBatch {
          records: vec![log_record(&[&sentinel])],
          next: Some(LogCursor(format!("{}+", cursor.0))),
        });
      }
    }

    Ok(LogRecordBatch {
      records: vec![],
      next: None,
    })
  }
}

fn log_record(lines: &[&str]) -> Vec<u8> {
  let events: Vec<serde_json::Value> = lines
    .iter()
    .map(|line| serde_json::json!({ "timestamp": 0, "message": line }))
    .collect();
  let payload = serde_json::json!({ "messageType": "DATA_MESSAGE", "logEvents": events });

  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(payload.to_string().as_bytes()).unwrap();

  encoder.finish().unwrap()
}

fn build_task(secrets: Vec<Secret>) -> BuildTask {
  BuildTask {
    build_id: "setup-StandaloneLinux64-7".to_string(),
    image: "alpine/git".to_string(),
    commands: vec!["echo hello".to_string()],
    mount_dir: "/data".to_string(),
    working_dir: "/data".to_string(),
    environment: vec![EnvironmentVariable::new("GITHUB_SHA", "abc123")],
    secrets,
  }
}

fn provider(
  stacks: Arc<FakeStacks>,
  compute: Arc<FakeCompute>,
  logs: Arc<FakeLogs>,
) -> AwsProvider {
  let provisioner =
    TaskProvisioner::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());
  let runner = TaskRunner::new(stacks, compute, logs).with_timing(
    Duration::from_millis(1),
    Duration::from_millis(30),
    fast_wait(),
  );

  AwsProvider::with_provisioner_and_runner(provisioner, runner)
}

#[tokio::test]
async fn test_run_build_task_success() {
  use cloud_runner::Provider;

  cloud_runner_logger::init_logger();

  let sentinel = Arc::new(Mutex::new(None));
  let stacks = Arc::new(FakeStacks::new());
  let compute = Arc::new(FakeCompute::new(
    vec![
      observation("PROVISIONING", None),
      observation("PENDING", None),
      observation("RUNNING", None),
      observation("RUNNING", None),
      observation("RUNNING", None),
    ],
    observation("STOPPED", Some(0)),
    sentinel.clone(),
  ));
  let logs = Arc::new(FakeLogs::new(
    vec![log_record(&["line one", "line two"])],
    true,
    sentinel.clone(),
  ));

  let provider = provider(stacks.clone(), compute.clone(), logs);
  let task = build_task(vec![Secret::new("GithubToken", "GITHUB_TOKEN", "token")]);

  provider.run_build_task(task).await.unwrap();

  let state = stacks.state.lock();
  // base stack, task stack and TTL stack were created
  let created: Vec<&str> = state
    .create_calls
    .iter()
    .map(|(name, _)| name.as_str())
    .collect();
  assert_eq!(
    created,
    vec![
      "cloud-runner",
      "cloud-runner-setup-StandaloneLinux64-7",
      "cloud-runner-setup-StandaloneLinux64-7-cleanup",
    ]
  );
  // both task stacks were deleted again
  assert_eq!(
    state.delete_calls,
    vec![
      "cloud-runner-setup-StandaloneLinux64-7",
      "cloud-runner-setup-StandaloneLinux64-7-cleanup",
    ]
  );

  let submissions = compute.submissions.lock();
  assert_eq!(submissions.len(), 1);
  let submission = &submissions[0];
  assert_eq!(submission.cluster, "cluster-1");
  assert_eq!(submission.task_definition, "task-def-1");
  assert_eq!(submission.subnets, vec!["subnet-1", "subnet-2"]);
  assert_eq!(submission.security_group, "sg-1");
  assert_eq!(submission.command[0], "-c");
  assert!(submission.command[1].starts_with("echo hello\n"));
  assert!(submission
    .environment
    .contains(&EnvironmentVariable::new("BUILDID", "setup-StandaloneLinux64-7")));
}

#[tokio::test]
async fn test_run_build_task_failure_carries_exit_code_and_cleans_up() {
  use cloud_runner::Provider;

  let sentinel = Arc::new(Mutex::new(None));
  let stacks = Arc::new(FakeStacks::new());
  let compute = Arc::new(FakeCompute::new(
    vec![observation("RUNNING", None)],
    observation("STOPPED", Some(137)),
    sentinel.clone(),
  ));
  let logs = Arc::new(FakeLogs::new(vec![], true, sentinel.clone()));

  let provider = provider(stacks.clone(), compute, logs);
  let task = build_task(vec![]);

  let res = provider.run_build_task(task).await;

  assert_eq!(res.unwrap_err(), Error::task_failed(137));

  // teardown still removed both stacks
  let state = stacks.state.lock();
  assert_eq!(state.delete_calls.len(), 2);
}

#[tokio::test]
async fn test_log_tail_stops_after_stabilization_window() {
  let sentinel = Arc::new(Mutex::new(None));
  let stacks = Arc::new(FakeStacks::new());
  // The task never reports RUNNING and the sentinel line is lost
  let compute = Arc::new(FakeCompute::new(
    vec![],
    observation("STOPPED", Some(0)),
    sentinel.clone(),
  ));
  let logs = Arc::new(FakeLogs::new(
    vec![log_record(&["only line"])],
    false,
    sentinel.clone(),
  ));

  let provisioner = TaskProvisioner::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());
  let runner = TaskRunner::new(stacks, compute, logs).with_timing(
    Duration::from_millis(1),
    Duration::from_millis(20),
    fast_wait(),
  );

  let task = build_task(vec![]);
  let resources = provisioner.provision(&task).await.unwrap();

  // Terminates via the stabilization window instead of looping forever
  runner.run(&resources, &task).await.unwrap();
}

#[tokio::test]
async fn test_empty_secrets_are_excluded_from_stack_parameters() {
  let stacks = Arc::new(FakeStacks::new());
  let provisioner = TaskProvisioner::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());

  let task = build_task(vec![
    Secret::new("GithubToken", "GITHUB_TOKEN", "token"),
    Secret::new("UnityLicense", "UNITY_LICENSE", ""),
  ]);

  let resources = provisioner.provision(&task).await.unwrap();

  assert!(resources.template.contains("GithubTokenSecret"));
  assert!(!resources.template.contains("UnityLicenseSecret"));

  let state = stacks.state.lock();
  let (_, parameters) = state
    .create_calls
    .iter()
    .find(|(name, _)| name == "cloud-runner-setup-StandaloneLinux64-7")
    .unwrap();

  assert!(parameters
    .iter()
    .any(|parameter| parameter.key == "GithubToken" && parameter.value == "token"));
  assert!(!parameters
    .iter()
    .any(|parameter| parameter.key == "UnityLicense"));
}

#[tokio::test]
async fn test_provision_failure_is_surfaced() {
  let stacks = Arc::new(FakeStacks::failing_create());
  let provisioner = TaskProvisioner::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());

  let task = build_task(vec![Secret::new("GithubToken", "GITHUB_TOKEN", "token")]);
  let res = provisioner.provision(&task).await;

  assert_eq!(
    res.unwrap_err(),
    Error::provisioning_failed("Stack creation rejected")
  );
}

#[tokio::test]
async fn test_shared_stack_is_idempotent() {
  let stacks = Arc::new(FakeStacks::new());

  let shared = SharedStack::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());
  shared.ensure_ready().await.unwrap();

  {
    let state = stacks.state.lock();
    assert_eq!(state.create_calls.len(), 1);
    assert!(state.update_calls.is_empty());
  }

  // A second build against the unchanged template issues zero update calls
  let shared = SharedStack::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());
  shared.ensure_ready().await.unwrap();

  let state = stacks.state.lock();
  assert_eq!(state.create_calls.len(), 1);
  assert!(state.update_calls.is_empty());
}

#[tokio::test]
async fn test_shared_stack_updates_on_version_drift() {
  let stacks = Arc::new(FakeStacks::new());
  stacks.state.lock().stacks.insert(
    BASE_STACK.to_string(),
    StoredStack {
      status: StackStatus::CreateComplete,
      parameters: vec![StackParameter::new("Version", "stale")],
    },
  );

  let shared = SharedStack::new(stacks.clone(), BASE_STACK).with_wait(fast_wait());
  shared.ensure_ready().await.unwrap();

  let state = stacks.state.lock();
  assert!(state.create_calls.is_empty());
  assert_eq!(state.update_calls, vec![BASE_STACK.to_string()]);
}
