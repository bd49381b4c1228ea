#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("Failed to provision build resources: {0}")]
  ProvisioningFailed(String),

  #[error("Build task failed to start: {0}")]
  TaskStartFailed(String),

  #[error("Build task failed with exit code: {0}")]
  TaskFailed(i32),

  #[error("Stage {stage} failed: {source}")]
  StageFailed {
    stage: String,
    #[source]
    source: Box<Error>,
  },

  #[error("Failed to parse build config: {0}")]
  ConfigError(String),

  #[error("Error while running build: {0}")]
  InternalRuntimeError(String),

  #[error("IO error: {0}")]
  IOError(#[from] std::io::Error),
}

impl Error {
  pub fn provisioning_failed<T: ToString>(message: T) -> Self {
    Self::ProvisioningFailed(message.to_string())
  }

  pub fn task_start_failed<T: ToString>(message: T) -> Self {
    Self::TaskStartFailed(message.to_string())
  }

  pub fn task_failed(exit_code: i32) -> Self {
    Self::TaskFailed(exit_code)
  }

  pub fn stage_failed(stage: impl Into<String>, source: Error) -> Self {
    Self::StageFailed {
      stage: stage.into(),
      source: Box::new(source),
    }
  }

  pub fn config_error<T: ToString>(message: T) -> Self {
    Self::ConfigError(message.to_string())
  }

  pub fn internal_runtime_error<T: ToString>(message: T) -> Self {
    Self::InternalRuntimeError(message.to_string())
  }

  pub fn io_error(source: std::io::Error) -> Self {
    Self::IOError(source)
  }
}

// implement Eq and PartialEq for Error so that we can compare errors in tests
impl PartialEq for Error {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::ProvisioningFailed(a), Self::ProvisioningFailed(b)) => a == b,
      (Self::TaskStartFailed(a), Self::TaskStartFailed(b)) => a == b,
      (Self::TaskFailed(a), Self::TaskFailed(b)) => a == b,
      (
        Self::StageFailed {
          stage: a,
          source: sa,
        },
        Self::StageFailed {
          stage: b,
          source: sb,
        },
      ) => a == b && sa == sb,
      (Self::ConfigError(a), Self::ConfigError(b)) => a == b,
      (Self::InternalRuntimeError(a), Self::InternalRuntimeError(b)) => a == b,
      (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
      _ => false,
    }
  }
}
