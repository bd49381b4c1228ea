use crate::api::{StackApi, StackStatus};
use cloud_runner::{Error, Result};
use std::time::{Duration, Instant};

/// Poll cadence and upper bound for a remote state transition.
#[derive(Debug, Clone)]
pub struct WaitSettings {
  pub poll_interval: Duration,
  pub timeout: Duration,
}

impl Default for WaitSettings {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(10),
      timeout: Duration::from_secs(3600),
    }
  }
}

/// Wait until the stack reaches the expected status. Waiting for
/// `DeleteComplete` also accepts the stack disappearing entirely.
pub(crate) async fn wait_for_stack_status(
  api: &dyn StackApi,
  name: &str,
  expected: StackStatus,
  wait: &WaitSettings,
) -> Result<()> {
  let started = Instant::now();

  loop {
    match api.describe_stack(name).await? {
      Some(state) if state.status == expected => return Ok(()),
      None if expected == StackStatus::DeleteComplete => return Ok(()),
      _ => {}
    }

    if started.elapsed() >= wait.timeout {
      return Err(Error::provisioning_failed(format!(
        "Timed out waiting for stack {} to reach {:?}",
        name, expected
      )));
    }

    tokio::time::sleep(wait.poll_interval).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{StackEventRecord, StackParameter, StackResource, StackState};
  use parking_lot::Mutex;

  struct SequenceStackApi {
    statuses: Mutex<Vec<StackStatus>>,
  }

  #[async_trait::async_trait]
  impl StackApi for SequenceStackApi {
    async fn create_stack(&self, _: &str, _: &str, _: &[StackParameter]) -> Result<()> {
      Ok(())
    }

    async fn update_stack(&self, _: &str, _: &str, _: &[StackParameter]) -> Result<()> {
      Ok(())
    }

    async fn delete_stack(&self, _: &str) -> Result<()> {
      Ok(())
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<StackState>> {
      let mut statuses = self.statuses.lock();
      let status = if statuses.len() > 1 {
        statuses.remove(0)
      } else {
        statuses[0].clone()
      };

      Ok(Some(StackState {
        name: name.to_string(),
        status,
        parameters: vec![],
      }))
    }

    async fn list_ready_stacks(&self) -> Result<Vec<String>> {
      Ok(vec![])
    }

    async fn list_active_stacks(&self) -> Result<Vec<String>> {
      Ok(vec![])
    }

    async fn stack_resources(&self, _: &str) -> Result<Vec<StackResource>> {
      Ok(vec![])
    }

    async fn stack_events(&self, _: &str) -> Result<Vec<StackEventRecord>> {
      Ok(vec![])
    }
  }

  fn fast_wait() -> WaitSettings {
    WaitSettings {
      poll_interval: Duration::from_millis(1),
      timeout: Duration::from_millis(50),
    }
  }

  #[tokio::test]
  async fn test_wait_until_status_reached() {
    let api = SequenceStackApi {
      statuses: Mutex::new(vec![
        StackStatus::CreateInProgress,
        StackStatus::CreateInProgress,
        StackStatus::CreateComplete,
      ]),
    };

    wait_for_stack_status(&api, "stack", StackStatus::CreateComplete, &fast_wait())
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_wait_times_out() {
    let api = SequenceStackApi {
      statuses: Mutex::new(vec![StackStatus::CreateInProgress]),
    };

    let res =
      wait_for_stack_status(&api, "stack", StackStatus::CreateComplete, &fast_wait()).await;

    assert!(res.is_err());
  }
}
