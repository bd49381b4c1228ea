use super::{EnvironmentVariable, Secret};

/// One remote task execution: a container image plus an ordered command
/// stream, built fresh per pipeline stage and consumed once by a provider.
#[derive(Debug, Clone)]
pub struct BuildTask {
  pub build_id: String,
  pub image: String,
  pub commands: Vec<String>,
  pub mount_dir: String,
  pub working_dir: String,
  pub environment: Vec<EnvironmentVariable>,
  pub secrets: Vec<Secret>,
}

impl BuildTask {
  /// The command stream flattened into a single shell script.
  pub fn script(&self) -> String {
    self.commands.join("\n")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_script() {
    let task = BuildTask {
      build_id: "build-1".to_string(),
      image: "alpine".to_string(),
      commands: vec!["echo hello".to_string(), "echo world".to_string()],
      mount_dir: "/data".to_string(),
      working_dir: "/data".to_string(),
      environment: vec![],
      secrets: vec![],
    };

    assert_eq!(task.script(), "echo hello\necho world");
  }
}
