use serde::{Deserialize, Serialize};

/// Which remote compute backs the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
  Aws,
  K8s,
  Local,
}

impl Default for Cluster {
  fn default() -> Self {
    Cluster::Local
  }
}

/// The caller-supplied build parameter bundle. Loading it from the command
/// line or an action manifest happens outside this crate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildParams {
  /// Build target platform, e.g. `StandaloneLinux64`.
  pub platform: String,
  pub project_path: String,
  pub build_path: String,
  pub build_file: String,
  pub build_name: String,
  pub build_method: String,
  pub custom_parameters: String,
  pub github_token: String,
  pub cluster: Cluster,
  /// Name of the long-lived base stack shared by all tasks (AWS).
  pub base_stack_name: String,
  pub memory: String,
  pub cpu: String,
  /// Optional YAML payload describing extra post-build steps.
  pub custom_build_steps: String,
  pub android_keystore_name: String,
  pub android_keystore_base64: String,
  pub android_keystore_pass: String,
  pub android_keyalias_name: String,
  pub android_keyalias_pass: String,
  pub android_version_code: String,
  /// Adopt an existing volume claim instead of creating one (Kubernetes).
  pub kube_volume: String,
  pub kube_volume_size: String,
  /// Optional pre-stop hook command for the job's main container.
  pub pre_stop_command: String,
  pub chown_files_to: String,
}

impl Default for BuildParams {
  fn default() -> Self {
    Self {
      platform: String::new(),
      project_path: String::new(),
      build_path: "build".to_string(),
      build_file: String::new(),
      build_name: String::new(),
      build_method: String::new(),
      custom_parameters: String::new(),
      github_token: String::new(),
      cluster: Cluster::default(),
      base_stack_name: "cloud-runner".to_string(),
      memory: "3500Mi".to_string(),
      cpu: "1.0".to_string(),
      custom_build_steps: String::new(),
      android_keystore_name: String::new(),
      android_keystore_base64: String::new(),
      android_keystore_pass: String::new(),
      android_keyalias_name: String::new(),
      android_keyalias_pass: String::new(),
      android_version_code: String::new(),
      kube_volume: String::new(),
      kube_volume_size: "5Gi".to_string(),
      pre_stop_command: String::new(),
      chown_files_to: String::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cluster_parse() {
    let cluster: Cluster = serde_yaml::from_str("aws").unwrap();
    assert_eq!(cluster, Cluster::Aws);

    let cluster: Cluster = serde_yaml::from_str("k8s").unwrap();
    assert_eq!(cluster, Cluster::K8s);

    let cluster: Cluster = serde_yaml::from_str("local").unwrap();
    assert_eq!(cluster, Cluster::Local);
  }

  #[test]
  fn test_params_defaults() {
    let params: BuildParams = serde_yaml::from_str("platform: StandaloneLinux64").unwrap();

    assert_eq!(params.platform, "StandaloneLinux64");
    assert_eq!(params.cluster, Cluster::Local);
    assert_eq!(params.base_stack_name, "cloud-runner");
    assert_eq!(params.kube_volume_size, "5Gi");
  }
}
