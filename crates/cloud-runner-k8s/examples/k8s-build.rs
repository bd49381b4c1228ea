use cloud_runner::{BuildContext, BuildParams, BuildSource, Cluster, Pipeline};
use cloud_runner_k8s::K8sProvider;
use std::sync::Arc;

#[tokio::main]
async fn main() -> cloud_runner::Result<()> {
  cloud_runner_logger::init_logger();

  let params = BuildParams {
    platform: "StandaloneLinux64".to_string(),
    project_path: "Project".to_string(),
    github_token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
    cluster: Cluster::K8s,
    kube_volume_size: "5Gi".to_string(),
    ..Default::default()
  };
  let source = BuildSource::from_env()?;

  let provider = Arc::new(K8sProvider::connect("default").await?);
  let ctx = BuildContext::new(params, source);

  Pipeline::new(provider, ctx, "unityci/editor:ubuntu-2022.3.13f1-linux-il2cpp-3").run().await
}
