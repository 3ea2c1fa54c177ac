//! Synchronous start/stop/restart commands against a named container,
//! resolved through the tool table first so logical tool names and literal
//! container names both work.

use std::sync::Arc;
use std::time::Duration;

use bollard::Docker;
use bollard::query_parameters::{
    RestartContainerOptions, RestartContainerOptionsBuilder, StartContainerOptions,
    StartContainerOptionsBuilder, StopContainerOptions, StopContainerOptionsBuilder,
};
use serde::Serialize;

use crate::changelog::Changelog;
use crate::docker::Probe;
use crate::resolver::ToolResolver;

const STOP_GRACE_SECS: i32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LifecycleCommand {
    Start,
    Stop,
    Restart,
}

impl LifecycleCommand {
    fn verb(self) -> &'static str {
        match self {
            LifecycleCommand::Start => "start",
            LifecycleCommand::Stop => "stop",
            LifecycleCommand::Restart => "restart",
        }
    }

    fn past(self) -> &'static str {
        match self {
            LifecycleCommand::Start => "started",
            LifecycleCommand::Stop => "stopped",
            LifecycleCommand::Restart => "restarted",
        }
    }

    fn action(self) -> &'static str {
        match self {
            LifecycleCommand::Start => "container_started",
            LifecycleCommand::Stop => "container_stopped",
            LifecycleCommand::Restart => "container_restarted",
        }
    }
}

pub struct Dispatcher {
    docker: Docker,
    probe: Probe,
    resolver: ToolResolver,
    changelog: Arc<Changelog>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        docker: Docker,
        probe: Probe,
        resolver: ToolResolver,
        changelog: Arc<Changelog>,
        timeout: Duration,
    ) -> Self {
        Self {
            docker,
            probe,
            resolver,
            changelog,
            timeout,
        }
    }

    pub async fn start(&self, name: &str) -> ActionResult {
        self.dispatch(LifecycleCommand::Start, name).await
    }

    pub async fn stop(&self, name: &str) -> ActionResult {
        self.dispatch(LifecycleCommand::Stop, name).await
    }

    pub async fn restart(&self, name: &str) -> ActionResult {
        self.dispatch(LifecycleCommand::Restart, name).await
    }

    /// Issue the lifecycle command against the resolved container. Success
    /// is logged to the changelog naming the resolved container; failure and
    /// timeout surface the runtime's error text in the result and write
    /// nothing.
    async fn dispatch(&self, cmd: LifecycleCommand, name: &str) -> ActionResult {
        let resolved = self.resolver.resolve(&self.probe, name).await;
        log::info!("Dispatching {} for container '{resolved}'", cmd.verb());

        let outcome = tokio::time::timeout(self.timeout, async {
            match cmd {
                LifecycleCommand::Start => {
                    let options: StartContainerOptions = StartContainerOptionsBuilder::new().build();
                    self.docker.start_container(&resolved, Some(options)).await
                }
                LifecycleCommand::Stop => {
                    let options: StopContainerOptions =
                        StopContainerOptionsBuilder::new().t(STOP_GRACE_SECS).build();
                    self.docker.stop_container(&resolved, Some(options)).await
                }
                LifecycleCommand::Restart => {
                    let options: RestartContainerOptions =
                        RestartContainerOptionsBuilder::new().build();
                    self.docker.restart_container(&resolved, Some(options)).await
                }
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                self.changelog
                    .append(
                        cmd.action(),
                        &format!("Container '{resolved}' {} manually", cmd.past()),
                        "system",
                        "info",
                    )
                    .await;
                ActionResult::ok(format!(
                    "Container {resolved} {} successfully",
                    cmd.past()
                ))
            }
            Ok(Err(e)) => {
                log::warn!("Failed to {} container {resolved}: {e}", cmd.verb());
                ActionResult::fail(format!("Failed to {} container: {e}", cmd.verb()))
            }
            Err(_) => {
                log::warn!(
                    "Timed out after {:?} waiting to {} container {resolved}",
                    self.timeout,
                    cmd.verb()
                );
                ActionResult::fail(format!(
                    "Failed to {} container: timed out after {:?}",
                    cmd.verb(),
                    self.timeout
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn unreachable_dispatcher(dir: &std::path::Path) -> (Dispatcher, Arc<Changelog>) {
        // bollard requires the socket path to exist at construction; a plain
        // file is enough, and connecting to it fails at request time.
        let _ = std::fs::File::create("/tmp/blueport-test-missing.sock");
        let docker = Docker::connect_with_unix(
            "unix:///tmp/blueport-test-missing.sock",
            5,
            bollard::API_DEFAULT_VERSION,
        )
        .expect("Failed to build Docker client");
        let changelog = Arc::new(
            Changelog::load_or_init(dir.join("changelog.json"))
                .await
                .expect("init failed"),
        );
        let dispatcher = Dispatcher::new(
            docker.clone(),
            Probe::new(docker, Duration::from_millis(200)),
            ToolResolver::default(),
            Arc::clone(&changelog),
            Duration::from_millis(500),
        );
        (dispatcher, changelog)
    }

    #[tokio::test]
    async fn test_runtime_failure_is_structured_not_logged() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (dispatcher, changelog) = unreachable_dispatcher(dir.path()).await;

        let result = dispatcher.start("wazuh").await;
        assert!(!result.success);
        assert!(result.message.starts_with("Failed to start container:"));
        // A failed command writes no success entry
        assert_eq!(changelog.len().await, 0);

        let result = dispatcher.stop("nonexistent-container").await;
        assert!(!result.success);
        let result = dispatcher.restart("nonexistent-container").await;
        assert!(!result.success);
        assert_eq!(changelog.len().await, 0);
    }
}
