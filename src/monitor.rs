//! Status reconciler: a background task that polls the probe, diffs each
//! snapshot against the previous one, and records every transition in the
//! changelog.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::changelog::Changelog;
use crate::docker::{ContainerStatus, LifecycleState, Probe, ProbeError};

pub struct StatusEvent {
    pub action: &'static str,
    pub details: String,
    pub level: &'static str,
}

/// Diff the previous cycle's lifecycle states against a fresh snapshot.
/// New name -> container_started; same name with a different state ->
/// container_status_changed; name gone -> container_stopped. Unchanged
/// names emit nothing. Order among independent containers is unspecified.
pub fn diff_events(
    previous: &HashMap<String, LifecycleState>,
    current: &HashMap<String, ContainerStatus>,
) -> Vec<StatusEvent> {
    let mut events = Vec::new();

    for (name, status) in current {
        match previous.get(name) {
            None => events.push(StatusEvent {
                action: "container_started",
                details: format!(
                    "Container '{name}' started with status: {}",
                    status.status
                ),
                level: "info",
            }),
            Some(old) if *old != status.status => events.push(StatusEvent {
                action: "container_status_changed",
                details: format!(
                    "Container '{name}' status changed from '{old}' to '{}'",
                    status.status
                ),
                level: "warning",
            }),
            Some(_) => {}
        }
    }

    for name in previous.keys() {
        if !current.contains_key(name) {
            events.push(StatusEvent {
                action: "container_stopped",
                details: format!("Container '{name}' stopped"),
                level: "warning",
            });
        }
    }

    events
}

pub struct Monitor {
    pub probe: Probe,
    pub changelog: Arc<Changelog>,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Monitor {
    /// Spawn the reconciliation loop. It runs until the handle's stop signal
    /// and never terminates on a failed cycle; failures are logged and
    /// followed by the longer backoff interval.
    pub fn spawn(self) -> MonitorHandle {
        let (cancel_tx, mut cancel_rx) = mpsc::channel::<()>(1);
        let active = Arc::new(AtomicBool::new(false));

        let task_active = Arc::clone(&active);
        let task = tokio::spawn(async move {
            task_active.store(true, Ordering::SeqCst);
            log::info!("Container monitoring started");

            let mut previous: HashMap<String, LifecycleState> = HashMap::new();
            loop {
                let wait = match self.run_cycle(&mut previous).await {
                    Ok(()) => self.poll_interval,
                    Err(e) => {
                        log::error!("Reconciliation cycle failed: {e}");
                        self.error_backoff
                    }
                };

                // The stop signal is only honored between cycles
                tokio::select! {
                    _ = cancel_rx.recv() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            task_active.store(false, Ordering::SeqCst);
            log::info!("Container monitoring stopped");
        });

        MonitorHandle {
            cancel_tx,
            task: Mutex::new(Some(task)),
            active,
        }
    }

    async fn run_cycle(
        &self,
        previous: &mut HashMap<String, LifecycleState>,
    ) -> Result<(), ProbeError> {
        let current = self.probe.try_list_all().await?;

        for event in diff_events(previous, &current) {
            self.changelog
                .append(event.action, &event.details, "system", event.level)
                .await;
        }

        *previous = current
            .into_iter()
            .map(|(name, status)| (name, status.status))
            .collect();
        Ok(())
    }
}

pub struct MonitorHandle {
    cancel_tx: mpsc::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
    active: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Whether the reconciliation loop is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Signal the loop to stop and wait for it to exit. Safe to call from
    /// any task; a second call is a no-op.
    pub async fn stop(&self) {
        let _ = self.cancel_tx.send(()).await;
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                log::error!("Monitor task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::Docker;

    fn status(name: &str, state: LifecycleState, text: &str) -> ContainerStatus {
        ContainerStatus::new(name, state, text, "", "test/image:latest", "")
    }

    fn states(pairs: &[(&str, LifecycleState)]) -> HashMap<String, LifecycleState> {
        pairs.iter().map(|(n, s)| (n.to_string(), *s)).collect()
    }

    #[test]
    fn test_diff_emits_each_transition_once() {
        let previous = states(&[
            ("a", LifecycleState::Running),
            ("b", LifecycleState::Stopped),
        ]);
        let current: HashMap<String, ContainerStatus> = [
            ("a".to_string(), status("a", LifecycleState::Stopped, "Exited (0) 1 second ago")),
            ("c".to_string(), status("c", LifecycleState::Running, "Up 1 second")),
        ]
        .into();

        let events = diff_events(&previous, &current);
        assert_eq!(events.len(), 3);

        let changed: Vec<_> = events
            .iter()
            .filter(|e| e.action == "container_status_changed")
            .collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].level, "warning");
        assert_eq!(
            changed[0].details,
            "Container 'a' status changed from 'running' to 'stopped'"
        );

        let started: Vec<_> = events
            .iter()
            .filter(|e| e.action == "container_started")
            .collect();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].level, "info");
        assert!(started[0].details.contains("'c'"));

        let stopped: Vec<_> = events
            .iter()
            .filter(|e| e.action == "container_stopped")
            .collect();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].details, "Container 'b' stopped");
    }

    #[test]
    fn test_diff_unchanged_state_is_silent() {
        let previous = states(&[("a", LifecycleState::Running)]);
        let current: HashMap<String, ContainerStatus> =
            [("a".to_string(), status("a", LifecycleState::Running, "Up 2 hours"))].into();
        assert!(diff_events(&previous, &current).is_empty());
    }

    #[test]
    fn test_cold_start_reports_everything_as_started() {
        let previous = HashMap::new();
        let current: HashMap<String, ContainerStatus> = [
            ("a".to_string(), status("a", LifecycleState::Running, "Up 1 hour")),
            ("b".to_string(), status("b", LifecycleState::Stopped, "Exited (0) 2 days ago")),
        ]
        .into();
        let events = diff_events(&previous, &current);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == "container_started"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_joins_without_deadlock() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let changelog = Arc::new(
            Changelog::load_or_init(dir.path().join("changelog.json"))
                .await
                .expect("init failed"),
        );
        // bollard requires the socket path to exist at construction; a plain
        // file is enough, and connecting to it fails at request time.
        let _ = std::fs::File::create("/tmp/blueport-test-missing.sock");
        let docker = Docker::connect_with_unix(
            "unix:///tmp/blueport-test-missing.sock",
            5,
            bollard::API_DEFAULT_VERSION,
        )
        .expect("Failed to build Docker client");

        let handle = Monitor {
            probe: Probe::new(docker, Duration::from_millis(100)),
            changelog,
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_secs(60),
        }
        .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_active());

        // Even while the loop sits in its backoff sleep, stop must return
        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("stop() deadlocked");
        assert!(!handle.is_active());
    }
}
