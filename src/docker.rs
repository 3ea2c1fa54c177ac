//! Runtime status probe over the Docker API using bollard.
//!
//! The probe queries all containers (running or not), normalizes each into a
//! [`ContainerStatus`], and degrades to empty results when the daemon is
//! unreachable or the query times out. Lifecycle classification is based on
//! the free-text status Docker reports; that fragile rule lives only here.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bollard::Docker;
use bollard::models::{ContainerSummary, PortSummary};
use bollard::query_parameters::{ListContainersOptions, ListContainersOptionsBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("Docker query timed out after {0:?}")]
    Timeout(Duration),
}

/// Coarse classification of a container's runtime status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Running,
    Stopped,
    Created,
    Unknown,
    NotFound,
}

impl LifecycleState {
    /// Classify a free-text Docker status ("Up 3 hours", "Exited (0) ...").
    /// First match wins; "Up" takes priority should a status ever carry
    /// several keywords.
    pub fn classify(status_text: &str) -> Self {
        if status_text.contains("Up") {
            LifecycleState::Running
        } else if status_text.contains("Exited") {
            LifecycleState::Stopped
        } else if status_text.contains("Created") {
            LifecycleState::Created
        } else {
            LifecycleState::Unknown
        }
    }

    /// Display color used by the dashboard.
    pub fn color(self) -> &'static str {
        match self {
            LifecycleState::Running => "green",
            LifecycleState::Stopped => "red",
            LifecycleState::Created => "yellow",
            LifecycleState::Unknown | LifecycleState::NotFound => "gray",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Created => "created",
            LifecycleState::Unknown => "unknown",
            LifecycleState::NotFound => "not_found",
        };
        f.write_str(s)
    }
}

/// One container as observed at a point in time. Constructed fresh on every
/// probe call and never mutated; the next snapshot supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub status: LifecycleState,
    pub status_text: String,
    pub status_color: String,
    pub ports: String,
    pub image: String,
    pub size: String,
    pub last_updated: String,
}

impl ContainerStatus {
    pub fn new(
        name: impl Into<String>,
        status: LifecycleState,
        status_text: impl Into<String>,
        ports: impl Into<String>,
        image: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            status_text: status_text.into(),
            status_color: status.color().to_string(),
            ports: ports.into(),
            image: image.into(),
            size: size.into(),
            last_updated: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Synthetic record for a configured tool with no matching container.
    pub fn not_found(display_name: impl Into<String>) -> Self {
        Self::new(
            display_name,
            LifecycleState::NotFound,
            "Container not found",
            "",
            "",
            "",
        )
    }

    fn from_summary(summary: &ContainerSummary) -> Option<Self> {
        let name = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_string())?;
        let status_text = summary.status.clone().unwrap_or_default();
        Some(Self::new(
            name,
            LifecycleState::classify(&status_text),
            status_text,
            format_ports(summary.ports.as_deref()),
            summary.image.clone().unwrap_or_default(),
            format_size(summary.size_rw, summary.size_root_fs),
        ))
    }
}

/// Queries the Docker daemon for container state. Cheap to clone; the
/// underlying client is reference counted.
#[derive(Clone)]
pub struct Probe {
    docker: Docker,
    timeout: Duration,
}

impl Probe {
    pub fn new(docker: Docker, timeout: Duration) -> Self {
        Self { docker, timeout }
    }

    /// List all containers regardless of lifecycle state, keyed by name.
    /// Surfaces the underlying error; most callers want [`Probe::list_all`].
    pub async fn try_list_all(&self) -> Result<HashMap<String, ContainerStatus>, ProbeError> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new()
            .all(true)
            .size(true)
            .build();

        let summaries = tokio::time::timeout(
            self.timeout,
            self.docker.list_containers(Some(options)),
        )
        .await
        .map_err(|_| ProbeError::Timeout(self.timeout))??;

        Ok(summaries
            .iter()
            .filter_map(ContainerStatus::from_summary)
            .map(|status| (status.name.clone(), status))
            .collect())
    }

    /// Degrading form of [`Probe::try_list_all`]: any failure is logged and
    /// yields an empty map. Callers cannot distinguish "no containers" from
    /// "probe failed" and must not treat either as fatal.
    pub async fn list_all(&self) -> HashMap<String, ContainerStatus> {
        match self.try_list_all().await {
            Ok(containers) => containers,
            Err(e) => {
                log::error!("Failed to list containers: {e}");
                HashMap::new()
            }
        }
    }

    /// Number of currently running containers; 0 when the query fails.
    pub async fn count_running(&self) -> usize {
        self.list_all()
            .await
            .values()
            .filter(|c| c.status == LifecycleState::Running)
            .count()
    }
}

fn format_ports(ports: Option<&[PortSummary]>) -> String {
    let Some(ports) = ports else {
        return String::new();
    };
    let mut parts: Vec<String> = ports
        .iter()
        .map(|p| {
            let proto = p
                .typ
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "tcp".to_string());
            match (p.ip.as_deref(), p.public_port) {
                (Some(ip), Some(public)) => {
                    format!("{ip}:{public}->{}/{proto}", p.private_port)
                }
                (None, Some(public)) => format!("{public}->{}/{proto}", p.private_port),
                _ => format!("{}/{proto}", p.private_port),
            }
        })
        .collect();
    parts.sort();
    parts.dedup();
    parts.join(", ")
}

fn format_size(size_rw: Option<i64>, size_root_fs: Option<i64>) -> String {
    match (size_rw, size_root_fs) {
        (Some(rw), Some(total)) => {
            format!("{} (virtual {})", human_bytes(rw), human_bytes(total))
        }
        (Some(rw), None) => human_bytes(rw),
        (None, Some(total)) => format!("(virtual {})", human_bytes(total)),
        (None, None) => String::new(),
    }
}

fn human_bytes(n: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value.abs() >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
