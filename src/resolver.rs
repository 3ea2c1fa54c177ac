//! Tool resolver: maps logical tool names to whichever of their candidate
//! containers is actually deployed.

use std::collections::HashMap;

use crate::catalog;
use crate::docker::{ContainerStatus, Probe};

/// Resolution logic over a probe snapshot. The binding table is fixed for
/// the process lifetime; both tool order and candidate order are preserved
/// exactly as configured.
#[derive(Debug, Clone)]
pub struct ToolResolver {
    bindings: Vec<(String, Vec<String>)>,
}

impl Default for ToolResolver {
    fn default() -> Self {
        let bindings = catalog::TOOL_BINDINGS
            .iter()
            .map(|b| {
                (
                    b.tool.to_string(),
                    b.candidates.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect();
        Self { bindings }
    }
}

impl ToolResolver {
    #[cfg(test)]
    pub fn with_bindings(bindings: Vec<(String, Vec<String>)>) -> Self {
        Self { bindings }
    }

    /// Resolve a logical tool name against a snapshot. Returns the first
    /// candidate container present in the snapshot; unknown names and tools
    /// with no deployed candidate pass through unchanged, so the runtime
    /// reports its own not-found error for them.
    pub fn resolve_in(&self, name: &str, snapshot: &HashMap<String, ContainerStatus>) -> String {
        if let Some((_, candidates)) = self.bindings.iter().find(|(tool, _)| tool == name) {
            for candidate in candidates {
                if snapshot.contains_key(candidate) {
                    return candidate.clone();
                }
            }
        }
        name.to_string()
    }

    pub async fn resolve(&self, probe: &Probe, name: &str) -> String {
        self.resolve_in(name, &probe.list_all().await)
    }

    /// One status per configured tool: the matched container's record, or a
    /// synthetic not_found record named after the first candidate.
    pub fn statuses_in(
        &self,
        snapshot: &HashMap<String, ContainerStatus>,
    ) -> HashMap<String, ContainerStatus> {
        self.bindings
            .iter()
            .map(|(tool, candidates)| {
                let status = candidates
                    .iter()
                    .find_map(|candidate| snapshot.get(candidate).cloned())
                    .unwrap_or_else(|| {
                        let display = candidates.first().map_or(tool.as_str(), |c| c.as_str());
                        ContainerStatus::not_found(display)
                    });
                (tool.clone(), status)
            })
            .collect()
    }

    pub async fn status_for_all_tools(&self, probe: &Probe) -> HashMap<String, ContainerStatus> {
        self.statuses_in(&probe.list_all().await)
    }
}
