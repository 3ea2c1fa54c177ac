//! Append-only activity log, persisted as one JSON document.
//!
//! Entry ids are assigned as `len + 1` at append time and therefore always
//! form the sequence `1..N` in file order. Id assignment, the in-memory push
//! and the whole-document rewrite all happen under one lock, so concurrent
//! appends can neither duplicate ids nor leave the persisted count out of
//! step with memory. The rewrite-everything format is the baseline contract;
//! it does not scale past modest entry counts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const CHANGELOG_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ChangelogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub id: u64,
    pub timestamp: String,
    pub action: String,
    pub details: String,
    pub user: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogMetadata {
    pub created: String,
    pub version: String,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangelogStats {
    pub total_entries: usize,
    pub by_level: HashMap<String, usize>,
    pub by_action: HashMap<String, usize>,
    pub recent_activity: usize,
}

/// The persisted document. Pure value type; all locking lives in
/// [`Changelog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogDocument {
    pub entries: Vec<ChangelogEntry>,
    pub metadata: ChangelogMetadata,
}

impl ChangelogDocument {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            metadata: ChangelogMetadata {
                created: chrono::Local::now().to_rfc3339(),
                version: CHANGELOG_VERSION.to_string(),
                total_entries: 0,
            },
        }
    }

    /// Append a new entry, assigning its id and timestamp.
    pub fn append_entry(
        &mut self,
        action: &str,
        details: &str,
        user: &str,
        level: &str,
    ) -> ChangelogEntry {
        let entry = ChangelogEntry {
            id: self.entries.len() as u64 + 1,
            timestamp: chrono::Local::now().to_rfc3339(),
            action: action.to_string(),
            details: details.to_string(),
            user: user.to_string(),
            level: level.to_string(),
        };
        self.entries.push(entry.clone());
        self.metadata.total_entries = self.entries.len();
        entry
    }

    /// Entries matching `level` (exact match), then the last `limit` of
    /// those, in original order.
    pub fn filtered(&self, limit: Option<usize>, level: Option<&str>) -> Vec<ChangelogEntry> {
        let matching: Vec<&ChangelogEntry> = match level {
            Some(level) => self.entries.iter().filter(|e| e.level == level).collect(),
            None => self.entries.iter().collect(),
        };
        let skip = match limit {
            Some(limit) => matching.len().saturating_sub(limit),
            None => 0,
        };
        matching.into_iter().skip(skip).cloned().collect()
    }

    /// Aggregate counts. Entries whose timestamp does not parse count as
    /// not recent.
    pub fn stats(&self) -> ChangelogStats {
        let now = chrono::Local::now();
        let mut by_level: HashMap<String, usize> = HashMap::new();
        let mut by_action: HashMap<String, usize> = HashMap::new();
        let mut recent_activity = 0;

        for entry in &self.entries {
            *by_level.entry(entry.level.clone()).or_default() += 1;
            *by_action.entry(entry.action.clone()).or_default() += 1;
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(&entry.timestamp) {
                if now.signed_duration_since(ts).num_seconds() < 24 * 3600 {
                    recent_activity += 1;
                }
            }
        }

        ChangelogStats {
            total_entries: self.entries.len(),
            by_level,
            by_action,
            recent_activity,
        }
    }
}

impl Default for ChangelogDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable activity log shared by the API layer, the command dispatcher and
/// the status monitor.
pub struct Changelog {
    path: PathBuf,
    doc: Mutex<ChangelogDocument>,
}

impl Changelog {
    /// Load the document from `path`, or initialize a fresh one when the
    /// file is missing or does not parse (prior data is lost, not
    /// reconstructed). Failing to persist the initial document is the one
    /// fatal outcome.
    pub async fn load_or_init(path: impl Into<PathBuf>) -> Result<Self, ChangelogError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<ChangelogDocument>(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    log::error!("Changelog at {path:?} is corrupt, reinitializing: {e}");
                    let doc = ChangelogDocument::new();
                    persist(&path, &doc).await?;
                    doc
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let doc = ChangelogDocument::new();
                persist(&path, &doc).await?;
                doc
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Append an entry and rewrite the backing file before returning. A
    /// failed rewrite is logged but the in-memory append stands; memory is
    /// authoritative for the rest of the process lifetime.
    pub async fn append(
        &self,
        action: &str,
        details: &str,
        user: &str,
        level: &str,
    ) -> ChangelogEntry {
        let mut doc = self.doc.lock().await;
        let entry = doc.append_entry(action, details, user, level);
        if let Err(e) = persist(&self.path, &doc).await {
            log::error!("Failed to persist changelog to {:?}: {e}", self.path);
        }
        log::info!("Changelog entry added: {action} - {details}");
        entry
    }

    pub async fn entries(&self, limit: Option<usize>, level: Option<&str>) -> Vec<ChangelogEntry> {
        self.doc.lock().await.filtered(limit, level)
    }

    pub async fn stats(&self) -> ChangelogStats {
        self.doc.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.doc.lock().await.entries.len()
    }
}

async fn persist(path: &Path, doc: &ChangelogDocument) -> Result<(), ChangelogError> {
    let raw = serde_json::to_vec_pretty(doc)?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::sync::Arc;

    fn sample_doc(levels: &[&str]) -> ChangelogDocument {
        let mut doc = ChangelogDocument::new();
        for level in levels {
            doc.append_entry("test_action", "details", "system", level);
        }
        doc
    }

    #[test]
    fn test_ids_are_sequential() {
        let doc = sample_doc(&["info"; 5]);
        let ids: Vec<u64> = doc.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(doc.metadata.total_entries, 5);
    }

    #[test]
    fn test_filter_by_level() {
        let doc = sample_doc(&["info", "warning", "info", "error"]);
        let warnings = doc.filtered(None, Some("warning"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, 2);
        // A level with no matches yields an empty result, not an error
        assert!(doc.filtered(None, Some("debug")).is_empty());
    }

    #[test]
    fn test_limit_keeps_most_recent() {
        let doc = sample_doc(&["info", "info", "info", "info"]);
        let last_two = doc.filtered(Some(2), None);
        assert_eq!(
            last_two.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![3, 4]
        );
        // Limit larger than the matching count returns everything
        assert_eq!(doc.filtered(Some(100), None).len(), 4);
    }

    #[test]
    fn test_level_filter_applies_before_limit() {
        let doc = sample_doc(&["info", "error", "info", "error", "error"]);
        let entries = doc.filtered(Some(2), Some("error"));
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn test_stats_counts() {
        let mut doc = sample_doc(&["info", "warning", "info"]);
        doc.append_entry("other_action", "details", "system", "error");
        let stats = doc.stats();
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.by_level["info"], 2);
        assert_eq!(stats.by_level["warning"], 1);
        assert_eq!(stats.by_level["error"], 1);
        assert_eq!(stats.by_action["test_action"], 3);
        assert_eq!(stats.by_action["other_action"], 1);
        // All entries were just created
        assert_eq!(stats.recent_activity, 4);
    }

    #[test]
    fn test_unparsable_timestamp_is_not_recent() {
        let mut doc = sample_doc(&["info"]);
        doc.entries[0].timestamp = "not a timestamp".to_string();
        assert_eq!(doc.stats().recent_activity, 0);
    }

    #[quickcheck]
    fn prop_filtered_respects_limit_and_level(levels: Vec<u8>, limit: usize) -> bool {
        const NAMES: [&str; 3] = ["info", "warning", "error"];
        let levels: Vec<&str> = levels.iter().map(|l| NAMES[(*l % 3) as usize]).collect();
        let doc = sample_doc(&levels);

        let filtered = doc.filtered(Some(limit), Some("warning"));
        let all_warnings = doc.filtered(None, Some("warning"));
        let expected: Vec<ChangelogEntry> = all_warnings
            .iter()
            .skip(all_warnings.len().saturating_sub(limit))
            .cloned()
            .collect();

        filtered == expected && filtered.len() <= limit
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("changelog.json");

        let log = Changelog::load_or_init(&path).await.expect("init failed");
        log.append("container_started", "Container 'wazuh' started", "system", "info")
            .await;
        log.append("api_call", "Container count requested", "api_user", "info")
            .await;
        let before = log.entries(None, None).await;

        let reloaded = Changelog::load_or_init(&path).await.expect("reload failed");
        assert_eq!(reloaded.entries(None, None).await, before);
        assert_eq!(reloaded.len().await, 2);
        assert_eq!(reloaded.stats().await.total_entries, 2);
    }

    #[tokio::test]
    async fn test_missing_store_initialized_and_persisted() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("changelog.json");

        let log = Changelog::load_or_init(&path).await.expect("init failed");
        assert_eq!(log.len().await, 0);
        // The empty document is written out immediately
        let raw = std::fs::read(&path).expect("store was not created");
        let doc: ChangelogDocument = serde_json::from_slice(&raw).expect("store is not valid");
        assert_eq!(doc.metadata.total_entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_store_reinitialized() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("changelog.json");
        std::fs::write(&path, b"{ not json").expect("write failed");

        let log = Changelog::load_or_init(&path).await.expect("init failed");
        assert_eq!(log.len().await, 0);
        let entry = log.append("system_startup", "started", "system", "info").await;
        assert_eq!(entry.id, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_assign_unique_ids() {
        const TASKS: u64 = 8;
        const APPENDS: u64 = 25;

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("changelog.json");
        let log = Arc::new(Changelog::load_or_init(&path).await.expect("init failed"));

        let mut handles = Vec::new();
        for task in 0..TASKS {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                for i in 0..APPENDS {
                    log.append("stress", &format!("task {task} append {i}"), "system", "info")
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        let entries = log.entries(None, None).await;
        assert_eq!(entries.len(), (TASKS * APPENDS) as usize);
        let mut ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=TASKS * APPENDS).collect::<Vec<_>>());

        // The persisted count agrees with memory after the last append
        let raw = std::fs::read(&path).expect("store missing");
        let doc: ChangelogDocument = serde_json::from_slice(&raw).expect("store corrupt");
        assert_eq!(doc.metadata.total_entries, (TASKS * APPENDS) as usize);
    }
}
