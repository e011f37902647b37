//! Recall drift detection and the baseline store backing it (component N).

use memory_core::{EmbeddingVersion, EntityIdType, PathSafetyError, RecallBaseline, RecallThresholds, Timestamp};
use memory_index::BruteForceSearcher;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ABSOLUTE_THRESHOLD: f32 = 0.90;
pub const DRIFT_THRESHOLD: f32 = 0.05;
const MAX_HISTORY_FILES: usize = 100;

/// Derive a filename-safe, 16-hex-char token from an arbitrary filter
/// description. The raw description is never written to disk.
fn sanitize_filter_name(filter: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filter.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

fn baseline_filename(filter: Option<&str>) -> String {
    match filter {
        Some(f) => format!("baseline-{}.json", sanitize_filter_name(f)),
        None => "baseline-default.json".to_string(),
    }
}

/// Resolve `path` relative to `root` and verify it does not escape `root`
/// and is not a symlink. `path` need not exist yet; only its parent
/// directory must.
fn resolve_contained(root: &Path, path: &Path) -> Result<PathBuf, PathSafetyError> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return Err(PathSafetyError::SymlinkRejected(path.display().to_string()));
        }
    }
    let root_canonical = root
        .canonicalize()
        .map_err(|e| PathSafetyError::Escapes(format!("{}: {e}", root.display())))?;
    let parent = path.parent().unwrap_or(root);
    let parent_canonical = parent
        .canonicalize()
        .map_err(|e| PathSafetyError::Escapes(format!("{}: {e}", parent.display())))?;
    if !parent_canonical.starts_with(&root_canonical) {
        return Err(PathSafetyError::Escapes(path.display().to_string()));
    }
    Ok(parent_canonical.join(path.file_name().unwrap_or_default()))
}

/// Persists [`RecallBaseline`] snapshots as JSON under `storage_path`, with
/// atomic writes, symlink rejection, path containment, and SHA-256-sanitized
/// filenames. Previous baselines are archived under `history/`, pruned to
/// [`MAX_HISTORY_FILES`].
pub struct BaselineStore {
    storage_path: PathBuf,
}

impl BaselineStore {
    pub fn new(storage_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path)?;
        fs::create_dir_all(storage_path.join("history"))?;
        Ok(Self { storage_path })
    }

    fn baseline_path(&self, filter: Option<&str>) -> Result<PathBuf, PathSafetyError> {
        resolve_contained(&self.storage_path, &self.storage_path.join(baseline_filename(filter)))
    }

    /// Atomically write `baseline` as JSON: write to a uniquely-named temp
    /// file in the same directory with `create_new` (O_EXCL-equivalent),
    /// then `rename` into place. On any failure the temp file is removed.
    pub fn save(&self, filter: Option<&str>, baseline: &RecallBaseline) -> Result<(), PathSafetyError> {
        let target = self.baseline_path(filter)?;

        if target.exists() {
            self.archive_existing(&target)?;
        }

        let temp_name = format!(".{}.{}.tmp", baseline_filename(filter), uuid::Uuid::new_v4());
        let temp_path = self.storage_path.join(temp_name);

        let write_result = (|| -> std::io::Result<()> {
            let json = serde_json::to_vec_pretty(baseline)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            use std::io::Write;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&temp_path, &target)?;
            Ok(())
        })();

        if write_result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        write_result.map_err(|e| PathSafetyError::Escapes(format!("write failed: {e}")))
    }

    /// Move the current baseline into `history/`, pruning to
    /// [`MAX_HISTORY_FILES`] (oldest removed first by filename ordering,
    /// which embeds a timestamp).
    fn archive_existing(&self, target: &Path) -> Result<(), PathSafetyError> {
        let history_dir = self.storage_path.join("history");
        let stamped = format!(
            "{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.f"),
            target.file_name().and_then(|n| n.to_str()).unwrap_or("baseline.json")
        );
        let archived = resolve_contained(&self.storage_path, &history_dir.join(stamped))?;
        fs::rename(target, &archived).map_err(|e| PathSafetyError::Escapes(e.to_string()))?;

        let mut entries: Vec<PathBuf> = fs::read_dir(&history_dir)
            .map_err(|e| PathSafetyError::Escapes(e.to_string()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        if entries.len() > MAX_HISTORY_FILES {
            for old in &entries[..entries.len() - MAX_HISTORY_FILES] {
                let _ = fs::remove_file(old);
            }
        }
        Ok(())
    }

    pub fn load(&self, filter: Option<&str>) -> Result<Option<RecallBaseline>, PathSafetyError> {
        let path = self.baseline_path(filter)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| PathSafetyError::Escapes(e.to_string()))?;
        let baseline = serde_json::from_slice(&bytes).map_err(|e| PathSafetyError::Escapes(e.to_string()))?;
        Ok(Some(baseline))
    }
}

/// Exact-match overlap between two ranked id lists, ignoring order:
/// `Recall@k = |brute_force_topk ∩ ann_topk| / k`.
pub fn recall_at_k<T: Eq + std::hash::Hash + Copy>(ground_truth: &[T], candidate: &[T], k: usize) -> f32 {
    if k == 0 {
        return 1.0;
    }
    let truth: HashSet<T> = ground_truth.iter().take(k).copied().collect();
    let hit = candidate.iter().take(k).filter(|id| truth.contains(id)).count();
    hit as f32 / k as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallVerdict {
    pub recall_at_k: f32,
    pub below_absolute: bool,
    pub drifted_from_baseline: bool,
}

impl RecallVerdict {
    pub fn should_reindex(&self) -> bool {
        self.below_absolute || self.drifted_from_baseline
    }
}

/// Measures Recall@k for an ANN search against the [`BruteForceSearcher`]
/// ground truth and flags drift relative to a stored baseline.
pub struct RecallHealthMonitor {
    thresholds: RecallThresholds,
}

impl RecallHealthMonitor {
    pub fn new(thresholds: RecallThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate one query: `ann_results` are the ids an ANN index returned;
    /// `brute_force` and `query_embedding` produce the ground truth.
    pub fn evaluate(
        &self,
        brute_force: &BruteForceSearcher,
        query_embedding: &[f32],
        ann_results: &[memory_core::MemoryId],
        k: usize,
        baseline: Option<&RecallBaseline>,
    ) -> RecallVerdict {
        let ground_truth: Vec<memory_core::MemoryId> = brute_force
            .search(query_embedding, k)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let recall = recall_at_k(&ground_truth, ann_results, k);
        let below_absolute = recall < self.thresholds.absolute;
        let drifted = baseline
            .map(|b| (b.recall_at_k - recall) > self.thresholds.drift)
            .unwrap_or(false);

        RecallVerdict {
            recall_at_k: recall,
            below_absolute,
            drifted_from_baseline: drifted,
        }
    }
}

/// Tracks embedding model identity to decide when a reindex is mandatory.
/// Thin wrapper over [`EmbeddingVersion::requires_reindex`] that also
/// derives the version hash so callers don't hand-roll it inconsistently.
pub struct EmbeddingVersionTracker;

impl EmbeddingVersionTracker {
    /// SHA-256 over `{model_id}:{dimension}:{sorted relevant config keys}`.
    pub fn compute_hash(model_id: &str, dimension: usize, relevant_config_keys: &[(&str, &str)]) -> String {
        let mut sorted = relevant_config_keys.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(dimension.to_le_bytes());
        for (k, v) in sorted {
            hasher.update(k.as_bytes());
            hasher.update(v.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn build(
        model_id: impl Into<String>,
        dimension: usize,
        relevant_config_keys: &[(&str, &str)],
        created_at: Timestamp,
    ) -> EmbeddingVersion {
        let model_id = model_id.into();
        let version_hash = Self::compute_hash(&model_id, dimension, relevant_config_keys);
        EmbeddingVersion {
            model_id,
            version_hash,
            dimension,
            created_at,
            config_snapshot: None,
        }
    }

    pub fn requires_reindex(stored: &EmbeddingVersion, current: &EmbeddingVersion) -> bool {
        EmbeddingVersion::requires_reindex(stored, current)
    }
}

/// Fires a reindex on recall-health breach, subject to a cooldown that can
/// be bypassed with `force`. Sync callbacks are offloaded to
/// `spawn_blocking` so they never stall the scheduler.
pub struct ReindexTrigger {
    cooldown: chrono::Duration,
    last_triggered: parking_lot::Mutex<Option<Timestamp>>,
}

impl ReindexTrigger {
    pub fn new(cooldown_hours: i64) -> Self {
        Self {
            cooldown: chrono::Duration::hours(cooldown_hours),
            last_triggered: parking_lot::Mutex::new(None),
        }
    }

    fn in_cooldown(&self) -> bool {
        match *self.last_triggered.lock() {
            None => false,
            Some(last) => chrono::Utc::now() - last < self.cooldown,
        }
    }

    /// Evaluate `verdict` and, if it calls for a reindex (or `force` is
    /// set), run `reindex_callback` on the blocking pool and record the
    /// trigger time. Returns `true` if a reindex ran.
    pub async fn maybe_trigger<F>(&self, verdict: RecallVerdict, force: bool, reindex_callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !verdict.should_reindex() && !force {
            return false;
        }
        if !force && self.in_cooldown() {
            warn!("reindex suppressed by cooldown despite recall breach");
            return false;
        }

        warn!(recall = verdict.recall_at_k, "recall health breach, triggering reindex");
        let _ = tokio::task::spawn_blocking(reindex_callback).await;
        *self.last_triggered.lock() = Some(chrono::Utc::now());
        info!("reindex complete");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::MemoryId;

    #[test]
    fn filename_sanitization_never_stores_raw_name() {
        let name = sanitize_filter_name("user-123-pii-email@example.com");
        assert_eq!(name.len(), 16);
        assert!(!name.contains("pii"));
        assert!(!name.contains('@'));
    }

    #[test]
    fn recall_at_k_counts_overlap() {
        let ids: Vec<MemoryId> = (0..5).map(|_| MemoryId::now_v7()).collect();
        let truth = vec![ids[0], ids[1], ids[2]];
        let candidate = vec![ids[0], ids[3], ids[2]];
        let recall = recall_at_k(&truth, &candidate, 3);
        assert!((recall - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn recall_verdict_flags_below_absolute() {
        let monitor_thresholds = RecallThresholds {
            absolute: 0.90,
            drift: 0.05,
            cooldown_hours: 24,
        };
        let _ = monitor_thresholds;
        let verdict = RecallVerdict {
            recall_at_k: 0.80,
            below_absolute: true,
            drifted_from_baseline: false,
        };
        assert!(verdict.should_reindex());
    }

    #[test]
    fn baseline_store_round_trips_and_is_path_safe() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let baseline = RecallBaseline {
            recall_at_k: 0.95,
            k: 10,
            query_count: 100,
            embedding_model: "test-model".into(),
            embedding_version: "v1".into(),
            created_at: chrono::Utc::now(),
            corpus_size: 1000,
            filtered: false,
            filter_description: None,
        };
        store.save(None, &baseline).unwrap();
        let loaded = store.load(None).unwrap().unwrap();
        assert_eq!(loaded.recall_at_k, 0.95);
    }

    #[test]
    fn baseline_store_archives_previous_on_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path()).unwrap();
        let mut baseline = RecallBaseline {
            recall_at_k: 0.95,
            k: 10,
            query_count: 100,
            embedding_model: "test-model".into(),
            embedding_version: "v1".into(),
            created_at: chrono::Utc::now(),
            corpus_size: 1000,
            filtered: false,
            filter_description: None,
        };
        store.save(None, &baseline).unwrap();
        baseline.recall_at_k = 0.80;
        store.save(None, &baseline).unwrap();

        let history_dir = dir.path().join("history");
        let count = fs::read_dir(&history_dir).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn path_containment_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let escape_attempt = dir.path().join("../../etc/passwd");
        let result = resolve_contained(dir.path(), &escape_attempt);
        assert!(result.is_err());
    }

    #[test]
    fn embedding_version_tracker_detects_dimension_change() {
        let stored = EmbeddingVersionTracker::build("model-a", 768, &[], chrono::Utc::now());
        let current = EmbeddingVersionTracker::build("model-a", 1536, &[], chrono::Utc::now());
        assert!(EmbeddingVersionTracker::requires_reindex(&stored, &current));
    }

    #[tokio::test]
    async fn reindex_trigger_respects_cooldown_unless_forced() {
        let trigger = ReindexTrigger::new(24);
        let verdict = RecallVerdict {
            recall_at_k: 0.5,
            below_absolute: true,
            drifted_from_baseline: false,
        };
        assert!(trigger.maybe_trigger(verdict, false, || {}).await);
        assert!(!trigger.maybe_trigger(verdict, false, || {}).await);
        assert!(trigger.maybe_trigger(verdict, true, || {}).await);
    }
}
