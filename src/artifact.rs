//! Staged artifact management.
//!
//! Maps work items to their on-disk artifacts:
//!
//! ```text
//! <output_root>/
//!   audio/<item-key>.mp3
//!   transcriptions/<item-key>.txt
//!   notes/<item-key>.md
//!   .records/<item-key>.json
//! ```
//!
//! Stages write into a hidden staging file next to the final path and are
//! committed by rename, so a half-written artifact is never visible under
//! its final name.

use crate::config::StalenessPolicy;
use crate::discovery::WorkItem;
use crate::error::Result;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const RECORDS_DIR: &str = ".records";

/// Artifact classification driving skip/resume decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Missing,
    Stale,
    Fresh,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::Missing => write!(f, "missing"),
            ArtifactStatus::Stale => write!(f, "stale"),
            ArtifactStatus::Fresh => write!(f, "fresh"),
        }
    }
}

/// A stage artifact of one item, as seen by the store.
#[derive(Debug, Clone, Serialize)]
pub struct StageArtifact {
    pub stage: Stage,
    pub key: String,
    pub path: PathBuf,
    pub status: ArtifactStatus,
}

/// What was recorded when a stage committed its artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub path: PathBuf,
    pub recorded_at: DateTime<Utc>,
    /// Modification time of the stage input when the artifact was recorded.
    pub input_modified: Option<DateTime<Utc>>,
}

/// Persisted records of one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemRecord {
    pub key: String,
    pub stages: BTreeMap<Stage, StageRecord>,
}

/// An artifact being produced; removed on drop unless committed.
#[derive(Debug)]
pub struct StagedArtifact {
    temp: TempPath,
    target: PathBuf,
}

impl StagedArtifact {
    /// Where the stage should write.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Final path the artifact will be committed to.
    pub fn target(&self) -> &Path {
        &self.target
    }
}

/// Owner of artifact paths, status and records under one output root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    policy: StalenessPolicy,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, policy: StalenessPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Create the stage directories.
    pub fn ensure_layout(&self) -> Result<()> {
        for stage in Stage::ALL {
            std::fs::create_dir_all(self.root.join(stage.dir_name()))?;
        }
        std::fs::create_dir_all(self.root.join(RECORDS_DIR))?;
        Ok(())
    }

    /// Expected artifact path of an item at a stage.
    pub fn path_for(&self, key: &str, stage: Stage) -> PathBuf {
        self.root
            .join(stage.dir_name())
            .join(format!("{}.{}", key, stage.extension()))
    }

    /// Path a stage reads from: the source video, or the previous stage's artifact.
    pub fn input_for(&self, item: &WorkItem, stage: Stage) -> PathBuf {
        match stage.previous() {
            None => item.source().to_path_buf(),
            Some(prev) => self.path_for(item.key(), prev),
        }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(RECORDS_DIR).join(format!("{}.json", key))
    }

    /// Classify an item's artifact at a stage.
    ///
    /// An artifact whose input is gone is never fresh. Under the mtime
    /// policy, a recorded artifact is fresh while its input's modification
    /// time equals the one recorded at production; an unrecorded artifact is
    /// fresh when it is at least as new as its input.
    pub fn status(&self, item: &WorkItem, stage: Stage) -> Result<ArtifactStatus> {
        let output = self.path_for(item.key(), stage);
        let Some(output_meta) = metadata_if_exists(&output)? else {
            return Ok(ArtifactStatus::Missing);
        };

        let Some(input_meta) = metadata_if_exists(&self.input_for(item, stage))? else {
            return Ok(ArtifactStatus::Stale);
        };

        if self.policy == StalenessPolicy::Existence {
            return Ok(ArtifactStatus::Fresh);
        }

        let input_modified = input_meta.modified()?;
        let record = self.load_record(item.key())?;

        let fresh = match record.stages.get(&stage) {
            Some(recorded) => recorded.input_modified == Some(DateTime::<Utc>::from(input_modified)),
            None => output_meta.modified()? >= input_modified,
        };

        Ok(if fresh {
            ArtifactStatus::Fresh
        } else {
            ArtifactStatus::Stale
        })
    }

    /// Full artifact view of an item at a stage.
    pub fn artifact(&self, item: &WorkItem, stage: Stage) -> Result<StageArtifact> {
        Ok(StageArtifact {
            stage,
            key: item.key().to_string(),
            path: self.path_for(item.key(), stage),
            status: self.status(item, stage)?,
        })
    }

    /// Status of all three artifacts of each item, without running anything.
    pub fn plan(&self, items: &[WorkItem]) -> Result<Vec<(WorkItem, Vec<StageArtifact>)>> {
        items
            .iter()
            .map(|item| {
                let artifacts = Stage::ALL
                    .iter()
                    .map(|stage| self.artifact(item, *stage))
                    .collect::<Result<Vec<_>>>()?;
                Ok((item.clone(), artifacts))
            })
            .collect()
    }

    /// Reserve a staging file next to the final artifact path.
    pub fn stage(&self, key: &str, stage: Stage) -> Result<StagedArtifact> {
        let target = self.path_for(key, stage);
        let dir = self.root.join(stage.dir_name());
        std::fs::create_dir_all(&dir)?;

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", key))
            .suffix(&format!(".{}", stage.extension()))
            .tempfile_in(&dir)?
            .into_temp_path();

        Ok(StagedArtifact { temp, target })
    }

    /// Move a staged artifact onto its final path.
    pub fn commit(&self, staged: StagedArtifact) -> Result<PathBuf> {
        let StagedArtifact { temp, target } = staged;
        temp.persist(&target).map_err(|e| e.error)?;
        debug!("Committed {:?}", target);
        Ok(target)
    }

    /// Mark an artifact fresh after its stage succeeded.
    pub fn record(&self, item: &WorkItem, stage: Stage, path: &Path) -> Result<()> {
        let input_modified = metadata_if_exists(&self.input_for(item, stage))?
            .map(|m| m.modified())
            .transpose()?
            .map(DateTime::<Utc>::from);

        let mut record = self.load_record(item.key())?;
        record.key = item.key().to_string();
        record.stages.insert(
            stage,
            StageRecord {
                path: path.to_path_buf(),
                recorded_at: Utc::now(),
                input_modified,
            },
        );

        self.write_record(&record)
    }

    /// Load the persisted record of an item (empty if none).
    pub fn load_record(&self, key: &str) -> Result<ItemRecord> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(ItemRecord {
                key: key.to_string(),
                ..Default::default()
            });
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!("Ignoring unreadable record {:?}: {}", path, e);
                Ok(ItemRecord {
                    key: key.to_string(),
                    ..Default::default()
                })
            }
        }
    }

    fn write_record(&self, record: &ItemRecord) -> Result<()> {
        let dir = self.root.join(RECORDS_DIR);
        std::fs::create_dir_all(&dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", record.key))
            .suffix(".json")
            .tempfile_in(&dir)?;
        serde_json::to_writer_pretty(temp.as_file_mut(), record)?;
        temp.persist(self.record_path(&record.key))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

fn metadata_if_exists(path: &Path) -> Result<Option<Metadata>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::FileTimes;
    use std::time::{Duration, SystemTime};

    fn setup(policy: StalenessPolicy) -> (tempfile::TempDir, ArtifactStore, WorkItem) {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("lec1.mp4");
        std::fs::write(&video, b"video").unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), policy);
        store.ensure_layout().unwrap();
        (dir, store, WorkItem::new(video).unwrap())
    }

    fn produce(store: &ArtifactStore, item: &WorkItem, stage: Stage) -> PathBuf {
        let staged = store.stage(item.key(), stage).unwrap();
        std::fs::write(staged.path(), stage.to_string()).unwrap();
        let path = store.commit(staged).unwrap();
        store.record(item, stage, &path).unwrap();
        path
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_modified(time)).unwrap();
    }

    #[test]
    fn test_path_layout() {
        let store = ArtifactStore::new("/data/out", StalenessPolicy::Mtime);
        assert_eq!(store.path_for("lec1", Stage::Extract), PathBuf::from("/data/out/audio/lec1.mp3"));
        assert_eq!(
            store.path_for("lec1", Stage::Transcribe),
            PathBuf::from("/data/out/transcriptions/lec1.txt")
        );
        assert_eq!(store.path_for("lec1", Stage::Summarize), PathBuf::from("/data/out/notes/lec1.md"));
        assert_ne!(store.path_for("lec1", Stage::Summarize), store.path_for("lec2", Stage::Summarize));
    }

    #[test]
    fn test_plan_covers_every_stage() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        produce(&store, &item, Stage::Extract);

        let plan = store.plan(std::slice::from_ref(&item)).unwrap();
        let statuses: Vec<_> = plan[0].1.iter().map(|a| (a.stage, a.status)).collect();
        assert_eq!(
            statuses,
            [
                (Stage::Extract, ArtifactStatus::Fresh),
                (Stage::Transcribe, ArtifactStatus::Missing),
                (Stage::Summarize, ArtifactStatus::Missing),
            ]
        );
    }

    #[test]
    fn test_missing_then_fresh() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Missing);

        produce(&store, &item, Stage::Extract);
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Fresh);
        assert_eq!(store.status(&item, Stage::Transcribe).unwrap(), ArtifactStatus::Missing);
    }

    #[test]
    fn test_changed_input_makes_stale() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        produce(&store, &item, Stage::Extract);

        set_mtime(item.source(), SystemTime::now() + Duration::from_secs(60));
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Stale);
    }

    #[test]
    fn test_deleted_input_makes_stale() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        produce(&store, &item, Stage::Extract);
        let transcript = produce(&store, &item, Stage::Transcribe);
        assert!(transcript.exists());

        std::fs::remove_file(store.path_for(item.key(), Stage::Extract)).unwrap();
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Missing);
        assert_eq!(store.status(&item, Stage::Transcribe).unwrap(), ArtifactStatus::Stale);
    }

    #[test]
    fn test_unrecorded_artifact_uses_mtime_order() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        let audio = store.path_for(item.key(), Stage::Extract);
        std::fs::write(&audio, b"audio").unwrap();

        set_mtime(&audio, SystemTime::now() - Duration::from_secs(3600));
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Stale);

        set_mtime(&audio, SystemTime::now() + Duration::from_secs(3600));
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Fresh);
    }

    #[test]
    fn test_existence_policy_ignores_mtime() {
        let (_dir, store, item) = setup(StalenessPolicy::Existence);
        produce(&store, &item, Stage::Extract);

        set_mtime(item.source(), SystemTime::now() + Duration::from_secs(60));
        assert_eq!(store.status(&item, Stage::Extract).unwrap(), ArtifactStatus::Fresh);
    }

    #[test]
    fn test_dropped_staging_leaves_nothing() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        let staged = store.stage(item.key(), Stage::Summarize).unwrap();
        std::fs::write(staged.path(), "# partial").unwrap();
        assert_eq!(staged.target(), store.path_for(item.key(), Stage::Summarize));
        drop(staged);

        let notes_dir = store.root().join("notes");
        assert_eq!(std::fs::read_dir(notes_dir).unwrap().count(), 0);
        assert_eq!(store.status(&item, Stage::Summarize).unwrap(), ArtifactStatus::Missing);
    }

    #[test]
    fn test_record_round_trips_through_disk() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        let path = produce(&store, &item, Stage::Extract);

        let record = store.load_record(item.key()).unwrap();
        assert_eq!(record.key, "lec1");
        let extract = &record.stages[&Stage::Extract];
        assert_eq!(extract.path, path);
        assert!(extract.input_modified.is_some());
    }

    #[test]
    fn test_corrupt_record_is_ignored() {
        let (_dir, store, item) = setup(StalenessPolicy::Mtime);
        std::fs::write(store.record_path(item.key()), "{ not json").unwrap();
        assert!(store.load_record(item.key()).unwrap().stages.is_empty());
    }
}
