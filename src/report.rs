//! Batch outcome reporting.

use crate::error::Result;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Outcome of one item in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineResult {
    /// At least one stage ran and notes were produced.
    Completed,
    /// Every artifact was already fresh.
    SkippedAlreadyDone,
    /// A stage failed; later stages did not run.
    FailedAtStage { stage: Stage, error: String },
    /// Not finished because the batch was cancelled or aborted by fail-fast.
    Cancelled,
}

impl PipelineResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineResult::FailedAtStage { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Completed | PipelineResult::SkippedAlreadyDone)
    }
}

/// Per-item entry in a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub key: String,
    pub source: PathBuf,
    pub result: PipelineResult,
    /// Notes path when the item succeeded.
    pub notes: Option<PathBuf>,
    /// Stages that ran in this run.
    pub stages_run: Vec<Stage>,
    pub elapsed_ms: u64,
}

/// Summary of one batch run, one entry per work item in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.count(|r| matches!(r, PipelineResult::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, PipelineResult::SkippedAlreadyDone))
    }

    pub fn failed(&self) -> usize {
        self.count(PipelineResult::is_failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|r| matches!(r, PipelineResult::Cancelled))
    }

    fn count(&self, pred: impl Fn(&PipelineResult) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.result)).count()
    }

    /// Failed items with their failing stage and first error.
    pub fn failures(&self) -> impl Iterator<Item = (&str, Stage, &str)> {
        self.items.iter().filter_map(|i| match &i.result {
            PipelineResult::FailedAtStage { stage, error } => {
                Some((i.key.as_str(), *stage, error.as_str()))
            }
            _ => None,
        })
    }

    /// Look up an item's entry by key.
    pub fn get(&self, key: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.key == key)
    }

    /// True when every item completed or was skipped.
    pub fn is_success(&self) -> bool {
        self.items.iter().all(|i| i.result.is_success())
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, result: PipelineResult) -> ItemReport {
        ItemReport {
            key: key.to_string(),
            source: PathBuf::from(format!("{}.mp4", key)),
            result,
            notes: None,
            stages_run: Vec::new(),
            elapsed_ms: 0,
        }
    }

    fn report(items: Vec<ItemReport>) -> BatchReport {
        BatchReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            items,
        }
    }

    #[test]
    fn test_counts_and_exit_code() {
        let r = report(vec![
            item("a", PipelineResult::Completed),
            item("b", PipelineResult::SkippedAlreadyDone),
            item(
                "c",
                PipelineResult::FailedAtStage {
                    stage: Stage::Transcribe,
                    error: "no speech".into(),
                },
            ),
        ]);

        assert_eq!((r.completed(), r.skipped(), r.failed(), r.cancelled()), (1, 1, 1, 0));
        assert_eq!(r.exit_code(), 1);
        let failures: Vec<_> = r.failures().collect();
        assert_eq!(failures, [("c", Stage::Transcribe, "no speech")]);
    }

    #[test]
    fn test_success_exit_code() {
        let r = report(vec![
            item("a", PipelineResult::Completed),
            item("b", PipelineResult::SkippedAlreadyDone),
        ]);
        assert!(r.is_success());
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn test_cancelled_is_not_success() {
        let r = report(vec![item("a", PipelineResult::Cancelled)]);
        assert_eq!(r.exit_code(), 1);
    }

    #[test]
    fn test_json_shape() {
        let r = report(vec![item(
            "lec2",
            PipelineResult::FailedAtStage {
                stage: Stage::Summarize,
                error: "rate limited".into(),
            },
        )]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["items"][0]["result"]["outcome"], "failed_at_stage");
        assert_eq!(json["items"][0]["result"]["stage"], "summarize");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        r.write_json(&path).unwrap();
        assert!(path.exists());
    }
}
