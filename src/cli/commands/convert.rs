//! Convert command implementation.

use crate::artifact::ArtifactStore;
use crate::cli::preflight;
use crate::cli::{Cli, Output};
use crate::config::{Prompts, Settings};
use crate::discovery::discover;
use crate::orchestrator::PipelineController;
use crate::stage::StageRunners;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Run the convert command. Returns the process exit code.
pub async fn run_convert(cli: &Cli, settings: Settings, cancel: CancellationToken) -> Result<i32> {
    let items = discover(&cli.input)?;

    if cli.dry_run {
        let store = ArtifactStore::new(settings.output_dir(), settings.pipeline.staleness);
        Output::header(&format!("Plan for {} video(s)", items.len()));
        Output::kv("Output", &store.root().display().to_string());
        for (item, artifacts) in store.plan(&items)? {
            Output::plan_item(item.key(), &artifacts);
        }
        return Ok(0);
    }

    // Pre-flight checks; main reports the error
    let api_key = preflight::check(&settings)?;

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let runners = StageRunners::from_settings(&settings, &prompts, api_key)?;

    Output::info(&format!(
        "Processing {} video(s) into {}",
        items.len(),
        settings.output_dir().display()
    ));
    Output::kv("Whisper", &format!(
        "{} on {}",
        settings.transcription.model, settings.transcription.device
    ));
    Output::kv("Notes model", &settings.generation.model);

    let pb = Output::progress_bar(items.len() as u64, "videos");
    let controller = PipelineController::new(&settings, runners)
        .force(cli.force)
        .with_progress(pb.clone());

    let report = controller.run(&items, &cancel).await?;
    pb.finish_and_clear();

    Output::batch_summary(&report);

    if let Some(path) = &cli.report {
        report.write_json(path)?;
        Output::info(&format!("Report written to {}", path.display()));
    }

    if cancel.is_cancelled() {
        Output::warning("Interrupted; finished stages are kept and will be reused.");
    }

    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VidnotesError;
    use clap::Parser;

    #[tokio::test]
    async fn test_discovery_error_is_returned_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        let cli = Cli::parse_from(["vidnotes", missing.to_str().unwrap()]);

        let err = run_convert(&cli, Settings::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VidnotesError>(),
            Some(VidnotesError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_is_returned_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("lec1.mp4");
        std::fs::write(&video, b"video").unwrap();
        let cli = Cli::parse_from(["vidnotes", video.to_str().unwrap()]);

        let mut settings = Settings::default();
        settings.generation.api_key_env = "VIDNOTES_CONVERT_UNSET_KEY".into();
        settings.general.output_dir = dir.path().join("out").to_string_lossy().to_string();

        let err = run_convert(&cli, settings, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VidnotesError>(),
            Some(VidnotesError::CredentialMissing(_))
        ));
        assert!(!dir.path().join("out").exists());
    }
}
