use crate::errors::CliError;
use crate::println_pad;
use crate::utils::colored_state;
use crate::utils::config::ToolConfig;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use overlay_engine::{
    EngineConfig, FileHostSource, HttpFetcher, OverlayEngine, ProgressCallback, SyncProgress,
    SyncReport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct SyncArgs {
    pub artifact: Option<String>,
    pub host_dir: String,
    pub timeout_secs: u64,
}

/// Engine config restricted to `artifact`, when one is given.
pub fn select_artifact(config: &EngineConfig, artifact: Option<&str>) -> Result<EngineConfig> {
    let mut selected = config.clone();
    if let Some(name) = artifact {
        if !config.artifacts.iter().any(|a| a.name == name) {
            return Err(CliError::unknown_artifact(
                name,
                config.artifacts.iter().map(|a| a.name.as_str()),
            )
            .into());
        }
        selected.artifacts.retain(|a| a.name == name);
    }
    Ok(selected)
}

pub fn start_engine(
    config: &EngineConfig,
    host_dir: &str,
    progress: Option<ProgressCallback>,
) -> Result<OverlayEngine> {
    let fetcher = HttpFetcher::new(&config.user_agent).into_diagnostic()?;
    OverlayEngine::start(
        config,
        Arc::new(fetcher),
        Arc::new(FileHostSource::new(Utf8PathBuf::from(host_dir))),
        progress,
    )
    .into_diagnostic()
}

pub fn sync_artifacts(config: &ToolConfig, args: SyncArgs) -> Result<()> {
    let engine_config = select_artifact(&config.engine, args.artifact.as_deref())?;

    let progress: ProgressCallback = Arc::new(|p: SyncProgress| {
        println_pad!("{} {} {}", p.artifact.bright_cyan(), "→".dimmed(), colored_state(p.stage));
    });
    let engine = start_engine(&engine_config, &args.host_dir, Some(progress))?;

    if !engine.wait_until_settled(Duration::from_secs(args.timeout_secs)) {
        warn!(
            "Artifacts still syncing after {}s; the gate keeps passing through until they are ready",
            args.timeout_secs
        );
        for descriptor in engine.descriptors() {
            if let Some(state) = engine.state(descriptor.name()) {
                println_pad!("{}: {}", descriptor.name().bright_cyan(), colored_state(state));
            }
        }
        return Ok(());
    }

    println!();
    for report in engine.join() {
        let history = engine.history(&report.artifact).unwrap_or_default();
        print_report(&report, &history);
    }
    Ok(())
}

fn print_report(report: &SyncReport, history: &[overlay_engine::ReadinessState]) {
    let path = history
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" → ");

    let mut lines = vec![
        format!("{} {}", "Artifact:".bold(), report.artifact.bright_cyan().bold()),
        format!("{} {}", "State:".bold(), colored_state(report.outcome)),
        format!("{} {}", "History:".bold(), path.dimmed()),
        format!(
            "{} {}",
            "Marker:".bold(),
            report.marker.as_deref().unwrap_or("-")
        ),
        format!(
            "{} {}  {} {}",
            "Payload fetched:".bold(),
            report.payload_fetched,
            "Original exported:".bold(),
            report.original_exported
        ),
    ];
    if let Some(merge) = &report.merge {
        lines.push(format!(
            "{} {}/{} entries, {} fields overridden, {} unmatched",
            "Merge:".bold(),
            merge.matched_entries,
            merge.original_entries,
            merge.overridden_fields,
            merge.unmatched_patch_keys.len()
        ));
    }
    if let Some(reason) = &report.patch_rejected {
        lines.push(format!("{} {}", "Patch rejected:".bright_yellow(), reason));
    }
    if let Some(reason) = &report.kept_local {
        lines.push(format!("{} {}", "Kept cached version:".bright_yellow(), reason));
    }
    if let Some(error) = &report.error {
        lines.push(format!("{} {}", "Error:".bright_red(), error));
    }
    lines.push(format!("{} {:.2?}", "Elapsed:".bold(), report.elapsed));

    crate::utils::print_ansi_boxed_lines(&lines);
}
