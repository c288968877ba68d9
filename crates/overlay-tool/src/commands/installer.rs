use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::ToolConfig;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use overlay_engine::HttpFetcher;
use overlay_installer::{
    detect_game_folder, DownloadProgress, InstallStatus, InstallerConfig, InstallerSession,
    InstallerView,
};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerAction {
    Check,
    Install,
    Uninstall,
    Report,
}

pub struct InstallerArgs {
    pub action: InstallerAction,
    pub game_dir: Option<String>,
}

fn resolve_game_dir(config: &InstallerConfig, game_dir: Option<String>) -> Result<Utf8PathBuf> {
    if let Some(dir) = game_dir {
        return Ok(Utf8PathBuf::from(dir));
    }
    let detected = detect_game_folder(&config.game_exe).ok_or_else(|| {
        CliError::GameFolderNotFound {
            game_exe: config.game_exe.clone(),
        }
    })?;
    println_pad!("{} {}", "Detected game folder:".bold(), detected.as_str().bright_cyan());
    Ok(detected)
}

fn print_view(view: &InstallerView) {
    let line = view.status_line();
    let line = match view.status {
        InstallStatus::Installed => line.bright_green().bold(),
        InstallStatus::NotInstalled => line.bright_cyan().bold(),
        InstallStatus::UnknownVersion => line.bright_yellow().bold(),
        InstallStatus::Unchecked => line.dimmed(),
    };
    println_pad!("{}", line);
    if let Some(hash) = &view.file_hash {
        println_pad!("{} {}", "SHA256:".bold(), hash.dimmed());
    }
}

/// Prints at each new 10% step on one line.
fn progress_printer() -> impl FnMut(DownloadProgress) {
    let mut last_step = None;
    move |progress: DownloadProgress| {
        let Some(percent) = progress.percent() else {
            return;
        };
        let step = percent / 10;
        if last_step != Some(step) {
            last_step = Some(step);
            print!("\r    {} {:>3}%", "Downloading".bright_blue(), percent);
            let _ = std::io::stdout().flush();
            if percent == 100 {
                println!();
            }
        }
    }
}

pub fn run_installer(config: &ToolConfig, args: InstallerArgs) -> Result<()> {
    let installer = config.installer()?.clone();
    let game_dir = resolve_game_dir(&installer, args.game_dir)?;
    let mut session = InstallerSession::new(installer, game_dir).into_diagnostic()?;

    if args.action == InstallerAction::Uninstall {
        let summary = session.uninstall().into_diagnostic()?;
        println_pad!(
            "{} ({} restored, {} removed)",
            "Patch uninstalled".bright_green().bold(),
            summary.restored,
            summary.removed
        );
        return Ok(());
    }

    let fetcher = HttpFetcher::new(&session.config().user_agent).into_diagnostic()?;
    let view = session.check_online(&fetcher).into_diagnostic()?;
    print_view(&view);

    match args.action {
        InstallerAction::Check | InstallerAction::Uninstall => {}
        InstallerAction::Install => {
            let mut progress = progress_printer();
            let summary = session.install(&mut progress).into_diagnostic()?;
            println_pad!(
                "{} ({} backed up, {} extracted)",
                "Patch installed".bright_green().bold(),
                summary.backed_up,
                summary.extracted
            );
        }
        InstallerAction::Report => {
            let report = session.send_report().into_diagnostic()?;
            println_pad!("{}", "Report sent".bright_green().bold());
            println_pad!("{}", report.message().dimmed());
        }
    }
    Ok(())
}

pub fn detect_game(config: &ToolConfig) -> Result<()> {
    let installer = config.installer()?;
    let dir = resolve_game_dir(installer, None)?;
    println!("{}", dir);
    Ok(())
}
