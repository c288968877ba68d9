use camino::Utf8Path;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    detect_game, digest_file, lookup_entry, merge_files, run_installer, sync_artifacts,
    AlgorithmArg, DigestArgs, InstallerAction, InstallerArgs, KindArg, LookupArgs, MergeArgs,
    SyncArgs,
};
use miette::Result;
use utils::config::{load_config, log_dir, ToolConfig};

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path to the tool config file
    #[arg(short, long, global = true, default_value = "overlay.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync every artifact (or one) and print what happened
    Sync {
        /// Only sync this artifact
        #[arg(short, long)]
        artifact: Option<String>,

        /// Directory holding the host's exported originals (<artifact>.json)
        #[arg(long, default_value = "host-export")]
        host_dir: String,

        /// Seconds to wait for artifacts to settle
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Sync one artifact, then query it like the host would
    Lookup {
        #[arg(short, long)]
        artifact: String,

        /// Entry key, e.g. a conversation title#id or an object path
        #[arg(short, long)]
        key: String,

        /// Only print this field
        #[arg(short, long)]
        field: Option<String>,

        #[arg(long, default_value = "host-export")]
        host_dir: String,

        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Merge a patch onto an original file offline
    Merge {
        #[arg(short, long, value_enum)]
        kind: KindArg,

        #[arg(long)]
        original: String,

        #[arg(short, long)]
        patch: String,

        #[arg(short, long)]
        output: String,
    },
    /// Print the fingerprint of a file
    Digest {
        file: String,

        #[arg(long, value_enum, default_value = "sha256")]
        algorithm: AlgorithmArg,
    },
    /// Install, uninstall or report the game patch
    Installer {
        #[command(subcommand)]
        command: InstallerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstallerCommands {
    /// Identify the game version
    Check {
        /// Game folder; detected from Steam when omitted
        #[arg(short, long)]
        game_dir: Option<String>,
    },
    /// Download and install the patch for the detected version
    Install {
        #[arg(short, long)]
        game_dir: Option<String>,
    },
    /// Restore the original game files
    Uninstall {
        #[arg(short, long)]
        game_dir: Option<String>,
    },
    /// Report an unknown game version
    Report {
        #[arg(short, long)]
        game_dir: Option<String>,
    },
    /// Locate the game folder in the Steam libraries
    Detect,
}

fn parse_args() -> Result<Args> {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).map_err(|e| miette::miette!("{}", e))
}

fn installer_args(command: InstallerCommands) -> Option<InstallerArgs> {
    let (action, game_dir) = match command {
        InstallerCommands::Check { game_dir } => (InstallerAction::Check, game_dir),
        InstallerCommands::Install { game_dir } => (InstallerAction::Install, game_dir),
        InstallerCommands::Uninstall { game_dir } => (InstallerAction::Uninstall, game_dir),
        InstallerCommands::Report { game_dir } => (InstallerAction::Report, game_dir),
        InstallerCommands::Detect => return None,
    };
    Some(InstallerArgs { action, game_dir })
}

fn main() -> Result<()> {
    let args = parse_args()?;

    match args.command {
        Commands::Merge {
            kind,
            original,
            patch,
            output,
        } => {
            let _log_guard = utils::logging::init_logging(None);
            merge_files(MergeArgs {
                kind,
                original,
                patch,
                output,
            })
        }
        Commands::Digest { file, algorithm } => {
            let _log_guard = utils::logging::init_logging(None);
            digest_file(DigestArgs { file, algorithm })
        }
        command => {
            let config = load_config(Utf8Path::new(&args.config))?;
            let _log_guard = utils::logging::init_logging(log_dir(&config.log).as_deref());
            run_with_config(&config, command)
        }
    }
}

fn run_with_config(config: &ToolConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Sync {
            artifact,
            host_dir,
            timeout,
        } => sync_artifacts(
            config,
            SyncArgs {
                artifact,
                host_dir,
                timeout_secs: timeout,
            },
        ),
        Commands::Lookup {
            artifact,
            key,
            field,
            host_dir,
            timeout,
        } => lookup_entry(
            config,
            LookupArgs {
                artifact,
                key,
                field,
                host_dir,
                timeout_secs: timeout,
            },
        ),
        Commands::Installer { command } => match installer_args(command) {
            Some(installer) => run_installer(config, installer),
            None => detect_game(config),
        },
        // Run before any config is loaded.
        Commands::Merge { .. } | Commands::Digest { .. } => Ok(()),
    }
}
