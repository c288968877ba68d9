use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(config::not_found),
        help("Create an overlay.toml file or pass its location with --config")
    )]
    ConfigNotFound { path: Utf8PathBuf },

    #[error("Configuration file error")]
    #[diagnostic(
        code(config::parse_error),
        help("Check overlay.toml for syntax errors and unknown artifact kinds")
    )]
    ConfigParseError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown artifact: {name}")]
    #[diagnostic(
        code(artifact::unknown),
        help("Known artifacts: {known}")
    )]
    UnknownArtifact { name: String, known: String },

    #[error("No [installer] section in the configuration")]
    #[diagnostic(
        code(installer::not_configured),
        help("Add an [installer] table with game_exe, verify_file and known_hashes_url")
    )]
    InstallerNotConfigured,

    #[error("Could not locate {game_exe} in any Steam library")]
    #[diagnostic(
        code(installer::game_not_found),
        help("Pass the folder explicitly with --game-dir")
    )]
    GameFolderNotFound { game_exe: String },

    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },
}

impl CliError {
    pub fn config_parse_error(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ConfigParseError {
            source: Box::new(source),
        }
    }

    pub fn unknown_artifact<'a>(name: &str, known: impl IntoIterator<Item = &'a str>) -> Self {
        Self::UnknownArtifact {
            name: name.to_string(),
            known: known.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    pub fn file_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
