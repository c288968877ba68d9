use crate::errors::CliError;
use camino::Utf8Path;
use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use overlay_engine::{digest_with, FingerprintAlgorithm};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlgorithmArg {
    #[default]
    Sha256,
    Xxh3,
}

impl From<AlgorithmArg> for FingerprintAlgorithm {
    fn from(algorithm: AlgorithmArg) -> Self {
        match algorithm {
            AlgorithmArg::Sha256 => FingerprintAlgorithm::Sha256,
            AlgorithmArg::Xxh3 => FingerprintAlgorithm::Xxh3,
        }
    }
}

pub struct DigestArgs {
    pub file: String,
    pub algorithm: AlgorithmArg,
}

/// Print `<fingerprint>  <file>`, like `sha256sum`.
pub fn digest_file(args: DigestArgs) -> Result<()> {
    let path = Utf8Path::new(&args.file);
    if !path.is_file() {
        return Err(CliError::file_not_found(path).into());
    }
    let bytes = std::fs::read(path.as_std_path()).into_diagnostic()?;
    println!("{}  {}", digest_with(args.algorithm.into(), &bytes), path);
    Ok(())
}
