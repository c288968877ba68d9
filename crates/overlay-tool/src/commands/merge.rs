use crate::errors::CliError;
use crate::println_pad;
use camino::Utf8Path;
use clap::ValueEnum;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use overlay_engine::{codec_for, merge_with_report, write_atomic, ArtifactKind, MergeReport};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    DialogueDatabase,
    TextTable,
    TextMap,
    Document,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::DialogueDatabase => ArtifactKind::DialogueDatabase,
            KindArg::TextTable => ArtifactKind::TextTable,
            KindArg::TextMap => ArtifactKind::TextMap,
            KindArg::Document => ArtifactKind::Document,
        }
    }
}

pub struct MergeArgs {
    pub kind: KindArg,
    pub original: String,
    pub patch: String,
    pub output: String,
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    let path = Utf8Path::new(path);
    if !path.is_file() {
        return Err(CliError::file_not_found(path).into());
    }
    std::fs::read(path.as_std_path()).into_diagnostic()
}

/// Merge `patch` onto `original` in their host-native layout. Returns the
/// rendered output and what the merge did.
pub fn merge_documents(
    kind: ArtifactKind,
    original: &[u8],
    patch: &[u8],
) -> overlay_engine::Result<(Vec<u8>, MergeReport)> {
    let codec = codec_for(kind);
    let original_doc = codec.decode_original("original", original)?;
    let patch_doc = codec.decode_patch("patch", patch)?;
    let (merged, report) = merge_with_report(&original_doc, &patch_doc);
    let rendered = codec.encode("original", original, &merged)?;
    Ok((rendered, report))
}

pub fn merge_files(args: MergeArgs) -> Result<()> {
    let original = read_input(&args.original)?;
    let patch = read_input(&args.patch)?;

    let (rendered, report) =
        merge_documents(args.kind.into(), &original, &patch).into_diagnostic()?;
    write_atomic(Utf8Path::new(&args.output), &rendered).into_diagnostic()?;

    println_pad!(
        "{} {} {} {}",
        "Merged".bright_green().bold(),
        format!("{}/{}", report.matched_entries, report.original_entries).bright_white(),
        "entries into".bright_green(),
        args.output.bright_cyan()
    );
    println_pad!(
        "{} {}  {} {}",
        "Fields overridden:".bold(),
        report.overridden_fields,
        "Empty patch values kept original:".bold(),
        report.empty_patch_fields
    );
    if !report.unmatched_patch_keys.is_empty() {
        println_pad!(
            "{} {}",
            "Ignored patch keys:".bright_yellow(),
            report.unmatched_patch_keys.join(", ")
        );
    }
    Ok(())
}
