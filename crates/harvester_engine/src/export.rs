use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use harvest_logging::engine_info;
use harvester_core::{HarvestOutcome, Record};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::filename::manifest_filename;
use crate::pipeline::PipelineStats;
use crate::session::SessionOutput;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("output directory unusable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the document-export stage receives for one session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionManifest<'a> {
    board: Option<&'a str>,
    location: &'a str,
    harvested_utc: &'a str,
    outcome: HarvestOutcome,
    passes: u32,
    enrichment: PipelineStats,
    records: &'a [Record],
}

/// Writes `output` as pretty JSON into `dir` and returns the file path.
///
/// The file appears fully written or not at all; an existing manifest for the
/// same board is replaced.
pub fn write_session_manifest(
    dir: &Path,
    output: &SessionOutput,
    harvested_utc: &str,
) -> Result<PathBuf, ExportError> {
    let manifest = SessionManifest {
        board: output.board_label.as_deref(),
        location: &output.location,
        harvested_utc,
        outcome: output.outcome,
        passes: output.passes,
        enrichment: output.stats,
        records: &output.records,
    };
    let mut content = serde_json::to_vec_pretty(&manifest)?;
    content.push(b'\n');

    let filename = manifest_filename(output.board_label.as_deref(), &output.location);
    let path = write_atomically(dir, &filename, &content)?;
    engine_info!(
        "Session manifest written to {:?} ({} records)",
        path,
        output.records.len()
    );
    Ok(path)
}

fn ensure_output_dir(dir: &Path) -> Result<(), ExportError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ExportError::OutputDir(format!("{dir:?} is not a directory"))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir)
            .map_err(|err| ExportError::OutputDir(format!("{dir:?}: {err}"))),
        Err(err) => Err(ExportError::OutputDir(format!("{dir:?}: {err}"))),
    }
}

fn write_atomically(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, ExportError> {
    ensure_output_dir(dir)?;

    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|err| ExportError::Io(err.error))?;
    Ok(target)
}
