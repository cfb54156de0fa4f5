//! Artifact discovery over a finished run directory.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use edalaunch_kernel::{
    ArtifactKind, ArtifactRecord, LauncherConfig, LauncherError, NewArtifact, RunRecord,
    RunStatus,
};

use super::profiles::{KLAYOUT_INPUT, METADATA_FILE, PREVIEW_FILE, WAVEFORM_FILE};
use super::repository::LauncherRepository;

/// One conventionally named output of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Convention {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub display_name: &'static str,
}

/// The fixed file-name → kind table scanned for a run of `tool_slug`.
pub fn conventions(tool_slug: &str) -> Vec<Convention> {
    vec![
        Convention {
            file_name: PREVIEW_FILE.to_string(),
            kind: ArtifactKind::Image,
            display_name: "Layout preview",
        },
        Convention {
            file_name: METADATA_FILE.to_string(),
            kind: ArtifactKind::Report,
            display_name: "Layout metadata",
        },
        Convention {
            file_name: log_file_name(tool_slug),
            kind: ArtifactKind::Log,
            display_name: "Tool log",
        },
        Convention {
            file_name: WAVEFORM_FILE.to_string(),
            kind: ArtifactKind::Report,
            display_name: "Simulation waveform",
        },
        Convention {
            file_name: KLAYOUT_INPUT.to_string(),
            kind: ArtifactKind::Gds,
            display_name: "Input layout",
        },
    ]
}

pub fn log_file_name(tool_slug: &str) -> String {
    format!("{}.log", tool_slug)
}

pub struct ArtifactRegistry {
    repo: Arc<dyn LauncherRepository>,
    config: Arc<LauncherConfig>,
}

impl ArtifactRegistry {
    pub fn new(repo: Arc<dyn LauncherRepository>, config: Arc<LauncherConfig>) -> Self {
        Self { repo, config }
    }

    /// Registers every conventional output present in the run directory.
    ///
    /// Missing files are skipped. Calling this again for the same run returns
    /// the same records.
    pub fn discover(&self, run: &RunRecord) -> Result<Vec<ArtifactRecord>, LauncherError> {
        if run.status == RunStatus::Running {
            return Err(LauncherError::Conflict(format!(
                "run {} is still running; artifacts are registered after completion",
                run.run_id
            )));
        }
        let run_dir = self.config.resolve_media(&run.run_dir);
        let mut found = Vec::new();
        for convention in conventions(&run.tool_slug) {
            let path = run_dir.join(&convention.file_name);
            let meta = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LauncherError::io("stat run output", e)),
            };
            let file_path = self.config.relative_to_media(&path).ok_or_else(|| {
                LauncherError::InvalidInput(format!(
                    "run output {} is outside the media root",
                    path.display()
                ))
            })?;
            let record = self.repo.register_artifact(&NewArtifact {
                run_id: run.run_id.clone(),
                kind: convention.kind,
                name: convention.display_name.to_string(),
                file_path,
                size_bytes: meta.len(),
                sha256: sha256_file(&path)?,
            })?;
            found.push(record);
        }
        tracing::info!(
            "artifacts_discovered run_id={} count={}",
            run.run_id,
            found.len()
        );
        Ok(found)
    }
}

fn sha256_file(path: &Path) -> Result<String, LauncherError> {
    let mut file = File::open(path).map_err(|e| LauncherError::io("open artifact", e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| LauncherError::io("hash artifact", e))?;
    Ok(hex::encode(hasher.finalize()))
}
