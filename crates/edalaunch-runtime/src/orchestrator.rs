//! Run orchestration: one upload, one tool, one run directory.
//!
//! A run is created as `running` before anything touches the filesystem, so
//! every later failure leaves a queryable record. Tool diagnostics never fail
//! a run; only launcher-side staging errors do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use edalaunch_bridge::{BridgeCommand, ProcessBridge};
use edalaunch_kernel::{
    ArtifactRecord, DiagnosticsPolicy, LauncherConfig, LauncherError, PresentationRecord,
    RunCompletion, RunId, RunRecord, RunStatus, ToolRecord,
};

use super::assembler::PresentationAssembler;
use super::blocking::run_blocking;
use super::profiles::ToolProfile;
use super::registry::{log_file_name, ArtifactRegistry};
use super::repository::LauncherRepository;

/// A design file received from the caller.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub run: RunRecord,
    pub artifacts: Vec<ArtifactRecord>,
    /// Absent when the run failed before the tool was invoked.
    pub presentation: Option<PresentationRecord>,
}

pub struct RunOrchestrator {
    repo: Arc<dyn LauncherRepository>,
    bridge: Arc<dyn ProcessBridge>,
    registry: Arc<ArtifactRegistry>,
    assembler: Arc<PresentationAssembler>,
    config: Arc<LauncherConfig>,
}

impl RunOrchestrator {
    pub fn new(
        repo: Arc<dyn LauncherRepository>,
        bridge: Arc<dyn ProcessBridge>,
        assembler: Arc<PresentationAssembler>,
        config: Arc<LauncherConfig>,
    ) -> Self {
        Self {
            registry: Arc::new(ArtifactRegistry::new(repo.clone(), config.clone())),
            repo,
            bridge,
            assembler,
            config,
        }
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Looks the tool up by slug and starts a run.
    pub async fn start_run_for_slug(
        &self,
        tool_slug: &str,
        user: Option<String>,
        upload: Option<UploadedFile>,
    ) -> Result<RunOutcome, LauncherError> {
        let repo = self.repo.clone();
        let slug = tool_slug.to_string();
        let tool = run_blocking("tool lookup", move || {
            repo.get_tool_by_slug(&slug)?
                .ok_or_else(|| LauncherError::InvalidInput(format!("unknown tool: {}", slug)))
        })
        .await?;
        self.start_run(&tool, user, upload).await
    }

    pub async fn start_run(
        &self,
        tool: &ToolRecord,
        user: Option<String>,
        upload: Option<UploadedFile>,
    ) -> Result<RunOutcome, LauncherError> {
        let upload = match upload {
            Some(upload) if !upload.bytes.is_empty() => upload,
            _ => {
                return Err(LauncherError::InvalidInput(
                    "a design file upload is required".to_string(),
                ))
            }
        };
        let profile = ToolProfile::for_tool(tool);
        profile.validate(tool)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let run = RunRecord {
            run_id: run_id.clone(),
            tool_id: tool.tool_id,
            tool_slug: tool.slug.clone(),
            user,
            input_name: upload_base_name(&upload.file_name),
            run_dir: self.config.run_dir_relative(&run_id),
            status: RunStatus::Running,
            created_at: Utc::now(),
            completed_at: None,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
        };
        let repo = self.repo.clone();
        let pending = run.clone();
        run_blocking("insert run", move || repo.insert_run(&pending)).await?;
        tracing::info!(
            "run_started run_id={} tool={} input={}",
            run_id,
            tool.slug,
            run.input_name
        );

        let input_file = profile.input_file_name(&upload.file_name);
        let run_dir = match self.stage_input(&run_id, &input_file, &upload).await {
            Ok(dir) => dir,
            Err(err) => return self.fail_run(&run, err).await,
        };
        let prepared = {
            let (tool, run_dir, input_file) = (tool.clone(), run_dir.clone(), input_file.clone());
            let (config, bridge) = (self.config.clone(), self.bridge.clone());
            run_blocking("prepare tool", move || {
                profile.prepare(&tool, &run_dir, &input_file, &config, bridge.as_ref())
            })
            .await
        };
        let invocation = match prepared {
            Ok(invocation) => invocation,
            Err(err) => return self.fail_run(&run, err).await,
        };

        let mut command = BridgeCommand::new(invocation.command_line, self.config.tool_timeout)
            .with_working_dir(self.bridge.translate_path(&run_dir.to_string_lossy()));
        command.env = invocation.env;
        let (mut completion, diagnostics) = match self.bridge.run(&command).await {
            Ok(exec) => {
                let diagnostics = exec.timed_out || !exec.success || !exec.stderr.trim().is_empty();
                (
                    RunCompletion {
                        stdout: exec.stdout,
                        stderr: exec.stderr,
                        exit_code: exec.exit_code,
                        timed_out: exec.timed_out,
                    },
                    diagnostics,
                )
            }
            Err(err) => (
                RunCompletion {
                    stderr: err.to_string(),
                    ..RunCompletion::default()
                },
                true,
            ),
        };

        let log_path = run_dir.join(log_file_name(&tool.slug));
        if let Err(err) = tokio::fs::write(&log_path, render_log(&completion)).await {
            tracing::warn!("run_log_write_failed run_id={} error={}", run_id, err);
            completion
                .stderr
                .push_str(&format!("\nfailed to write run log: {}\n", err));
        }

        let status = match (diagnostics, self.config.diagnostics_policy) {
            (true, DiagnosticsPolicy::Partial) => RunStatus::Partial,
            _ => RunStatus::Success,
        };
        let repo = self.repo.clone();
        let finished_id = run_id.clone();
        let run = run_blocking("finish run", move || {
            repo.finish_run(&finished_id, status, &completion, Utc::now())
        })
        .await?;
        tracing::info!(
            "run_finished run_id={} status={} exit_code={:?} timed_out={}",
            run_id,
            run.status.as_str(),
            run.exit_code,
            run.timed_out
        );

        let (registry, assembler) = (self.registry.clone(), self.assembler.clone());
        run_blocking("collect artifacts", move || {
            let artifacts = registry.discover(&run)?;
            let presentation = assembler.assemble(&run)?;
            Ok(RunOutcome {
                run,
                artifacts,
                presentation: Some(presentation),
            })
        })
        .await
    }

    /// Creates the run directory exclusively and writes the upload into it.
    /// Returns the absolute run directory.
    async fn stage_input(
        &self,
        run_id: &RunId,
        input_file: &str,
        upload: &UploadedFile,
    ) -> Result<PathBuf, LauncherError> {
        let runs_root = self.config.runs_root();
        tokio::fs::create_dir_all(&runs_root)
            .await
            .map_err(|e| LauncherError::io("create runs root", e))?;
        let run_dir = absolute(&self.config.run_dir(run_id))?;
        match tokio::fs::create_dir(&run_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LauncherError::Conflict(format!(
                    "run directory {} already exists",
                    run_dir.display()
                )));
            }
            Err(e) => return Err(LauncherError::io("create run directory", e)),
        }
        tokio::fs::write(run_dir.join(input_file), &upload.bytes)
            .await
            .map_err(|e| LauncherError::io("persist upload", e))?;
        Ok(run_dir)
    }

    async fn fail_run(
        &self,
        run: &RunRecord,
        err: LauncherError,
    ) -> Result<RunOutcome, LauncherError> {
        tracing::warn!("run_failed run_id={} error={}", run.run_id, err);
        let repo = self.repo.clone();
        let run_id = run.run_id.clone();
        let run = run_blocking("fail run", move || {
            repo.finish_run(
                &run_id,
                RunStatus::Failed,
                &RunCompletion {
                    stderr: err.to_string(),
                    ..RunCompletion::default()
                },
                Utc::now(),
            )
        })
        .await?;
        Ok(RunOutcome {
            run,
            artifacts: Vec::new(),
            presentation: None,
        })
    }
}

/// Log file body: both captured streams under fixed headings.
pub fn render_log(completion: &RunCompletion) -> String {
    format!(
        "STDOUT:\n{}\n\nSTDERR:\n{}",
        completion.stdout, completion.stderr
    )
}

/// Final path component of an uploaded file name, with either separator.
pub(crate) fn upload_base_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf, LauncherError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| LauncherError::io("resolve current dir", e))?;
    Ok(cwd.join(path))
}
