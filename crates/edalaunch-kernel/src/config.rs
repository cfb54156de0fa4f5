//! Launcher configuration: media layout, storage, bridge and run policy.
//!
//! Every component receives a `LauncherConfig` at construction; nothing reads
//! process-wide settings on its own, so tests can point a whole pipeline at a
//! temporary media root.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::identity::RunId;

/// Directory under the media root that holds one sub-directory per run.
pub const RUNS_DIR: &str = "runs";
const UPLOADS_DIR: &str = "uploads";

/// Shell used to reach the environment where the EDA tools are installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeMode {
    /// `wsl bash -lc <command>` from a Windows host.
    Wsl,
    /// `bash -lc <command>` on a host that runs the tools natively.
    Native,
}

/// What a run becomes when the tool ran but reported diagnostics
/// (stderr output, non-zero exit, timeout or spawn failure).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticsPolicy {
    Success,
    Partial,
}

#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub sqlite_db_path: String,
    pub server_addr: String,
    pub bridge_mode: BridgeMode,
    pub tool_timeout: Duration,
    pub max_output_bytes: usize,
    pub diagnostics_policy: DiagnosticsPolicy,
    /// Overrides the bundled KLayout extraction script.
    pub klayout_script: Option<PathBuf>,
    pub template_key: String,
    pub theme_key: String,
}

impl LauncherConfig {
    /// Defaults rooted at `media_root`.
    pub fn with_media_root(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            media_base_url: "/media/".to_string(),
            sqlite_db_path: "edalaunch.db".to_string(),
            server_addr: "127.0.0.1:8080".to_string(),
            bridge_mode: default_bridge_mode(),
            tool_timeout: Duration::from_secs(120),
            max_output_bytes: 1_048_576,
            diagnostics_policy: DiagnosticsPolicy::Success,
            klayout_script: None,
            template_key: "standard".to_string(),
            theme_key: "dark".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, String> {
        let mut envs = HashMap::new();
        for key in [
            "EDALAUNCH_MEDIA_ROOT",
            "EDALAUNCH_MEDIA_URL",
            "EDALAUNCH_SQLITE_DB",
            "EDALAUNCH_SERVER_ADDR",
            "EDALAUNCH_BRIDGE",
            "EDALAUNCH_TOOL_TIMEOUT_SECS",
            "EDALAUNCH_MAX_OUTPUT_BYTES",
            "EDALAUNCH_DIAGNOSTICS_STATUS",
            "EDALAUNCH_KLAYOUT_SCRIPT",
        ] {
            if let Ok(value) = std::env::var(key) {
                envs.insert(key.to_string(), value);
            }
        }
        Self::from_env_map(&envs)
    }

    pub fn from_env_map(envs: &HashMap<String, String>) -> Result<Self, String> {
        let get = |key: &str| {
            envs.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let media_root = get("EDALAUNCH_MEDIA_ROOT").unwrap_or_else(|| "media".to_string());
        let mut cfg = Self::with_media_root(media_root);

        if let Some(url) = get("EDALAUNCH_MEDIA_URL") {
            cfg.media_base_url = if url.ends_with('/') {
                url
            } else {
                format!("{}/", url)
            };
        }
        if let Some(db) = get("EDALAUNCH_SQLITE_DB") {
            cfg.sqlite_db_path = db;
        }
        if let Some(addr) = get("EDALAUNCH_SERVER_ADDR") {
            cfg.server_addr = addr;
        }
        if let Some(raw) = get("EDALAUNCH_BRIDGE") {
            cfg.bridge_mode = match raw.to_ascii_lowercase().as_str() {
                "wsl" => BridgeMode::Wsl,
                "bash" | "native" => BridgeMode::Native,
                other => {
                    return Err(format!(
                        "invalid EDALAUNCH_BRIDGE='{}'. expected one of: wsl, bash",
                        other
                    ));
                }
            };
        }
        if let Some(raw) = get("EDALAUNCH_TOOL_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                format!(
                    "invalid EDALAUNCH_TOOL_TIMEOUT_SECS='{}'. expected a positive integer",
                    raw
                )
            })?;
            if secs == 0 {
                return Err("EDALAUNCH_TOOL_TIMEOUT_SECS must be greater than zero".to_string());
            }
            cfg.tool_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("EDALAUNCH_MAX_OUTPUT_BYTES") {
            cfg.max_output_bytes = raw.parse::<usize>().map_err(|_| {
                format!(
                    "invalid EDALAUNCH_MAX_OUTPUT_BYTES='{}'. expected an integer",
                    raw
                )
            })?;
        }
        if let Some(raw) = get("EDALAUNCH_DIAGNOSTICS_STATUS") {
            cfg.diagnostics_policy = match raw.to_ascii_lowercase().as_str() {
                "success" => DiagnosticsPolicy::Success,
                "partial" => DiagnosticsPolicy::Partial,
                other => {
                    return Err(format!(
                        "invalid EDALAUNCH_DIAGNOSTICS_STATUS='{}'. expected one of: success, partial",
                        other
                    ));
                }
            };
        }
        cfg.klayout_script = get("EDALAUNCH_KLAYOUT_SCRIPT").map(PathBuf::from);
        Ok(cfg)
    }

    pub fn runs_root(&self) -> PathBuf {
        self.media_root.join(RUNS_DIR)
    }

    /// Directory receiving layouts uploaded only to be opened in the desktop viewer.
    pub fn layout_uploads_dir(&self) -> PathBuf {
        self.media_root.join(UPLOADS_DIR).join("klayout")
    }

    /// Run directory relative to the media root, as stored on the run record.
    pub fn run_dir_relative(&self, run_id: &RunId) -> String {
        format!("{}/{}", RUNS_DIR, run_id)
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_root().join(run_id)
    }

    /// Filesystem location of a media-relative path.
    pub fn resolve_media(&self, file_path: &str) -> PathBuf {
        self.media_root.join(file_path)
    }

    /// Browser-facing URL of a media-relative path.
    pub fn media_url(&self, file_path: &str) -> String {
        format!("{}{}", self.media_base_url, file_path)
    }

    /// Media-relative form of `path` with `/` separators, if it lies under the root.
    pub fn relative_to_media(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.media_root).ok()?;
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

fn default_bridge_mode() -> BridgeMode {
    if cfg!(windows) {
        BridgeMode::Wsl
    } else {
        BridgeMode::Native
    }
}
