//! Interactive tool launches: desktop GUIs started detached through the
//! bridge, and the URL of a tool's browser workspace.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use edalaunch_bridge::{shell_quote, BridgeCommand, DetachedProcess, ProcessBridge};
use edalaunch_kernel::{LauncherConfig, LauncherError, ToolRecord};

use super::blocking::run_blocking;
use super::orchestrator::{absolute, upload_base_name, UploadedFile};
use super::profiles::ToolProfile;
use super::repository::LauncherRepository;

const LAYOUT_VIEWER_SLUG: &str = "klayout";

#[derive(Clone, Debug, Serialize)]
pub struct DesktopLaunch {
    pub tool: String,
    pub message: String,
    pub process: DetachedProcess,
}

#[derive(Clone, Debug, Serialize)]
pub struct WebLaunch {
    pub tool: String,
    pub url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OpenedLayout {
    /// Media-relative location of the stored upload.
    pub file_path: String,
    pub url: String,
    pub message: String,
    pub process: DetachedProcess,
}

pub struct ToolLauncher {
    repo: Arc<dyn LauncherRepository>,
    bridge: Arc<dyn ProcessBridge>,
    config: Arc<LauncherConfig>,
}

impl ToolLauncher {
    pub fn new(
        repo: Arc<dyn LauncherRepository>,
        bridge: Arc<dyn ProcessBridge>,
        config: Arc<LauncherConfig>,
    ) -> Self {
        Self {
            repo,
            bridge,
            config,
        }
    }

    async fn tool(&self, slug: &str) -> Result<ToolRecord, LauncherError> {
        let repo = self.repo.clone();
        let slug = slug.to_string();
        run_blocking("tool lookup", move || {
            repo.get_tool_by_slug(&slug)?
                .ok_or_else(|| LauncherError::NotFound(format!("tool {} not found", slug)))
        })
        .await
    }

    /// Starts the tool's GUI without waiting for it. KLayout opens in editor mode.
    pub async fn launch_desktop(&self, slug: &str) -> Result<DesktopLaunch, LauncherError> {
        let tool = self.tool(slug).await?;
        let mut command_line = desktop_executable(&tool, self.bridge.as_ref())?;
        if tool.slug == LAYOUT_VIEWER_SLUG {
            command_line.push_str(" -e");
        }
        let process = self.spawn(&tool, command_line).await?;
        Ok(DesktopLaunch {
            message: format!("{} launched", tool.name),
            tool: tool.slug,
            process,
        })
    }

    /// URL of the tool's browser workspace.
    pub async fn launch_web(&self, slug: &str) -> Result<WebLaunch, LauncherError> {
        let tool = self.tool(slug).await?;
        let url = web_url(&tool).ok_or_else(|| {
            LauncherError::InvalidInput(format!("No web mode for tool {}", tool.slug))
        })?;
        Ok(WebLaunch {
            tool: tool.slug,
            url,
        })
    }

    /// Stores an uploaded layout and opens it in the desktop viewer.
    pub async fn open_layout(
        &self,
        upload: Option<UploadedFile>,
    ) -> Result<OpenedLayout, LauncherError> {
        let upload = match upload {
            Some(upload) if !upload.bytes.is_empty() => upload,
            _ => {
                return Err(LauncherError::InvalidInput(
                    "No GDS file uploaded".to_string(),
                ))
            }
        };
        let tool = self.tool(LAYOUT_VIEWER_SLUG).await?;
        let executable = desktop_executable(&tool, self.bridge.as_ref())?;

        let dir = absolute(&self.config.layout_uploads_dir())?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| LauncherError::io("create layout upload dir", e))?;
        let stored_name = format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            upload_base_name(&upload.file_name)
        );
        let stored = dir.join(&stored_name);
        tokio::fs::write(&stored, &upload.bytes)
            .await
            .map_err(|e| LauncherError::io("persist layout upload", e))?;
        let file_path = self.config.relative_to_media(&stored).unwrap_or_else(|| {
            format!("uploads/{}/{}", LAYOUT_VIEWER_SLUG, stored_name)
        });

        let bridged = self.bridge.translate_path(&stored.to_string_lossy());
        let process = self
            .spawn(&tool, format!("{} {}", executable, shell_quote(&bridged)))
            .await?;
        Ok(OpenedLayout {
            url: self.config.media_url(&file_path),
            file_path,
            message: format!("{} opened with {}", tool.name, stored_name),
            process,
        })
    }

    async fn spawn(
        &self,
        tool: &ToolRecord,
        command_line: String,
    ) -> Result<DetachedProcess, LauncherError> {
        let command = BridgeCommand::new(command_line, Duration::ZERO);
        let process = self
            .bridge
            .spawn_detached(&command)
            .await
            .map_err(|e| LauncherError::Io(format!("launch {}: {}", tool.slug, e)))?;
        tracing::info!(
            "tool_launched tool={} pid={:?} command={}",
            tool.slug,
            process.pid,
            process.command_line
        );
        Ok(process)
    }
}

/// Quoted executable in bridge convention; the Linux path wins over the Windows one.
fn desktop_executable(
    tool: &ToolRecord,
    bridge: &dyn ProcessBridge,
) -> Result<String, LauncherError> {
    let linux = tool.linux_executable_path.trim();
    let windows = tool.windows_executable_path.trim();
    let path = if !linux.is_empty() {
        linux.to_string()
    } else if !windows.is_empty() {
        bridge.translate_path(windows)
    } else {
        return Err(LauncherError::InvalidInput(format!(
            "tool {} has no executable path configured",
            tool.slug
        )));
    };
    Ok(shell_quote(&path))
}

/// A configured web URL, or the launcher's own upload workspace for tools with a batch profile.
fn web_url(tool: &ToolRecord) -> Option<String> {
    if let Some(url) = tool.web_url.as_deref().map(str::trim) {
        if !url.is_empty() {
            return Some(url.to_string());
        }
    }
    match ToolProfile::for_tool(tool) {
        ToolProfile::Klayout | ToolProfile::Verilator => {
            Some(format!("/tools/{}?mode=web", tool.slug))
        }
        ToolProfile::Generic => None,
    }
}
