//! Cross-environment process bridge.
//!
//! EDA tools live in a different OS environment than the launcher (typically
//! WSL behind a Windows host). The bridge translates native paths into that
//! environment's mount convention and runs command lines through a shell that
//! reaches it, capturing output under a timeout. A non-zero exit is data, not
//! an error: batch-mode tools routinely print diagnostics and still produce
//! usable outputs.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, Duration};

/// Prefix of the line appended to stderr when a command is terminated on timeout.
pub const TIMEOUT_MARKER: &str = "BRIDGE_TIMEOUT";

/// How long readers may keep draining pipes after the process group was killed.
/// A descendant that left the group can hold the pipes open past the kill.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgePolicy {
    pub max_output_bytes: usize,
    /// Inherited variables whose upper-cased name contains any of these are
    /// removed before the shell starts.
    pub denied_env_substrings: Vec<String>,
}

impl BridgePolicy {
    pub fn launcher_default() -> Self {
        Self {
            max_output_bytes: 1_048_576,
            denied_env_substrings: vec!["TOKEN".into(), "SECRET".into(), "PASSWORD".into()],
        }
    }
}

impl Default for BridgePolicy {
    fn default() -> Self {
        Self::launcher_default()
    }
}

/// Program and leading arguments that take a command line as their last argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeShell {
    pub program: String,
    pub args: Vec<String>,
}

impl BridgeShell {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `wsl bash -lc <command>`.
    pub fn wsl() -> Self {
        Self::new("wsl", vec!["bash".into(), "-lc".into()])
    }

    /// `bash -lc <command>` for hosts that run the tools natively.
    pub fn native() -> Self {
        Self::new("bash", vec!["-lc".into()])
    }
}

/// A command line to execute inside the bridged environment.
#[derive(Clone, Debug)]
pub struct BridgeCommand {
    pub command_line: String,
    /// Working directory in bridge convention.
    pub working_dir: Option<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl BridgeCommand {
    pub fn new<S: Into<String>>(command_line: S, timeout: Duration) -> Self {
        Self {
            command_line: command_line.into(),
            working_dir: None,
            env: Vec::new(),
            timeout,
        }
    }

    pub fn with_working_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BridgeExecution {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// A GUI process started without waiting for it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetachedProcess {
    pub pid: Option<u32>,
    pub command_line: String,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid environment variable name: {0}")]
    InvalidEnv(String),
    #[error("failed to spawn bridge shell: {0}")]
    Spawn(String),
    #[error("bridge I/O error: {0}")]
    Io(String),
}

#[async_trait]
pub trait ProcessBridge: Send + Sync {
    /// Native path → path as seen from inside the bridged environment.
    fn translate_path(&self, native_path: &str) -> String {
        translate_path(native_path)
    }

    async fn run(&self, command: &BridgeCommand) -> Result<BridgeExecution, BridgeError>;

    /// Starts the command with no captured output and returns immediately.
    /// The command's timeout is ignored.
    async fn spawn_detached(&self, command: &BridgeCommand)
        -> Result<DetachedProcess, BridgeError>;
}

pub struct ShellBridge {
    shell: BridgeShell,
    policy: BridgePolicy,
}

impl ShellBridge {
    pub fn new(shell: BridgeShell, policy: BridgePolicy) -> Self {
        Self { shell, policy }
    }

    pub fn shell(&self) -> &BridgeShell {
        &self.shell
    }
}

#[async_trait]
impl ProcessBridge for ShellBridge {
    async fn run(&self, request: &BridgeCommand) -> Result<BridgeExecution, BridgeError> {
        let script = render_script(request)?;
        tracing::debug!(
            "bridge_run program={} working_dir={:?} timeout_ms={}",
            self.shell.program,
            request.working_dir,
            request.timeout.as_millis()
        );

        let started = Instant::now();
        let mut command = self.shell_command(&script, &request.env);
        command.kill_on_drop(true);
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| BridgeError::Spawn(format!("{}: {}", self.shell.program, e)))?;
        let stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Io("stdout pipe missing".to_string()))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Io("stderr pipe missing".to_string()))?;

        let limit = self.policy.max_output_bytes;
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = tokio::spawn(drain_capped(stdout_pipe, stdout_buf.clone(), limit));
        let stderr_task = tokio::spawn(drain_capped(stderr_pipe, stderr_buf.clone(), limit));

        let (exit_code, success, timed_out) = match timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), status.success(), false),
            Ok(Err(e)) => return Err(BridgeError::Io(format!("wait for child: {}", e))),
            Err(_) => {
                self.kill_process_tree(&mut child).await;
                (None, false, true)
            }
        };

        for task in [stdout_task, stderr_task] {
            let abort = task.abort_handle();
            if timeout(DRAIN_GRACE, task).await.is_err() {
                abort.abort();
            }
        }

        let stdout = take_lossy(&stdout_buf);
        let mut stderr = take_lossy(&stderr_buf);
        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "{}: command exceeded {} ms and was terminated\n",
                TIMEOUT_MARKER,
                request.timeout.as_millis()
            ));
            tracing::warn!(
                "bridge_timeout program={} timeout_ms={}",
                self.shell.program,
                request.timeout.as_millis()
            );
        }

        Ok(BridgeExecution {
            success,
            exit_code,
            stdout,
            stderr,
            duration_ms: started.elapsed().as_millis() as u64,
            timed_out,
        })
    }

    async fn spawn_detached(
        &self,
        request: &BridgeCommand,
    ) -> Result<DetachedProcess, BridgeError> {
        let script = render_script(request)?;
        let mut command = self.shell_command(&script, &request.env);
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::null());
        let mut child = command
            .spawn()
            .map_err(|e| BridgeError::Spawn(format!("{}: {}", self.shell.program, e)))?;
        let pid = child.id();
        tracing::info!(
            "bridge_detached program={} pid={:?} command={}",
            self.shell.program,
            pid,
            request.command_line
        );
        tokio::spawn(async move {
            if let Err(e) = child.wait().await {
                tracing::warn!("bridge_detached_wait_failed pid={:?} error={}", pid, e);
            }
        });
        Ok(DetachedProcess {
            pid,
            command_line: request.command_line.clone(),
        })
    }
}

impl ShellBridge {
    /// Shell child in its own process group with a filtered environment and no stdin.
    fn shell_command(&self, script: &str, env: &[(String, String)]) -> tokio::process::Command {
        let mut command = std::process::Command::new(&self.shell.program);
        command.args(&self.shell.args);
        command.arg(script);
        command.stdin(std::process::Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        for (key, _) in std::env::vars() {
            let upper = key.to_ascii_uppercase();
            if self
                .policy
                .denied_env_substrings
                .iter()
                .any(|needle| upper.contains(&needle.to_ascii_uppercase()))
            {
                command.env_remove(&key);
            }
        }
        for (key, value) in env {
            command.env(key, value);
        }
        tokio::process::Command::from(command)
    }

    async fn kill_process_tree(&self, child: &mut tokio::process::Child) {
        if let Some(pid) = child.id() {
            if let Err(e) = kill_process_group(pid) {
                tracing::warn!(
                    "bridge_group_kill_failed program={} pid={} error={}",
                    self.shell.program,
                    pid,
                    e
                );
            }
        }
        if let Err(e) = child.kill().await {
            tracing::warn!("bridge_kill_failed program={} error={}", self.shell.program, e);
        }
    }
}

/// Sends SIGKILL to every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the process group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Maps a drive-letter-rooted native path onto the `/mnt/<drive>` convention.
///
/// `C:\foo\bar` becomes `/mnt/c/foo/bar`. Paths without a drive letter only get
/// their separators normalised, so paths already in the target convention are
/// returned unchanged.
pub fn translate_path(native_path: &str) -> String {
    let bytes = native_path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        let segments: Vec<&str> = native_path[2..]
            .split(['\\', '/'])
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return format!("/mnt/{}", drive);
        }
        return format!("/mnt/{}/{}", drive, segments.join("/"));
    }
    if native_path.contains('\\') {
        native_path.replace('\\', "/")
    } else {
        native_path.to_string()
    }
}

/// Single-quotes `value` for a POSIX shell unless it is made of safe characters.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-:=@%+,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Builds the shell script handed to the bridge shell.
///
/// Variables are exported inside the script as well as set on the child,
/// because the environment of a Windows process does not cross into WSL.
pub fn render_script(request: &BridgeCommand) -> Result<String, BridgeError> {
    let mut parts = Vec::new();
    if !request.env.is_empty() {
        let mut assignments = Vec::with_capacity(request.env.len());
        for (key, value) in &request.env {
            if !is_valid_env_name(key) {
                return Err(BridgeError::InvalidEnv(key.clone()));
            }
            assignments.push(format!("{}={}", key, shell_quote(value)));
        }
        parts.push(format!("export {}", assignments.join(" ")));
    }
    if let Some(dir) = &request.working_dir {
        parts.push(format!("cd {}", shell_quote(dir)));
    }
    parts.push(request.command_line.clone());
    Ok(parts.join(" && "))
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn drain_capped<R>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>, limit: usize)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut buf) = sink.lock() {
                    let room = limit.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    }
}

fn take_lossy(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    match buf.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_bridge() -> ShellBridge {
        ShellBridge::new(
            BridgeShell::new("sh", vec!["-c".into()]),
            BridgePolicy::default(),
        )
    }

    #[test]
    fn translate_drive_paths_to_mount_convention() {
        assert_eq!(translate_path("C:\\a\\b.gds"), "/mnt/c/a/b.gds");
        assert_eq!(translate_path("D:/work//x"), "/mnt/d/work/x");
        assert_eq!(translate_path("c:\\"), "/mnt/c");
    }

    #[test]
    fn translate_leaves_bridge_paths_alone() {
        assert_eq!(translate_path("/already/unix"), "/already/unix");
        assert_eq!(translate_path("relative/dir"), "relative/dir");
        assert_eq!(translate_path("runs\\abc"), "runs/abc");
    }

    #[test]
    fn script_exports_env_and_changes_directory() {
        let cmd = BridgeCommand::new("klayout -b -r extract.py", Duration::from_secs(1))
            .with_working_dir("/mnt/c/media/runs/r 1")
            .with_env("KLAYOUT_GDS", "/mnt/c/media/runs/r 1/generated_design.gds");
        let script = render_script(&cmd).unwrap();
        assert_eq!(
            script,
            "export KLAYOUT_GDS='/mnt/c/media/runs/r 1/generated_design.gds' && cd '/mnt/c/media/runs/r 1' && klayout -b -r extract.py"
        );
    }

    #[test]
    fn script_rejects_bad_env_names() {
        let cmd = BridgeCommand::new("true", Duration::from_secs(1)).with_env("BAD-NAME", "x");
        assert!(matches!(render_script(&cmd), Err(BridgeError::InvalidEnv(_))));
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain/path.gds"), "plain/path.gds");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[tokio::test]
    async fn run_captures_both_streams_and_exit_code() {
        let cmd = BridgeCommand::new("echo out; echo diag 1>&2; exit 3", Duration::from_secs(10));
        let result = sh_bridge().run(&cmd).await.expect("non-zero exit is not an error");
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "diag");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn run_passes_env_to_command() {
        let cmd = BridgeCommand::new("printf '%s' \"$EDA_INPUT\"", Duration::from_secs(10))
            .with_env("EDA_INPUT", "a b");
        let result = sh_bridge().run(&cmd).await.unwrap();
        assert_eq!(result.stdout, "a b");
    }

    #[tokio::test]
    async fn timeout_keeps_partial_output_and_marks_stderr() {
        let cmd = BridgeCommand::new("echo started; sleep 5", Duration::from_millis(300));
        let result = sh_bridge().run(&cmd).await.unwrap();
        assert!(result.timed_out);
        assert!(!result.success);
        assert!(result.stdout.contains("started"));
        assert!(result.stderr.contains(TIMEOUT_MARKER));
    }

    #[tokio::test]
    async fn output_is_capped() {
        let bridge = ShellBridge::new(
            BridgeShell::new("sh", vec!["-c".into()]),
            BridgePolicy {
                max_output_bytes: 4,
                denied_env_substrings: Vec::new(),
            },
        );
        let cmd = BridgeCommand::new("echo 0123456789", Duration::from_secs(10));
        let result = bridge.run(&cmd).await.unwrap();
        assert_eq!(result.stdout, "0123");
    }

    #[tokio::test]
    async fn missing_shell_is_spawn_error() {
        let bridge = ShellBridge::new(
            BridgeShell::new("edalaunch-no-such-shell", vec!["-c".into()]),
            BridgePolicy::default(),
        );
        let cmd = BridgeCommand::new("true", Duration::from_secs(1));
        assert!(matches!(bridge.run(&cmd).await, Err(BridgeError::Spawn(_))));
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "edalaunch-bridge-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn timeout_kills_descendants_before_they_write() {
        let dir = scratch_dir("late-write");
        let cmd = BridgeCommand::new(
            "sh -c 'sleep 1; echo late > late.txt'",
            Duration::from_millis(200),
        )
        .with_working_dir(dir.to_string_lossy());
        let result = sh_bridge().run(&cmd).await.unwrap();
        assert!(result.timed_out);

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!dir.join("late.txt").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn timeout_kills_background_jobs() {
        let dir = scratch_dir("background");
        let cmd = BridgeCommand::new(
            "(sleep 1; echo late > bg.txt) & wait",
            Duration::from_millis(200),
        )
        .with_working_dir(dir.to_string_lossy());
        let result = sh_bridge().run(&cmd).await.unwrap();
        assert!(result.timed_out);

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!dir.join("bg.txt").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn denied_env_names_are_matched_anywhere() {
        std::env::set_var("EDALAUNCH_BRIDGE_GITHUB_TOKEN", "hunter2");
        let cmd = BridgeCommand::new(
            "printf '%s' \"${EDALAUNCH_BRIDGE_GITHUB_TOKEN:-unset}\"",
            Duration::from_secs(10),
        );
        let result = sh_bridge().run(&cmd).await.unwrap();
        assert_eq!(result.stdout, "unset");
    }

    #[tokio::test]
    async fn detached_spawn_returns_without_waiting() {
        let dir = scratch_dir("detached");
        let cmd = BridgeCommand::new("sleep 0.2; echo up > up.txt", Duration::ZERO)
            .with_working_dir(dir.to_string_lossy());
        let started = Instant::now();
        let process = sh_bridge().spawn_detached(&cmd).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(process.pid.is_some());
        assert_eq!(process.command_line, "sleep 0.2; echo up > up.txt");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(dir.join("up.txt").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
