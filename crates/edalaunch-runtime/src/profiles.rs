//! Per-tool invocation conventions: the fixed input name, the files staged
//! next to it and the batch command line run through the bridge.

use std::path::Path;

use serde_json::Value;

use edalaunch_bridge::{shell_quote, ProcessBridge};
use edalaunch_kernel::{LauncherConfig, LauncherError, ToolRecord};

const KLAYOUT_SCRIPT: &str = include_str!("../assets/klayout_extract.py");
const SIM_MAIN_TEMPLATE: &str = include_str!("../assets/sim_main.cpp");

pub const KLAYOUT_INPUT: &str = "generated_design.gds";
pub const VERILOG_INPUT: &str = "design.v";
pub const VERILOG_TOP_MODULE: &str = "top_design";
pub const PREVIEW_FILE: &str = "preview.png";
pub const METADATA_FILE: &str = "metadata.json";
pub const WAVEFORM_FILE: &str = "wave.vcd";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolProfile {
    Klayout,
    Verilator,
    Generic,
}

/// Command line and extra environment for one tool run.
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    pub command_line: String,
    pub env: Vec<(String, String)>,
}

impl ToolProfile {
    pub fn for_tool(tool: &ToolRecord) -> Self {
        match tool.slug.as_str() {
            "klayout" => ToolProfile::Klayout,
            "verilator" => ToolProfile::Verilator,
            _ => ToolProfile::Generic,
        }
    }

    /// Rejects tools that cannot be invoked at all, before a run exists.
    pub fn validate(&self, tool: &ToolRecord) -> Result<(), LauncherError> {
        if *self == ToolProfile::Generic && tool.linux_executable_path.trim().is_empty() {
            return Err(LauncherError::InvalidInput(format!(
                "tool '{}' has no executable configured",
                tool.slug
            )));
        }
        Ok(())
    }

    /// Name the upload is persisted under inside the run directory.
    pub fn input_file_name(&self, upload_name: &str) -> String {
        match self {
            ToolProfile::Klayout => KLAYOUT_INPUT.to_string(),
            ToolProfile::Verilator => VERILOG_INPUT.to_string(),
            ToolProfile::Generic => match safe_extension(upload_name) {
                Some(ext) => format!("input.{}", ext),
                None => "input".to_string(),
            },
        }
    }

    /// Stages helper files in `run_dir` and builds the invocation.
    ///
    /// `run_dir` must be absolute; every path handed to the tool is translated
    /// through the bridge.
    pub fn prepare(
        &self,
        tool: &ToolRecord,
        run_dir: &Path,
        input_file: &str,
        config: &LauncherConfig,
        bridge: &dyn ProcessBridge,
    ) -> Result<Invocation, LauncherError> {
        let bridged = |name: &str| bridge.translate_path(&run_dir.join(name).to_string_lossy());
        let mut invocation = match self {
            ToolProfile::Klayout => {
                let script = match &config.klayout_script {
                    Some(path) => bridge.translate_path(&path.to_string_lossy()),
                    None => {
                        let staged = run_dir.join("klayout_extract.py");
                        std::fs::write(&staged, KLAYOUT_SCRIPT)
                            .map_err(|e| LauncherError::io("stage klayout script", e))?;
                        bridge.translate_path(&staged.to_string_lossy())
                    }
                };
                Invocation {
                    command_line: format!(
                        "{} -b -r {}",
                        shell_quote(executable(tool, "klayout")),
                        shell_quote(&script)
                    ),
                    env: vec![
                        ("KLAYOUT_GDS".to_string(), bridged(input_file)),
                        ("KLAYOUT_PNG".to_string(), bridged(PREVIEW_FILE)),
                        ("KLAYOUT_META".to_string(), bridged(METADATA_FILE)),
                    ],
                }
            }
            ToolProfile::Verilator => {
                let source_path = run_dir.join(input_file);
                let source = std::fs::read(&source_path)
                    .map_err(|e| LauncherError::io("read verilog source", e))?;
                let (fixed, renamed) =
                    rename_first_module(&String::from_utf8_lossy(&source), VERILOG_TOP_MODULE);
                if !renamed {
                    tracing::warn!(
                        "verilog_module_not_found input={} top_module={}",
                        source_path.display(),
                        VERILOG_TOP_MODULE
                    );
                }
                std::fs::write(&source_path, fixed)
                    .map_err(|e| LauncherError::io("write verilog source", e))?;
                std::fs::write(run_dir.join("sim_main.cpp"), sim_main_for(VERILOG_TOP_MODULE))
                    .map_err(|e| LauncherError::io("stage sim_main.cpp", e))?;
                let exe = shell_quote(executable(tool, "verilator"));
                let model = format!("V{}", VERILOG_TOP_MODULE);
                Invocation {
                    command_line: format!(
                        "{exe} -Wall --Wno-EOFNEWLINE --trace --cc {input} --top-module {top} \
                         --exe sim_main.cpp && make -C obj_dir -f {model}.mk {model} && ./obj_dir/{model}",
                        exe = exe,
                        input = shell_quote(input_file),
                        top = VERILOG_TOP_MODULE,
                        model = model
                    ),
                    env: Vec::new(),
                }
            }
            ToolProfile::Generic => Invocation {
                command_line: format!(
                    "{} {}",
                    shell_quote(tool.linux_executable_path.trim()),
                    shell_quote(&bridged(input_file))
                ),
                env: Vec::new(),
            },
        };
        invocation.env.extend(template_env(&tool.env_template));
        Ok(invocation)
    }
}

fn executable<'a>(tool: &'a ToolRecord, fallback: &'a str) -> &'a str {
    let path = tool.linux_executable_path.trim();
    if path.is_empty() {
        fallback
    } else {
        path
    }
}

/// Extra variables from the tool's env template; non-string values are
/// passed in their JSON form.
fn template_env(template: &Value) -> Vec<(String, String)> {
    let Some(map) = template.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn safe_extension(upload_name: &str) -> Option<String> {
    let ext = Path::new(upload_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Renames the first `module` declaration to `new_name` and wraps the source in
/// DECLFILENAME lint pragmas, since the module no longer matches the file name.
/// Returns the rewritten text and whether a declaration was found.
pub fn rename_first_module(source: &str, new_name: &str) -> (String, bool) {
    let mut text = source.to_string();
    let mut renamed = false;
    if let Some((start, end)) = find_first_module_name(source) {
        text.replace_range(start..end, new_name);
        renamed = true;
    }
    if !text.contains("verilator lint_off DECLFILENAME") {
        text = format!(
            "/* verilator lint_off DECLFILENAME */\n{}\n/* verilator lint_on DECLFILENAME */\n",
            text
        );
    }
    if !text.ends_with('\n') {
        text.push('\n');
    }
    (text, renamed)
}

/// Byte range of the identifier following the first standalone `module` keyword.
fn find_first_module_name(source: &str) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut from = 0;
    while let Some(pos) = source[from..].find("module") {
        let start = from + pos;
        let after = start + "module".len();
        from = after;
        if start > 0 && is_ident(bytes[start - 1]) {
            continue;
        }
        let mut cursor = after;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor == after || cursor >= bytes.len() {
            continue;
        }
        if !(bytes[cursor].is_ascii_alphabetic() || bytes[cursor] == b'_') {
            continue;
        }
        let name_start = cursor;
        while cursor < bytes.len() && is_ident(bytes[cursor]) {
            cursor += 1;
        }
        return Some((name_start, cursor));
    }
    None
}

pub fn sim_main_for(top_module: &str) -> String {
    SIM_MAIN_TEMPLATE.replace("VMODULE_NAME", &format!("V{}", top_module))
}
