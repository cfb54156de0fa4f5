//! Reference data the pipeline depends on: presentation templates, themes and
//! the tool catalog. Seeding never overwrites rows that already exist.

use serde_json::json;

use edalaunch_kernel::{LauncherError, NewTool, TemplateRecord, ThemeRecord, ToolType};

use super::repository::LauncherRepository;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub templates_inserted: usize,
    pub themes_inserted: usize,
    pub tools: usize,
}

pub fn default_templates() -> Vec<TemplateRecord> {
    [
        ("standard", "Standard Review", "Default technical review"),
        ("engineering", "Engineering Focus", "Deep technical layout"),
        ("executive", "Executive Summary", "High-level executive view"),
        ("darkboard", "Dark Boardroom", "Dark professional layout"),
    ]
    .into_iter()
    .map(|(key, name, description)| TemplateRecord {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        base_layout: key.to_string(),
    })
    .collect()
}

pub fn default_themes() -> Vec<ThemeRecord> {
    [
        ("dark", "Dark Pro"),
        ("light", "Light Clean"),
        ("blueprint", "Blueprint"),
    ]
    .into_iter()
    .map(|(key, name)| ThemeRecord {
        key: key.to_string(),
        name: name.to_string(),
        css_class: format!("theme-{}", key),
    })
    .collect()
}

pub fn default_tools() -> Vec<NewTool> {
    vec![
        NewTool {
            name: "KLayout".into(),
            slug: "klayout".into(),
            category: "custom-layout".into(),
            description: "Open-source IC layout viewer & editor".into(),
            tool_type: ToolType::Desktop,
            linux_executable_path: "/usr/bin/klayout".into(),
            windows_executable_path: r"C:\Program Files\KLayout\klayout.exe".into(),
            web_url: None,
            env_template: json!({}),
        },
        NewTool {
            name: "Magic".into(),
            slug: "magic".into(),
            category: "custom-layout".into(),
            description: "VLSI layout editor used in open-source physical design workflows"
                .into(),
            tool_type: ToolType::Desktop,
            linux_executable_path: "/usr/bin/magic".into(),
            windows_executable_path: String::new(),
            web_url: None,
            env_template: json!({}),
        },
        NewTool {
            name: "Verilator".into(),
            slug: "verilator".into(),
            category: "simulation-rtl-verification".into(),
            description: "Fast open-source SystemVerilog/Verilog simulator".into(),
            tool_type: ToolType::Desktop,
            linux_executable_path: "/usr/bin/verilator".into(),
            windows_executable_path: r"C:\msys64\mingw64\bin\verilator.cmd".into(),
            web_url: None,
            env_template: json!({}),
        },
    ]
}

/// Seeds templates, themes and tools. Safe to run on every start.
pub fn seed_reference_data(repo: &dyn LauncherRepository) -> Result<SeedSummary, LauncherError> {
    let mut summary = SeedSummary::default();
    for template in default_templates() {
        if repo.seed_template(&template)? {
            summary.templates_inserted += 1;
        }
    }
    for theme in default_themes() {
        if repo.seed_theme(&theme)? {
            summary.themes_inserted += 1;
        }
    }
    for tool in default_tools() {
        repo.seed_tool(&tool)?;
        summary.tools += 1;
    }
    tracing::info!(
        "reference_data_seeded templates_inserted={} themes_inserted={} tools={}",
        summary.templates_inserted,
        summary.themes_inserted,
        summary.tools
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_repository::SqliteLauncherRepository;

    #[test]
    fn seeding_twice_inserts_once() {
        let repo = SqliteLauncherRepository::new(":memory:").unwrap();
        let first = seed_reference_data(&repo).unwrap();
        assert_eq!(first.templates_inserted, 4);
        assert_eq!(first.themes_inserted, 3);
        let second = seed_reference_data(&repo).unwrap();
        assert_eq!(second.templates_inserted, 0);
        assert_eq!(second.themes_inserted, 0);
        assert!(repo.get_template("standard").unwrap().is_some());
        assert!(repo.get_theme("dark").unwrap().is_some());
        assert!(repo.get_tool_by_slug("klayout").unwrap().is_some());
        assert_eq!(repo.list_tools(false).unwrap().len(), 3);
    }
}
