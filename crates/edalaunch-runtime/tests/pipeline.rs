use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use edalaunch_bridge::{
    BridgeCommand, BridgeError, BridgeExecution, BridgePolicy, BridgeShell, DetachedProcess,
    ProcessBridge, ShellBridge, TIMEOUT_MARKER,
};
use edalaunch_kernel::{
    ArtifactKind, DiagnosticsPolicy, LauncherConfig, LauncherError, NewTool, RunStatus,
    SlideItemKind, ToolType,
};
use edalaunch_runtime::export::{load_document, pdf, pptx, ItemContent};
use edalaunch_runtime::{
    seed_reference_data, LauncherRepository, PresentationAssembler, RunOrchestrator,
    SqliteLauncherRepository, UploadedFile,
};

/// Stands in for KLayout: writes a preview and a metadata report into the
/// working directory and reports a warning on stderr.
struct FakeKlayout;

#[async_trait]
impl ProcessBridge for FakeKlayout {
    async fn run(&self, command: &BridgeCommand) -> Result<BridgeExecution, BridgeError> {
        let dir = PathBuf::from(command.working_dir.clone().unwrap_or_default());
        assert!(command.command_line.contains("-b -r"));
        assert!(command.env.iter().any(|(k, _)| k == "KLAYOUT_GDS"));
        image::RgbImage::from_pixel(16, 8, image::Rgb([30, 60, 90]))
            .save(dir.join("preview.png"))
            .map_err(|e| BridgeError::Io(e.to_string()))?;
        std::fs::write(
            dir.join("metadata.json"),
            r#"{"cells": 3, "layers": 2, "top_cell": "TOP"}"#,
        )
        .map_err(|e| BridgeError::Io(e.to_string()))?;
        Ok(BridgeExecution {
            success: true,
            exit_code: Some(0),
            stdout: "extracted\n".into(),
            stderr: "WARNING: layer 63/0 has no name\n".into(),
            duration_ms: 3,
            timed_out: false,
        })
    }

    async fn spawn_detached(&self, command: &BridgeCommand) -> Result<DetachedProcess, BridgeError> {
        Err(BridgeError::Spawn(format!(
            "unexpected detached launch: {}",
            command.command_line
        )))
    }
}

struct Harness {
    root: PathBuf,
    repo: Arc<SqliteLauncherRepository>,
    assembler: Arc<PresentationAssembler>,
    orchestrator: RunOrchestrator,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn harness_with(
    bridge: Arc<dyn ProcessBridge>,
    configure: impl FnOnce(&mut LauncherConfig),
) -> Harness {
    let root = std::env::temp_dir().join(format!("edalaunch-pipeline-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    let mut config = LauncherConfig::with_media_root(&root);
    configure(&mut config);
    let config = Arc::new(config);
    let repo = Arc::new(SqliteLauncherRepository::new(":memory:").unwrap());
    seed_reference_data(repo.as_ref()).unwrap();
    let assembler = Arc::new(PresentationAssembler::new(repo.clone(), config.clone()));
    let orchestrator = RunOrchestrator::new(repo.clone(), bridge, assembler.clone(), config);
    Harness {
        root,
        repo,
        assembler,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(FakeKlayout), |_| {})
}

fn shell_harness(timeout: Duration) -> Harness {
    let bridge = ShellBridge::new(
        BridgeShell::new("sh", vec!["-c".to_string()]),
        BridgePolicy::launcher_default(),
    );
    let h = harness_with(Arc::new(bridge), |config| config.tool_timeout = timeout);
    h.repo
        .seed_tool(&NewTool {
            name: "Shell script".into(),
            slug: "script".into(),
            category: "utility".into(),
            description: "Runs the uploaded script".into(),
            tool_type: ToolType::Desktop,
            linux_executable_path: "sh".into(),
            windows_executable_path: String::new(),
            web_url: None,
            env_template: json!({}),
        })
        .unwrap();
    h
}

fn gds_upload() -> Option<UploadedFile> {
    Some(UploadedFile {
        file_name: "C:\\designs\\chip.gds".into(),
        bytes: b"GDSII-bytes".to_vec(),
    })
}

#[tokio::test]
async fn klayout_upload_produces_run_artifacts_and_presentation() {
    let h = harness();
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", Some("alice".into()), gds_upload())
        .await
        .unwrap();

    let run = &outcome.run;
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.input_name, "chip.gds");
    assert!(run.completed_at.is_some());
    assert!(run.stderr.contains("WARNING"));
    let run_dir = h.root.join("runs").join(&run.run_id);
    assert_eq!(
        std::fs::read(run_dir.join("generated_design.gds")).unwrap(),
        b"GDSII-bytes"
    );
    let log = std::fs::read_to_string(run_dir.join("klayout.log")).unwrap();
    assert!(log.starts_with("STDOUT:\nextracted"));

    let kinds: Vec<ArtifactKind> = outcome.artifacts.iter().map(|a| a.kind).collect();
    assert!(kinds.contains(&ArtifactKind::Image));
    assert!(kinds.contains(&ArtifactKind::Report));
    assert!(kinds.contains(&ArtifactKind::Log));
    assert!(outcome
        .artifacts
        .iter()
        .all(|a| a.file_path.starts_with(&format!("runs/{}/", run.run_id))));

    let presentation = outcome.presentation.expect("presentation");
    assert_eq!(presentation.run_id.as_deref(), Some(run.run_id.as_str()));
    let slides = h.repo.list_slides(presentation.presentation_id).unwrap();
    let layout: Vec<(i64, &str)> = slides.iter().map(|s| (s.order, s.title.as_str())).collect();
    assert_eq!(
        layout,
        vec![(1, "Layout View"), (2, "Metadata"), (3, "Logs")]
    );
    for slide in &slides {
        assert_eq!(h.repo.list_slide_items(slide.slide_id).unwrap().len(), 1);
    }

    let config = LauncherConfig::with_media_root(&h.root);
    let doc = load_document(h.repo.as_ref(), &config, presentation.presentation_id).unwrap();
    match &doc.slides[1].items[0].content {
        ItemContent::Text { summary, .. } => assert!(summary.contains(&"Top cell: TOP".to_string())),
        other => panic!("metadata should render as text, got {:?}", other),
    }
    let bytes = pdf::render_pdf(&doc).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn discovery_and_assembly_are_idempotent() {
    let h = harness();
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    let first: Vec<(ArtifactKind, String)> = outcome
        .artifacts
        .iter()
        .map(|a| (a.kind, a.file_path.clone()))
        .collect();
    let again: Vec<(ArtifactKind, String)> = h
        .orchestrator
        .registry()
        .discover(&outcome.run)
        .unwrap()
        .into_iter()
        .map(|a| (a.kind, a.file_path))
        .collect();
    assert_eq!(first, again);
    assert_eq!(h.repo.list_artifacts(&outcome.run.run_id).unwrap().len(), first.len());

    let presentation = outcome.presentation.unwrap();
    for _ in 0..3 {
        let p = h.assembler.assemble(&outcome.run).unwrap();
        assert_eq!(p.presentation_id, presentation.presentation_id);
    }
    let summary = h
        .assembler
        .attach_artifacts(&presentation, &outcome.run)
        .unwrap();
    assert_eq!(summary.inserted, 0);
    let total: usize = h
        .repo
        .list_slides(presentation.presentation_id)
        .unwrap()
        .iter()
        .map(|s| h.repo.list_slide_items(s.slide_id).unwrap().len())
        .sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn staging_failure_marks_run_failed() {
    let h = harness();
    std::fs::write(h.root.join("runs"), b"not a directory").unwrap();
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    assert_eq!(outcome.run.status, RunStatus::Failed);
    assert!(outcome.run.stderr.contains("create runs root"));
    assert!(outcome.artifacts.is_empty());
    assert!(outcome.presentation.is_none());
    let stored = h.repo.get_run(&outcome.run.run_id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn missing_upload_creates_no_run() {
    let h = harness();
    let err = h
        .orchestrator
        .start_run_for_slug("klayout", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::InvalidInput(_)));
    let empty = h
        .orchestrator
        .start_run_for_slug(
            "klayout",
            None,
            Some(UploadedFile {
                file_name: "a.gds".into(),
                bytes: Vec::new(),
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(empty, LauncherError::InvalidInput(_)));
    assert!(h.repo.list_runs(10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn diagnostics_become_partial_when_configured() {
    let h = harness_with(Arc::new(FakeKlayout), |config| {
        config.diagnostics_policy = DiagnosticsPolicy::Partial
    });
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    assert_eq!(outcome.run.status, RunStatus::Partial);
    assert!(outcome.presentation.is_some());
}

#[tokio::test]
async fn shell_tool_output_is_captured() {
    let h = shell_harness(Duration::from_secs(20));
    let outcome = h
        .orchestrator
        .start_run_for_slug(
            "script",
            None,
            Some(UploadedFile {
                file_name: "hello.sh".into(),
                bytes: b"echo hello\necho careful 1>&2\nexit 3\n".to_vec(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome.run.status, RunStatus::Success);
    assert_eq!(outcome.run.exit_code, Some(3));
    assert_eq!(outcome.run.stdout.trim(), "hello");
    assert!(outcome.run.stderr.contains("careful"));
    assert!(outcome
        .artifacts
        .iter()
        .any(|a| a.kind == ArtifactKind::Log && a.file_path.ends_with("script.log")));
}

#[tokio::test]
async fn tool_timeout_is_recorded_as_success_with_marker() {
    let h = shell_harness(Duration::from_millis(300));
    let outcome = h
        .orchestrator
        .start_run_for_slug(
            "script",
            None,
            Some(UploadedFile {
                file_name: "slow.sh".into(),
                bytes: b"echo started\nexec sleep 5\n".to_vec(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome.run.status, RunStatus::Success);
    assert!(outcome.run.timed_out);
    assert!(outcome.run.stderr.contains(TIMEOUT_MARKER));
    assert!(outcome.presentation.is_some());
}

#[tokio::test]
async fn timed_out_run_gains_no_late_outputs() {
    let h = shell_harness(Duration::from_millis(300));
    let outcome = h
        .orchestrator
        .start_run_for_slug(
            "script",
            None,
            Some(UploadedFile {
                file_name: "late.sh".into(),
                bytes: b"echo started\n( sleep 1; echo late > wave.vcd; echo late > late.txt ) &\nsleep 5\n"
                    .to_vec(),
            }),
        )
        .await
        .unwrap();
    assert!(outcome.run.timed_out);
    let run_dir = h.root.join("runs").join(&outcome.run.run_id);
    let files_at_finish = list_dir(&run_dir);

    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert_eq!(list_dir(&run_dir), files_at_finish);
    assert!(!run_dir.join("wave.vcd").exists());
    assert!(!run_dir.join("late.txt").exists());

    let rediscovered = h
        .orchestrator
        .registry()
        .discover(&outcome.run)
        .unwrap();
    let paths = |artifacts: &[edalaunch_kernel::ArtifactRecord]| -> Vec<String> {
        artifacts.iter().map(|a| a.file_path.clone()).collect()
    };
    assert_eq!(paths(&rediscovered), paths(&outcome.artifacts));
    assert_eq!(
        h.repo.list_artifacts(&outcome.run.run_id).unwrap().len(),
        outcome.artifacts.len()
    );
}

fn list_dir(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn slide_items_cannot_cross_runs() {
    let h = harness();
    let a = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    let b = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    let presentation_a = a.presentation.unwrap();
    let logs_a = h
        .repo
        .list_slides(presentation_a.presentation_id)
        .unwrap()
        .into_iter()
        .find(|s| s.title == "Logs")
        .unwrap();
    let foreign = b
        .artifacts
        .iter()
        .find(|x| x.kind == ArtifactKind::Log)
        .unwrap();
    let err = h
        .assembler
        .add_slide_item(logs_a.slide_id, foreign.artifact_id, None, None, None)
        .unwrap_err();
    assert!(matches!(err, LauncherError::Conflict(_)));
}

#[tokio::test]
async fn manual_slides_extend_and_export_to_pptx() {
    let h = harness();
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", Some("bob".into()), gds_upload())
        .await
        .unwrap();
    let presentation = outcome.presentation.unwrap();
    let extra = h
        .assembler
        .add_slide(presentation.presentation_id, "Reviewer notes")
        .unwrap();
    assert_eq!(extra.order, 4);
    let preview = outcome
        .artifacts
        .iter()
        .find(|a| a.kind == ArtifactKind::Image)
        .unwrap();
    let item = h
        .assembler
        .add_slide_item(
            extra.slide_id,
            preview.artifact_id,
            None,
            Some(json!({"annotation": "zoomed core"})),
            Some("bob".into()),
        )
        .unwrap();
    assert_eq!(item.kind, SlideItemKind::Image);

    let config = LauncherConfig::with_media_root(&h.root);
    let doc = load_document(h.repo.as_ref(), &config, presentation.presentation_id).unwrap();
    let bytes = pptx::render_pptx(&doc).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    for number in 1..=5 {
        archive
            .by_name(&format!("ppt/slides/slide{}.xml", number))
            .unwrap();
    }
    assert!(archive.by_name("ppt/slides/slide6.xml").is_err());
    assert!(archive.by_name("ppt/media/image2.png").is_ok());
}

#[tokio::test]
async fn missing_artifact_file_renders_placeholder() {
    let h = harness();
    let outcome = h
        .orchestrator
        .start_run_for_slug("klayout", None, gds_upload())
        .await
        .unwrap();
    let preview = outcome
        .artifacts
        .iter()
        .find(|a| a.kind == ArtifactKind::Image)
        .unwrap();
    std::fs::remove_file(h.root.join(&preview.file_path)).unwrap();

    let config = LauncherConfig::with_media_root(&h.root);
    let presentation = outcome.presentation.unwrap();
    let doc = load_document(h.repo.as_ref(), &config, presentation.presentation_id).unwrap();
    match &doc.slides[0].items[0].content {
        ItemContent::Missing { placeholder } => assert!(placeholder.contains("preview.png")),
        other => panic!("expected placeholder, got {:?}", other),
    }
    assert!(pdf::render_pdf(&doc).is_ok());
    assert!(pptx::render_pptx(&doc).is_ok());
}
