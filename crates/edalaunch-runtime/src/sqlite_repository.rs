//! SQLite-backed launcher repository.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;

use edalaunch_kernel::{
    ArtifactId, ArtifactKind, ArtifactRecord, LauncherError, NewArtifact, NewPresentation,
    NewSlideItem, NewTool, PresentationId, PresentationRecord, RunCompletion, RunId, RunRecord,
    RunStatus, SlideId, SlideItemKind, SlideItemRecord, SlideRecord, TemplateRecord, ThemeRecord,
    ToolRecord, ToolType,
};

use super::repository::LauncherRepository;

const TOOL_COLUMNS: &str = "tool_id, name, slug, category, description, tool_type, \
     linux_executable_path, windows_executable_path, web_url, env_template_json, visible";
const RUN_COLUMNS: &str = "run_id, tool_id, tool_slug, user_name, input_name, run_dir, status, \
     created_at_ms, completed_at_ms, stdout, stderr, exit_code, timed_out";
const ARTIFACT_COLUMNS: &str =
    "artifact_id, run_id, kind, name, file_path, size_bytes, sha256, created_at_ms";
const PRESENTATION_COLUMNS: &str = "presentation_id, title, description, creator, run_id, \
     template_key, theme_key, created_at_ms";
const SLIDE_COLUMNS: &str = "slide_id, presentation_id, title, slide_order, created_at_ms";
const SLIDE_ITEM_COLUMNS: &str =
    "item_id, slide_id, artifact_id, kind, display_config_json, added_by, created_at_ms";

#[derive(Clone, Debug)]
pub struct SqliteLauncherRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLauncherRepository {
    pub fn new(db_path: &str) -> Result<Self, LauncherError> {
        let conn = Connection::open(db_path)
            .map_err(|e| LauncherError::Storage(format!("open sqlite launcher repo: {}", e)))?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LauncherError> {
        self.conn
            .lock()
            .map_err(|_| LauncherError::Storage("sqlite launcher repo lock poisoned".to_string()))
    }

    fn ensure_schema(&self) -> Result<(), LauncherError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS tools (
              tool_id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              slug TEXT NOT NULL UNIQUE,
              category TEXT NOT NULL,
              description TEXT NOT NULL,
              tool_type TEXT NOT NULL,
              linux_executable_path TEXT NOT NULL,
              windows_executable_path TEXT NOT NULL,
              env_template_json TEXT NOT NULL,
              visible INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS runs (
              run_id TEXT PRIMARY KEY,
              tool_id INTEGER NOT NULL REFERENCES tools(tool_id),
              tool_slug TEXT NOT NULL,
              user_name TEXT NULL,
              input_name TEXT NOT NULL,
              run_dir TEXT NOT NULL,
              status TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              completed_at_ms INTEGER NULL,
              stdout TEXT NOT NULL DEFAULT '',
              stderr TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS artifacts (
              artifact_id INTEGER PRIMARY KEY AUTOINCREMENT,
              run_id TEXT NOT NULL REFERENCES runs(run_id),
              kind TEXT NOT NULL,
              name TEXT NOT NULL,
              file_path TEXT NOT NULL,
              size_bytes INTEGER NOT NULL,
              sha256 TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              UNIQUE(run_id, file_path)
            );
            CREATE TABLE IF NOT EXISTS presentation_templates (
              key TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              description TEXT NOT NULL,
              base_layout TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS presentation_themes (
              key TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              css_class TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS presentations (
              presentation_id INTEGER PRIMARY KEY AUTOINCREMENT,
              title TEXT NOT NULL,
              description TEXT NULL,
              creator TEXT NULL,
              run_id TEXT NULL UNIQUE REFERENCES runs(run_id),
              template_key TEXT NOT NULL,
              theme_key TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS slides (
              slide_id INTEGER PRIMARY KEY AUTOINCREMENT,
              presentation_id INTEGER NOT NULL REFERENCES presentations(presentation_id),
              title TEXT NOT NULL,
              slide_order INTEGER NOT NULL,
              created_at_ms INTEGER NOT NULL,
              UNIQUE(presentation_id, title)
            );
            CREATE TABLE IF NOT EXISTS slide_items (
              item_id INTEGER PRIMARY KEY AUTOINCREMENT,
              slide_id INTEGER NOT NULL REFERENCES slides(slide_id),
              artifact_id INTEGER NOT NULL REFERENCES artifacts(artifact_id),
              kind TEXT NOT NULL,
              display_config_json TEXT NULL,
              added_by TEXT NULL,
              created_at_ms INTEGER NOT NULL,
              UNIQUE(slide_id, artifact_id)
            );
            CREATE INDEX IF NOT EXISTS idx_runs_created ON runs(created_at_ms DESC);
            CREATE INDEX IF NOT EXISTS idx_artifacts_run ON artifacts(run_id, artifact_id);
            CREATE INDEX IF NOT EXISTS idx_slides_presentation_order ON slides(presentation_id, slide_order, slide_id);
            CREATE INDEX IF NOT EXISTS idx_slide_items_slide ON slide_items(slide_id, item_id);
            "#,
        )
        .map_err(|e| LauncherError::Storage(format!("init sqlite launcher schema: {}", e)))?;
        // Columns added after the first schema; older local files get them here.
        add_column_if_missing(&conn, "tools", "web_url", "TEXT NULL")?;
        add_column_if_missing(&conn, "runs", "exit_code", "INTEGER NULL")?;
        add_column_if_missing(&conn, "runs", "timed_out", "INTEGER NOT NULL DEFAULT 0")?;
        Ok(())
    }
}

impl LauncherRepository for SqliteLauncherRepository {
    fn seed_tool(&self, tool: &NewTool) -> Result<ToolRecord, LauncherError> {
        let env_json = serde_json::to_string(&tool.env_template)
            .map_err(|e| LauncherError::InvalidInput(format!("tool env template: {}", e)))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO tools
             (name, slug, category, description, tool_type, linux_executable_path,
              windows_executable_path, web_url, env_template_json, visible)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
            params![
                tool.name,
                tool.slug,
                tool.category,
                tool.description,
                tool.tool_type.as_str(),
                tool.linux_executable_path,
                tool.windows_executable_path,
                tool.web_url,
                env_json
            ],
        )
        .map_err(|e| LauncherError::Storage(format!("seed tool: {}", e)))?;
        select_tool_by_slug(&conn, &tool.slug)?.ok_or_else(|| {
            LauncherError::Storage(format!("seeded tool missing after insert: {}", tool.slug))
        })
    }

    fn list_tools(&self, include_hidden: bool) -> Result<Vec<ToolRecord>, LauncherError> {
        let conn = self.conn()?;
        let sql = if include_hidden {
            format!("SELECT {} FROM tools ORDER BY category, name", TOOL_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM tools WHERE visible = 1 ORDER BY category, name",
                TOOL_COLUMNS
            )
        };
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LauncherError::Storage(format!("prepare list tools: {}", e)))?;
        let rows = stmt
            .query_map([], tool_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list tools: {}", e)))?;
        collect_rows(rows)
    }

    fn get_tool_by_slug(&self, slug: &str) -> Result<Option<ToolRecord>, LauncherError> {
        let conn = self.conn()?;
        select_tool_by_slug(&conn, slug)
    }

    fn seed_template(&self, template: &TemplateRecord) -> Result<bool, LauncherError> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO presentation_templates (key, name, description, base_layout)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    template.key,
                    template.name,
                    template.description,
                    template.base_layout
                ],
            )
            .map_err(|e| LauncherError::Storage(format!("seed template: {}", e)))?;
        Ok(inserted > 0)
    }

    fn seed_theme(&self, theme: &ThemeRecord) -> Result<bool, LauncherError> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO presentation_themes (key, name, css_class)
                 VALUES (?1, ?2, ?3)",
                params![theme.key, theme.name, theme.css_class],
            )
            .map_err(|e| LauncherError::Storage(format!("seed theme: {}", e)))?;
        Ok(inserted > 0)
    }

    fn get_template(&self, key: &str) -> Result<Option<TemplateRecord>, LauncherError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT key, name, description, base_layout FROM presentation_templates WHERE key = ?1",
            params![key],
            template_from_row,
        )
        .optional()
        .map_err(|e| LauncherError::Storage(format!("get template: {}", e)))
    }

    fn get_theme(&self, key: &str) -> Result<Option<ThemeRecord>, LauncherError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT key, name, css_class FROM presentation_themes WHERE key = ?1",
            params![key],
            theme_from_row,
        )
        .optional()
        .map_err(|e| LauncherError::Storage(format!("get theme: {}", e)))
    }

    fn list_templates(&self) -> Result<Vec<TemplateRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT key, name, description, base_layout FROM presentation_templates ORDER BY key",
            )
            .map_err(|e| LauncherError::Storage(format!("prepare list templates: {}", e)))?;
        let rows = stmt
            .query_map([], template_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list templates: {}", e)))?;
        collect_rows(rows)
    }

    fn list_themes(&self) -> Result<Vec<ThemeRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, name, css_class FROM presentation_themes ORDER BY key")
            .map_err(|e| LauncherError::Storage(format!("prepare list themes: {}", e)))?;
        let rows = stmt
            .query_map([], theme_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list themes: {}", e)))?;
        collect_rows(rows)
    }

    fn insert_run(&self, run: &RunRecord) -> Result<(), LauncherError> {
        let conn = self.conn()?;
        match conn.execute(
            "INSERT INTO runs
             (run_id, tool_id, tool_slug, user_name, input_name, run_dir, status,
              created_at_ms, completed_at_ms, stdout, stderr, exit_code, timed_out)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                run.run_id,
                run.tool_id,
                run.tool_slug,
                run.user,
                run.input_name,
                run.run_dir,
                run.status.as_str(),
                dt_to_ms(run.created_at),
                run.completed_at.map(dt_to_ms),
                run.stdout,
                run.stderr,
                run.exit_code,
                run.timed_out
            ],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(LauncherError::Conflict(format!(
                    "run already exists or references an unknown tool: {}",
                    run.run_id
                )))
            }
            Err(e) => Err(LauncherError::Storage(format!("insert run: {}", e))),
        }
    }

    fn finish_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        completion: &RunCompletion,
        completed_at: DateTime<Utc>,
    ) -> Result<RunRecord, LauncherError> {
        if !status.is_terminal() {
            return Err(LauncherError::InvalidInput(format!(
                "run {} cannot finish with status {}",
                run_id,
                status.as_str()
            )));
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin finish run tx: {}", e)))?;
        let updated = tx
            .execute(
                "UPDATE runs
                 SET status = ?2, completed_at_ms = ?3, stdout = ?4, stderr = ?5,
                     exit_code = ?6, timed_out = ?7
                 WHERE run_id = ?1 AND status = 'running'",
                params![
                    run_id,
                    status.as_str(),
                    dt_to_ms(completed_at),
                    completion.stdout,
                    completion.stderr,
                    completion.exit_code,
                    completion.timed_out
                ],
            )
            .map_err(|e| LauncherError::Storage(format!("finish run: {}", e)))?;
        if updated == 0 {
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM runs WHERE run_id = ?1",
                    params![run_id],
                    |r| r.get(0),
                )
                .optional()
                .map_err(|e| LauncherError::Storage(format!("read run status: {}", e)))?;
            return Err(match current {
                Some(current) => LauncherError::Conflict(format!(
                    "run {} already finished with status {}",
                    run_id, current
                )),
                None => LauncherError::NotFound(format!("run {}", run_id)),
            });
        }
        let run = select_run(&tx, run_id)?
            .ok_or_else(|| LauncherError::NotFound(format!("run {}", run_id)))?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit finish run tx: {}", e)))?;
        Ok(run)
    }

    fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, LauncherError> {
        let conn = self.conn()?;
        select_run(&conn, run_id)
    }

    fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM runs ORDER BY created_at_ms DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                RUN_COLUMNS
            ))
            .map_err(|e| LauncherError::Storage(format!("prepare list runs: {}", e)))?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], run_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list runs: {}", e)))?;
        collect_rows(rows)
    }

    fn register_artifact(&self, artifact: &NewArtifact) -> Result<ArtifactRecord, LauncherError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO artifacts
             (run_id, kind, name, file_path, size_bytes, sha256, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                artifact.run_id,
                artifact.kind.as_str(),
                artifact.name,
                artifact.file_path,
                artifact.size_bytes as i64,
                artifact.sha256,
                dt_to_ms(Utc::now())
            ],
        )
        .map_err(|e| LauncherError::Storage(format!("register artifact: {}", e)))?;
        conn.query_row(
            &format!(
                "SELECT {} FROM artifacts WHERE run_id = ?1 AND file_path = ?2",
                ARTIFACT_COLUMNS
            ),
            params![artifact.run_id, artifact.file_path],
            artifact_from_row,
        )
        .map_err(|e| LauncherError::Storage(format!("read registered artifact: {}", e)))
    }

    fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<ArtifactRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM artifacts WHERE run_id = ?1 ORDER BY artifact_id",
                ARTIFACT_COLUMNS
            ))
            .map_err(|e| LauncherError::Storage(format!("prepare list artifacts: {}", e)))?;
        let rows = stmt
            .query_map(params![run_id], artifact_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list artifacts: {}", e)))?;
        collect_rows(rows)
    }

    fn get_artifact(
        &self,
        artifact_id: ArtifactId,
    ) -> Result<Option<ArtifactRecord>, LauncherError> {
        let conn = self.conn()?;
        select_artifact(&conn, artifact_id)
    }

    fn get_or_create_run_presentation(
        &self,
        presentation: &NewPresentation,
        initial_slides: &[(&str, i64)],
    ) -> Result<(PresentationRecord, bool), LauncherError> {
        let run_id = presentation.run_id.as_ref().ok_or_else(|| {
            LauncherError::InvalidInput("run presentation requires a run id".to_string())
        })?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| LauncherError::Storage(format!("begin run presentation tx: {}", e)))?;
        if let Some(existing) = select_presentation_for_run(&tx, run_id)? {
            tx.commit().map_err(|e| {
                LauncherError::Storage(format!("commit run presentation tx: {}", e))
            })?;
            return Ok((existing, false));
        }
        if !key_exists(&tx, "presentation_templates", &presentation.template_key)? {
            return Err(LauncherError::Configuration(format!(
                "presentation template '{}' is not seeded",
                presentation.template_key
            )));
        }
        if !key_exists(&tx, "presentation_themes", &presentation.theme_key)? {
            return Err(LauncherError::Configuration(format!(
                "presentation theme '{}' is not seeded",
                presentation.theme_key
            )));
        }
        let now = dt_to_ms(Utc::now());
        let presentation_id = insert_presentation(&tx, presentation, now)?;
        for (title, order) in initial_slides {
            tx.execute(
                "INSERT INTO slides (presentation_id, title, slide_order, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4)",
                params![presentation_id, title, order, now],
            )
            .map_err(|e| LauncherError::Storage(format!("insert initial slide: {}", e)))?;
        }
        let created = select_presentation(&tx, presentation_id)?.ok_or_else(|| {
            LauncherError::Storage(format!("presentation {} missing after insert", presentation_id))
        })?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit run presentation tx: {}", e)))?;
        Ok((created, true))
    }

    fn create_presentation(
        &self,
        presentation: &NewPresentation,
    ) -> Result<PresentationRecord, LauncherError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin create presentation tx: {}", e)))?;
        ensure_style_keys(&tx, &presentation.template_key, &presentation.theme_key)?;
        if let Some(run_id) = &presentation.run_id {
            if select_run(&tx, run_id)?.is_none() {
                return Err(LauncherError::NotFound(format!("run {}", run_id)));
            }
        }
        let presentation_id = insert_presentation(&tx, presentation, dt_to_ms(Utc::now()))?;
        let created = select_presentation(&tx, presentation_id)?.ok_or_else(|| {
            LauncherError::Storage(format!("presentation {} missing after insert", presentation_id))
        })?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit create presentation tx: {}", e)))?;
        Ok(created)
    }

    fn get_presentation(
        &self,
        presentation_id: PresentationId,
    ) -> Result<Option<PresentationRecord>, LauncherError> {
        let conn = self.conn()?;
        select_presentation(&conn, presentation_id)
    }

    fn get_presentation_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Option<PresentationRecord>, LauncherError> {
        let conn = self.conn()?;
        select_presentation_for_run(&conn, run_id)
    }

    fn update_presentation_style(
        &self,
        presentation_id: PresentationId,
        template_key: &str,
        theme_key: &str,
    ) -> Result<PresentationRecord, LauncherError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin update style tx: {}", e)))?;
        ensure_style_keys(&tx, template_key, theme_key)?;
        let updated = tx
            .execute(
                "UPDATE presentations SET template_key = ?2, theme_key = ?3
                 WHERE presentation_id = ?1",
                params![presentation_id, template_key, theme_key],
            )
            .map_err(|e| LauncherError::Storage(format!("update presentation style: {}", e)))?;
        if updated == 0 {
            return Err(LauncherError::NotFound(format!(
                "presentation {}",
                presentation_id
            )));
        }
        let presentation = select_presentation(&tx, presentation_id)?
            .ok_or_else(|| LauncherError::NotFound(format!("presentation {}", presentation_id)))?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit update style tx: {}", e)))?;
        Ok(presentation)
    }

    fn list_slides(
        &self,
        presentation_id: PresentationId,
    ) -> Result<Vec<SlideRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM slides WHERE presentation_id = ?1 ORDER BY slide_order, slide_id",
                SLIDE_COLUMNS
            ))
            .map_err(|e| LauncherError::Storage(format!("prepare list slides: {}", e)))?;
        let rows = stmt
            .query_map(params![presentation_id], slide_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list slides: {}", e)))?;
        collect_rows(rows)
    }

    fn get_slide(&self, slide_id: SlideId) -> Result<Option<SlideRecord>, LauncherError> {
        let conn = self.conn()?;
        select_slide(&conn, slide_id)
    }

    fn ensure_slide(
        &self,
        presentation_id: PresentationId,
        title: &str,
        order: i64,
    ) -> Result<SlideRecord, LauncherError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin ensure slide tx: {}", e)))?;
        if let Some(existing) = select_slide_by_title(&tx, presentation_id, title)? {
            tx.commit()
                .map_err(|e| LauncherError::Storage(format!("commit ensure slide tx: {}", e)))?;
            return Ok(existing);
        }
        if select_presentation(&tx, presentation_id)?.is_none() {
            return Err(LauncherError::NotFound(format!(
                "presentation {}",
                presentation_id
            )));
        }
        let slide = insert_slide(&tx, presentation_id, title, order)?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit ensure slide tx: {}", e)))?;
        Ok(slide)
    }

    fn append_slide(
        &self,
        presentation_id: PresentationId,
        title: &str,
    ) -> Result<SlideRecord, LauncherError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin append slide tx: {}", e)))?;
        if select_presentation(&tx, presentation_id)?.is_none() {
            return Err(LauncherError::NotFound(format!(
                "presentation {}",
                presentation_id
            )));
        }
        if select_slide_by_title(&tx, presentation_id, title)?.is_some() {
            return Err(LauncherError::Conflict(format!(
                "presentation {} already has a slide titled '{}'",
                presentation_id, title
            )));
        }
        let last_order: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(slide_order), 0) FROM slides WHERE presentation_id = ?1",
                params![presentation_id],
                |r| r.get(0),
            )
            .map_err(|e| LauncherError::Storage(format!("read last slide order: {}", e)))?;
        let slide = insert_slide(&tx, presentation_id, title, last_order + 1)?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit append slide tx: {}", e)))?;
        Ok(slide)
    }

    fn add_slide_item(
        &self,
        item: &NewSlideItem,
    ) -> Result<(SlideItemRecord, bool), LauncherError> {
        let display_json = match &item.display_config {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| {
                LauncherError::InvalidInput(format!("slide item display config: {}", e))
            })?),
            None => None,
        };
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| LauncherError::Storage(format!("begin add slide item tx: {}", e)))?;
        let slide = select_slide(&tx, item.slide_id)?
            .ok_or_else(|| LauncherError::NotFound(format!("slide {}", item.slide_id)))?;
        let presentation = select_presentation(&tx, slide.presentation_id)?.ok_or_else(|| {
            LauncherError::NotFound(format!("presentation {}", slide.presentation_id))
        })?;
        let artifact = select_artifact(&tx, item.artifact_id)?
            .ok_or_else(|| LauncherError::NotFound(format!("artifact {}", item.artifact_id)))?;
        if let Some(run_id) = &presentation.run_id {
            if run_id != &artifact.run_id {
                return Err(LauncherError::Conflict(format!(
                    "artifact {} belongs to run {} but presentation {} summarizes run {}",
                    artifact.artifact_id, artifact.run_id, presentation.presentation_id, run_id
                )));
            }
        }
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO slide_items
                 (slide_id, artifact_id, kind, display_config_json, added_by, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.slide_id,
                    item.artifact_id,
                    item.kind.as_str(),
                    display_json,
                    item.added_by,
                    dt_to_ms(Utc::now())
                ],
            )
            .map_err(|e| LauncherError::Storage(format!("insert slide item: {}", e)))?;
        let stored = tx
            .query_row(
                &format!(
                    "SELECT {} FROM slide_items WHERE slide_id = ?1 AND artifact_id = ?2",
                    SLIDE_ITEM_COLUMNS
                ),
                params![item.slide_id, item.artifact_id],
                slide_item_from_row,
            )
            .map_err(|e| LauncherError::Storage(format!("read slide item: {}", e)))?;
        tx.commit()
            .map_err(|e| LauncherError::Storage(format!("commit add slide item tx: {}", e)))?;
        Ok((stored, inserted > 0))
    }

    fn list_slide_items(&self, slide_id: SlideId) -> Result<Vec<SlideItemRecord>, LauncherError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM slide_items WHERE slide_id = ?1 ORDER BY item_id",
                SLIDE_ITEM_COLUMNS
            ))
            .map_err(|e| LauncherError::Storage(format!("prepare list slide items: {}", e)))?;
        let rows = stmt
            .query_map(params![slide_id], slide_item_from_row)
            .map_err(|e| LauncherError::Storage(format!("query list slide items: {}", e)))?;
        collect_rows(rows)
    }
}

fn select_tool_by_slug(conn: &Connection, slug: &str) -> Result<Option<ToolRecord>, LauncherError> {
    conn.query_row(
        &format!("SELECT {} FROM tools WHERE slug = ?1", TOOL_COLUMNS),
        params![slug],
        tool_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get tool by slug: {}", e)))
}

fn select_run(conn: &Connection, run_id: &str) -> Result<Option<RunRecord>, LauncherError> {
    conn.query_row(
        &format!("SELECT {} FROM runs WHERE run_id = ?1", RUN_COLUMNS),
        params![run_id],
        run_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get run: {}", e)))
}

fn select_artifact(
    conn: &Connection,
    artifact_id: ArtifactId,
) -> Result<Option<ArtifactRecord>, LauncherError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM artifacts WHERE artifact_id = ?1",
            ARTIFACT_COLUMNS
        ),
        params![artifact_id],
        artifact_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get artifact: {}", e)))
}

fn select_presentation(
    conn: &Connection,
    presentation_id: PresentationId,
) -> Result<Option<PresentationRecord>, LauncherError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM presentations WHERE presentation_id = ?1",
            PRESENTATION_COLUMNS
        ),
        params![presentation_id],
        presentation_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get presentation: {}", e)))
}

fn select_presentation_for_run(
    conn: &Connection,
    run_id: &str,
) -> Result<Option<PresentationRecord>, LauncherError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM presentations WHERE run_id = ?1",
            PRESENTATION_COLUMNS
        ),
        params![run_id],
        presentation_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get presentation for run: {}", e)))
}

fn select_slide(conn: &Connection, slide_id: SlideId) -> Result<Option<SlideRecord>, LauncherError> {
    conn.query_row(
        &format!("SELECT {} FROM slides WHERE slide_id = ?1", SLIDE_COLUMNS),
        params![slide_id],
        slide_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get slide: {}", e)))
}

fn select_slide_by_title(
    conn: &Connection,
    presentation_id: PresentationId,
    title: &str,
) -> Result<Option<SlideRecord>, LauncherError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM slides WHERE presentation_id = ?1 AND title = ?2",
            SLIDE_COLUMNS
        ),
        params![presentation_id, title],
        slide_from_row,
    )
    .optional()
    .map_err(|e| LauncherError::Storage(format!("get slide by title: {}", e)))
}

fn insert_presentation(
    conn: &Connection,
    presentation: &NewPresentation,
    created_at_ms: i64,
) -> Result<PresentationId, LauncherError> {
    match conn.execute(
        "INSERT INTO presentations
         (title, description, creator, run_id, template_key, theme_key, created_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            presentation.title,
            presentation.description,
            presentation.creator,
            presentation.run_id,
            presentation.template_key,
            presentation.theme_key,
            created_at_ms
        ],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(LauncherError::Conflict(format!(
                "run {} already has a presentation",
                presentation.run_id.as_deref().unwrap_or("-")
            )))
        }
        Err(e) => Err(LauncherError::Storage(format!("insert presentation: {}", e))),
    }
}

fn insert_slide(
    conn: &Connection,
    presentation_id: PresentationId,
    title: &str,
    order: i64,
) -> Result<SlideRecord, LauncherError> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO slides (presentation_id, title, slide_order, created_at_ms)
         VALUES (?1, ?2, ?3, ?4)",
        params![presentation_id, title, order, dt_to_ms(created_at)],
    )
    .map_err(|e| LauncherError::Storage(format!("insert slide: {}", e)))?;
    Ok(SlideRecord {
        slide_id: conn.last_insert_rowid(),
        presentation_id,
        title: title.to_string(),
        order,
        created_at: ms_to_dt(dt_to_ms(created_at)),
    })
}

fn key_exists(conn: &Connection, table: &str, key: &str) -> Result<bool, LauncherError> {
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE key = ?1", table),
            params![key],
            |r| r.get(0),
        )
        .map_err(|e| LauncherError::Storage(format!("lookup {} key: {}", table, e)))?;
    Ok(count > 0)
}

fn ensure_style_keys(
    conn: &Connection,
    template_key: &str,
    theme_key: &str,
) -> Result<(), LauncherError> {
    if !key_exists(conn, "presentation_templates", template_key)? {
        return Err(LauncherError::InvalidInput(format!(
            "unknown presentation template: {}",
            template_key
        )));
    }
    if !key_exists(conn, "presentation_themes", theme_key)? {
        return Err(LauncherError::InvalidInput(format!(
            "unknown presentation theme: {}",
            theme_key
        )));
    }
    Ok(())
}

fn tool_from_row(row: &Row<'_>) -> rusqlite::Result<ToolRecord> {
    let env_json: String = row.get(9)?;
    let env_template: Value = serde_json::from_str(&env_json)
        .map_err(|e| invalid_column(9, format!("tool env template: {}", e)))?;
    Ok(ToolRecord {
        tool_id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        tool_type: ToolType::parse(&row.get::<_, String>(5)?),
        linux_executable_path: row.get(6)?,
        windows_executable_path: row.get(7)?,
        web_url: row.get(8)?,
        env_template,
        visible: row.get(10)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(6)?;
    let status = RunStatus::parse(&status)
        .ok_or_else(|| invalid_column(6, format!("unknown run status: {}", status)))?;
    Ok(RunRecord {
        run_id: row.get(0)?,
        tool_id: row.get(1)?,
        tool_slug: row.get(2)?,
        user: row.get(3)?,
        input_name: row.get(4)?,
        run_dir: row.get(5)?,
        status,
        created_at: ms_to_dt(row.get(7)?),
        completed_at: row.get::<_, Option<i64>>(8)?.map(ms_to_dt),
        stdout: row.get(9)?,
        stderr: row.get(10)?,
        exit_code: row.get(11)?,
        timed_out: row.get(12)?,
    })
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    let kind: String = row.get(2)?;
    let kind = ArtifactKind::parse(&kind)
        .ok_or_else(|| invalid_column(2, format!("unknown artifact kind: {}", kind)))?;
    Ok(ArtifactRecord {
        artifact_id: row.get(0)?,
        run_id: row.get(1)?,
        kind,
        name: row.get(3)?,
        file_path: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)?.max(0) as u64,
        sha256: row.get(6)?,
        created_at: ms_to_dt(row.get(7)?),
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateRecord> {
    Ok(TemplateRecord {
        key: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        base_layout: row.get(3)?,
    })
}

fn theme_from_row(row: &Row<'_>) -> rusqlite::Result<ThemeRecord> {
    Ok(ThemeRecord {
        key: row.get(0)?,
        name: row.get(1)?,
        css_class: row.get(2)?,
    })
}

fn presentation_from_row(row: &Row<'_>) -> rusqlite::Result<PresentationRecord> {
    Ok(PresentationRecord {
        presentation_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        creator: row.get(3)?,
        run_id: row.get(4)?,
        template_key: row.get(5)?,
        theme_key: row.get(6)?,
        created_at: ms_to_dt(row.get(7)?),
    })
}

fn slide_from_row(row: &Row<'_>) -> rusqlite::Result<SlideRecord> {
    Ok(SlideRecord {
        slide_id: row.get(0)?,
        presentation_id: row.get(1)?,
        title: row.get(2)?,
        order: row.get(3)?,
        created_at: ms_to_dt(row.get(4)?),
    })
}

fn slide_item_from_row(row: &Row<'_>) -> rusqlite::Result<SlideItemRecord> {
    let kind: String = row.get(3)?;
    let kind = SlideItemKind::parse(&kind)
        .ok_or_else(|| invalid_column(3, format!("unknown slide item kind: {}", kind)))?;
    let display_config = match row.get::<_, Option<String>>(4)? {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| invalid_column(4, format!("slide item display config: {}", e)))?,
        ),
        None => None,
    };
    Ok(SlideItemRecord {
        item_id: row.get(0)?,
        slide_id: row.get(1)?,
        artifact_id: row.get(2)?,
        kind,
        display_config,
        added_by: row.get(5)?,
        created_at: ms_to_dt(row.get(6)?),
    })
}

fn collect_rows<T, I>(rows: I) -> Result<Vec<T>, LauncherError>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(map_rusqlite_err)?);
    }
    Ok(out)
}

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn dt_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn ms_to_dt(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
}

fn map_rusqlite_err(err: rusqlite::Error) -> LauncherError {
    LauncherError::Storage(format!("sqlite launcher repo: {}", err))
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    column_def: &str,
) -> Result<(), LauncherError> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn
        .prepare(&pragma)
        .map_err(|e| LauncherError::Storage(format!("prepare table_info {}: {}", table, e)))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| LauncherError::Storage(format!("query table_info {}: {}", table, e)))?;
    for col in cols {
        let name = col.map_err(map_rusqlite_err)?;
        if name == column {
            return Ok(());
        }
    }
    let alter = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
    conn.execute(&alter, []).map_err(|e| {
        LauncherError::Storage(format!("alter table {} add {}: {}", table, column, e))
    })?;
    Ok(())
}
