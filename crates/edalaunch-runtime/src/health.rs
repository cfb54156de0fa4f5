//! Startup health checks for the launcher's storage and media root.

use edalaunch_kernel::LauncherConfig;

use super::sqlite_repository::SqliteLauncherRepository;

/// Opens the SQLite repository and verifies that the media root accepts writes.
/// Returns the opened repository so the server can keep using it.
pub async fn startup_health_check(
    config: &LauncherConfig,
) -> Result<SqliteLauncherRepository, String> {
    let repo = SqliteLauncherRepository::new(&config.sqlite_db_path).map_err(|e| {
        format!(
            "launcher sqlite health check failed for EDALAUNCH_SQLITE_DB='{}': {}",
            config.sqlite_db_path, e
        )
    })?;

    let runs_root = config.runs_root();
    tokio::fs::create_dir_all(&runs_root).await.map_err(|e| {
        format!(
            "launcher media health check failed for EDALAUNCH_MEDIA_ROOT='{}': {}",
            config.media_root.display(),
            e
        )
    })?;
    let scratch = config
        .media_root
        .join(format!(".edalaunch-write-check-{}", uuid::Uuid::new_v4()));
    tokio::fs::write(&scratch, b"ok").await.map_err(|e| {
        format!(
            "launcher media root '{}' is not writable: {}",
            config.media_root.display(),
            e
        )
    })?;
    let _ = tokio::fs::remove_file(&scratch).await;
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use edalaunch_kernel::LauncherConfig;

    use super::startup_health_check;

    #[tokio::test]
    async fn accepts_fresh_media_root_and_database() {
        let root = std::env::temp_dir().join(format!("edalaunch-health-{}", uuid::Uuid::new_v4()));
        let mut config = LauncherConfig::with_media_root(&root);
        config.sqlite_db_path = root.join("launcher.db").to_string_lossy().to_string();
        std::fs::create_dir_all(&root).unwrap();
        startup_health_check(&config)
            .await
            .expect("health check should pass");
        assert!(root.join("runs").is_dir());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn rejects_media_root_that_is_a_file() {
        let file = std::env::temp_dir().join(format!("edalaunch-health-{}", uuid::Uuid::new_v4()));
        std::fs::write(&file, b"not a dir").unwrap();
        let mut config = LauncherConfig::with_media_root(&file);
        config.sqlite_db_path = ":memory:".to_string();
        let err = startup_health_check(&config).await.unwrap_err();
        assert!(err.contains("EDALAUNCH_MEDIA_ROOT"));
        std::fs::remove_file(&file).ok();
    }
}
