//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::warn;

/// Ensure the directories holding the JSON state files exist; warn when the
/// optional static UI directory is missing.
pub async fn ensure_env(ui_dir: &str, state_files: &[&Path]) -> anyhow::Result<()> {
    if tokio::fs::metadata(ui_dir).await.is_err() {
        warn!(%ui_dir, "ui directory not found; static assets will 404");
    }
    for file in state_files {
        let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) else { continue };
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_dirs_of_state_files() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("pc_env_{}", std::process::id()));
        let file = root.join("nested").join("storage.json");
        ensure_env("/nonexistent-ui-dir", &[file.as_path(), Path::new("bare.json")]).await?;
        assert!(tokio::fs::metadata(root.join("nested")).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }
}
