// Filesystem marker writer
use async_trait::async_trait;
use std::io::{Error, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use tenantq_core::port::MarkerWriter;

/// Writes markers as plain files below a base directory
///
/// Marker paths are relative. Absolute paths and `..` segments are rejected
/// so a payload-supplied target cannot escape the base directory.
pub struct FsMarkerWriter {
    base_dir: PathBuf,
}

impl FsMarkerWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of a marker
    pub fn resolve(&self, path: &str) -> std::io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if path.trim().is_empty() || escapes {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Marker path must stay inside the base directory: {}", path),
            ));
        }
        Ok(self.base_dir.join(relative))
    }

    /// Current marker content, `None` if it was never written
    pub async fn read_marker(&self, path: &str) -> std::io::Result<Option<String>> {
        match fs::read_to_string(self.resolve(path)?).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Sibling of `target` that no other write will pick
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

#[async_trait]
impl MarkerWriter for FsMarkerWriter {
    async fn write_marker(&self, path: &str, content: &str) -> std::io::Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never see a half-written marker.
        // Staging names are unique per write; concurrent workers share targets.
        let staging = staging_path(&target);
        fs::write(&staging, content).await?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        debug!(path = %target.display(), bytes = content.len(), "Marker written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_writer() -> FsMarkerWriter {
        let dir = std::env::temp_dir().join(format!("tenantq-markers-{}", uuid::Uuid::new_v4()));
        FsMarkerWriter::new(dir)
    }

    #[tokio::test]
    async fn test_write_replaces_content() {
        let writer = temp_writer();
        assert_eq!(writer.read_marker("jobprocessed_context").await.unwrap(), None);

        writer.write_marker("jobprocessed_context", "tenant_acme").await.unwrap();
        writer.write_marker("jobprocessed_context", "central").await.unwrap();

        assert_eq!(
            writer.read_marker("jobprocessed_context").await.unwrap().as_deref(),
            Some("central")
        );
        let _ = std::fs::remove_dir_all(writer.base_dir());
    }

    #[tokio::test]
    async fn test_nested_path_creates_directories() {
        let writer = temp_writer();
        writer.write_marker("logs/abc_value", "1").await.unwrap();
        assert!(writer.base_dir().join("logs").join("abc_value").exists());
        let _ = std::fs::remove_dir_all(writer.base_dir());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_marker_all_succeed() {
        let writer = std::sync::Arc::new(temp_writer());

        let tasks: Vec<_> = (0..8)
            .map(|task| {
                let writer = writer.clone();
                tokio::spawn(async move {
                    for n in 0..200 {
                        let content = format!("tenant_{}_{}", task, n);
                        writer
                            .write_marker("jobprocessed_context", &content)
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // last write wins and is never torn
        let last = writer
            .read_marker("jobprocessed_context")
            .await
            .unwrap()
            .unwrap();
        assert!(last.starts_with("tenant_") && last.ends_with("_199"), "{}", last);

        // no staging files left behind
        let leftovers: Vec<_> = std::fs::read_dir(writer.base_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = std::fs::remove_dir_all(writer.base_dir());
    }

    #[tokio::test]
    async fn test_escaping_paths_rejected() {
        let writer = temp_writer();
        for path in ["../outside", "/etc/passwd", "", "a/../../b"] {
            let err = writer.write_marker(path, "x").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "path {:?}", path);
        }
    }
}
