// Marker Writer Port (filesystem collaborator)

use async_trait::async_trait;

/// Writes small text markers to named locations
#[async_trait]
pub trait MarkerWriter: Send + Sync {
    /// Replace the content at `path` with `content`
    async fn write_marker(&self, path: &str, content: &str) -> std::io::Result<()>;
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every write; can be switched into a failing mode
    #[derive(Default)]
    pub struct RecordingMarkerWriter {
        writes: Mutex<Vec<(String, String)>>,
        failing: AtomicBool,
    }

    impl RecordingMarkerWriter {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn writes(&self) -> Vec<(String, String)> {
            self.writes.lock().unwrap().clone()
        }

        pub fn last(&self, path: &str) -> Option<String> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(p, _)| p == path)
                .map(|(_, c)| c.clone())
        }
    }

    #[async_trait]
    impl MarkerWriter for RecordingMarkerWriter {
        async fn write_marker(&self, path: &str, content: &str) -> std::io::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("marker target {} not writable", path),
                ));
            }
            self.writes
                .lock()
                .unwrap()
                .push((path.to_string(), content.to_string()));
            Ok(())
        }
    }
}
