//! Spool directory source
//!
//! Reads order messages from `*.json` files dropped into a directory by an
//! upstream producer. Files are delivered in name order; committing a message
//! deletes its file. A file that was fetched but never committed is not handed
//! out again by this instance, but is picked up again after a restart.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::{OrderSource, SourceMessage};
use crate::error::Result;

const SPOOL_EXTENSION: &str = "json";

/// Order source backed by a spool directory.
#[derive(Debug)]
pub struct SpoolDirectorySource {
    dir: PathBuf,
    /// Files listed by the last scan, not yet delivered
    pending: Mutex<VecDeque<String>>,
    /// Files delivered and not yet committed
    delivered: Mutex<HashSet<String>>,
}

impl SpoolDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Mutex::new(VecDeque::new()),
            delivered: Mutex::new(HashSet::new()),
        }
    }

    /// Create the spool directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn scan(&self) -> Result<()> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SPOOL_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();

        let delivered = self.delivered.lock();
        let mut pending = self.pending.lock();
        pending.extend(names.into_iter().filter(|n| !delivered.contains(n)));
        Ok(())
    }

    fn next_pending(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }
}

#[async_trait]
impl OrderSource for SpoolDirectorySource {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn fetch(&self) -> Result<Option<SourceMessage>> {
        if self.pending.lock().is_empty() {
            self.scan().await?;
        }

        while let Some(name) = self.next_pending() {
            match tokio::fs::read(self.dir.join(&name)).await {
                Ok(payload) => {
                    self.delivered.lock().insert(name.clone());
                    debug!(file = %name, bytes = payload.len(), "Fetched spool message");
                    return Ok(Some(SourceMessage { id: name, payload }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(file = %name, "Spool file vanished before it was read");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    async fn commit(&self, message: &SourceMessage) -> Result<()> {
        match tokio::fs::remove_file(self.dir.join(&message.id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.delivered.lock().remove(&message.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_json_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002.json"), b"second").unwrap();
        std::fs::write(dir.path().join("001.json"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let source = SpoolDirectorySource::new(dir.path());

        let first = source.fetch().await.unwrap().unwrap();
        let second = source.fetch().await.unwrap().unwrap();
        assert_eq!(first.id, "001.json");
        assert_eq!(first.payload, b"first");
        assert_eq!(second.id, "002.json");
        assert!(source.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("001.json"), b"{}").unwrap();

        let source = SpoolDirectorySource::new(dir.path());
        let message = source.fetch().await.unwrap().unwrap();
        source.commit(&message).await.unwrap();

        assert!(!dir.path().join("001.json").exists());
        assert!(source.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uncommitted_file_redelivered_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("001.json"), b"{}").unwrap();

        let source = SpoolDirectorySource::new(dir.path());
        let message = source.fetch().await.unwrap().unwrap();
        assert!(source.fetch().await.unwrap().is_none());

        let restarted = SpoolDirectorySource::new(dir.path());
        assert_eq!(restarted.fetch().await.unwrap(), Some(message));
    }

    #[tokio::test]
    async fn test_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = SpoolDirectorySource::new(dir.path().join("spool"));
        source.ensure_dir().await.unwrap();
        assert!(source.fetch().await.unwrap().is_none());

        std::fs::write(source.dir().join("later.json"), b"{}").unwrap();
        assert_eq!(source.fetch().await.unwrap().unwrap().id, "later.json");
    }
}
