use crate::errors::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct Inner {
    file: File,
    recorded: HashSet<String>,
}

/// Append-only list of symbols the provider had no history for, one per line.
///
/// Appends from concurrent workers are serialized through one handle, and a
/// symbol is written at most once per log instance.
pub struct FailureLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FailureLog {
    /// Open `path` for appending, creating an empty file if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                recorded: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `false` when the symbol was already recorded during this run.
    pub async fn record(&self, symbol: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.recorded.contains(symbol) {
            return Ok(false);
        }
        inner.file.write_all(format!("{}\n", symbol).as_bytes()).await?;
        inner.file.flush().await?;
        inner.recorded.insert(symbol.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbol_not_found.txt");
        let log = FailureLog::open(&path).await.unwrap();
        assert!(log.path().exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_appends_preserve_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbol_not_found.txt");
        std::fs::write(&path, "4001\n").unwrap();

        let log = FailureLog::open(&path).await.unwrap();
        assert!(log.record("2222").await.unwrap());
        assert!(!log.record("2222").await.unwrap());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4001\n2222\n");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbol_not_found.txt");
        let log = Arc::new(FailureLog::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..32 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.record(&format!("SYM{:03}", i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.sort();
        assert_eq!(lines.len(), 32);
        assert!(lines.iter().all(|l| l.len() == 6 && l.starts_with("SYM")));
    }
}
