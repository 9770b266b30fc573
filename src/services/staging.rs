//! Local staging of uploaded bytes for the duration of one request.
//!
//! A [`StagedFile`] owns its path. Deletion happens once, through
//! [`StagedFile::release`], or on drop if the owner never got that far
//! (panic, cancelled request). Releasing twice, or releasing a file that has
//! already disappeared, is a no-op.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to remove staged file {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("failed to read upload body: {0}")]
    Body(String),
}

#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    original_filename: String,
    size: u64,
    created_at: DateTime<Utc>,
    guard: Option<TempPath>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    /// Deletes the staged file, logging rather than returning any failure.
    pub async fn release(&mut self) {
        if let Err(e) = self.try_release().await {
            tracing::warn!("⚠️  {}", e);
        }
    }

    /// Deletes the staged file. Only the first call touches the filesystem;
    /// a file that is already gone counts as released.
    pub async fn try_release(&mut self) -> Result<(), CleanupError> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };

        let result = tokio::task::spawn_blocking(move || guard.close())
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)));

        match result {
            Ok(()) => {
                tracing::debug!("🧹 Removed staged file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Staged file {} was already gone", self.path.display());
                Ok(())
            }
            Err(source) => Err(CleanupError::Remove {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.guard.is_some() {
            // TempPath removes the file when it drops right after this.
            tracing::debug!(
                "Staged file {} dropped before release, removing",
                self.path.display()
            );
        }
    }
}

/// Creates staged files under one directory with unique generated names.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
    max_size: u64,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Writes `body` into a fresh staged file. On any failure the partial
    /// file is removed before the error is returned.
    pub async fn stage_stream<S, E>(
        &self,
        original_filename: impl Into<String>,
        body: S,
    ) -> Result<StagedFile, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let (file, temp_path) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.dir)?
            .into_parts();

        let mut staged = StagedFile {
            path: temp_path.to_path_buf(),
            original_filename: original_filename.into(),
            size: 0,
            created_at: Utc::now(),
            guard: Some(temp_path),
        };

        let mut file = tokio::fs::File::from_std(file);
        match self.copy_body(&mut file, body).await {
            Ok(size) => {
                staged.size = size;
                tracing::debug!(
                    "📦 Staged {} ({} bytes) at {}",
                    staged.original_filename,
                    size,
                    staged.path.display()
                );
                Ok(staged)
            }
            Err(e) => {
                drop(file);
                staged.release().await;
                Err(e)
            }
        }
    }

    async fn copy_body<S, E>(&self, file: &mut tokio::fs::File, body: S) -> Result<u64, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut total: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StagingError::Body(e.to_string()))?;
            total += chunk.len() as u64;
            if total > self.max_size {
                return Err(StagingError::TooLarge {
                    limit: self.max_size,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_stage_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);

        let staged = stager
            .stage_stream("people.csv", body(&[b"name,age\n", b"John,30"]))
            .await
            .unwrap();

        assert_eq!(staged.original_filename(), "people.csv");
        assert_eq!(staged.size(), 16);
        assert!(staged.path().starts_with(dir.path()));
        let written = tokio::fs::read(staged.path()).await.unwrap();
        assert_eq!(written, b"name,age\nJohn,30");
    }

    #[tokio::test]
    async fn test_same_filename_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);

        let a = stager.stage_stream("same.csv", body(&[b"a"])).await.unwrap();
        let b = stager.stage_stream("same.csv", body(&[b"b"])).await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(tokio::fs::read(a.path()).await.unwrap(), b"a");
        assert_eq!(tokio::fs::read(b.path()).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);
        let mut staged = stager.stage_stream("x.csv", body(&[b"x"])).await.unwrap();
        let path = staged.path().to_path_buf();

        staged.try_release().await.unwrap();
        assert!(!path.exists());
        assert!(staged.is_released());

        staged.try_release().await.unwrap();
        staged.release().await;
    }

    #[tokio::test]
    async fn test_release_of_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);
        let mut staged = stager.stage_stream("x.csv", body(&[b"x"])).await.unwrap();

        tokio::fs::remove_file(staged.path()).await.unwrap();
        assert!(staged.try_release().await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);
        let staged = stager.stage_stream("x.csv", body(&[b"x"])).await.unwrap();
        let path = staged.path().to_path_buf();

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_oversized_body_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 4);

        let err = stager
            .stage_stream("big.csv", body(&[b"abc", b"def"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::TooLarge { limit: 4 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_body_error_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), 1024);
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ]);

        let err = stager.stage_stream("x.csv", failing).await.unwrap_err();

        assert!(matches!(err, StagingError::Body(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_dir_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path().join("nested/staging"), 1024);
        stager.ensure_dir().await.unwrap();
        assert!(stager.dir().is_dir());
    }
}
