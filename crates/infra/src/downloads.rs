//! Where locally generated export files end up.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use uuid::Uuid;

use exportdesk_core::{ExportError, ExportResult};

/// Destination for generated files (the desktop equivalent of a browser download).
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Persist `bytes` under (a sanitised form of) `file_name`.
    ///
    /// Either the whole file is written or nothing is.
    async fn save(&self, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf>;
}

/// Writes files into a directory, never overwriting an existing file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The user's download directory, or the temp dir when there is none.
    pub fn downloads() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(std::env::temp_dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically reserve `file_name`, or the first free `name (n).ext`, by
    /// creating an empty file there. Concurrent saves never get the same path.
    async fn claim(&self, file_name: &str) -> ExportResult<PathBuf> {
        let (stem, ext) = split_extension(file_name);
        for n in 0..1000 {
            let name = match (n, ext) {
                (0, _) => file_name.to_string(),
                (_, Some(ext)) => format!("{stem} ({n}).{ext}"),
                (_, None) => format!("{stem} ({n})"),
            };
            let candidate = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&candidate).await {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ExportError::file_generation(format!(
                        "could not create {}: {e}",
                        candidate.display()
                    )));
                }
            }
        }

        Err(ExportError::file_generation(format!(
            "no free file name for {file_name} in {}",
            self.dir.display()
        )))
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf> {
        let file_name = sanitize_file_name(file_name);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ExportError::file_generation(format!("could not create {}: {e}", self.dir.display()))
        })?;

        let target = self.claim(&file_name).await?;
        // Unique per save, so concurrent writers never share a partial file.
        let mut partial = target.clone().into_os_string();
        partial.push(format!(".{}.part", Uuid::now_v7().simple()));
        let partial = PathBuf::from(partial);

        commit(&partial, &target, bytes).await?;

        tracing::info!(path = %target.display(), bytes = bytes.len(), "export file saved");
        Ok(target)
    }
}

/// Write `bytes` to `partial`, then rename it over the reserved `target`.
/// On failure neither file is left behind.
async fn commit(partial: &Path, target: &Path, bytes: &[u8]) -> ExportResult<()> {
    let written = match tokio::fs::write(partial, bytes).await {
        Ok(()) => tokio::fs::rename(partial, target).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(partial).await;
        let _ = tokio::fs::remove_file(target).await;
        return Err(ExportError::file_generation(format!(
            "could not write {}: {e}",
            target.display()
        )));
    }
    Ok(())
}

/// Keeps files in memory. Used by tests and previews.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl DownloadSink for MemorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> ExportResult<PathBuf> {
        let file_name = sanitize_file_name(file_name);
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((file_name.clone(), bytes.to_vec()));
        Ok(PathBuf::from(file_name))
    }
}

/// Strip directory components and characters that are invalid on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}
