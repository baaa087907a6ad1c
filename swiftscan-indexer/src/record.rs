//! Directory listing shared by every walker level.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

/// Name, path and mtime of one directory entry. Embedded in every walker
/// node; immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub name: String,
    pub path: PathBuf,
    pub mtime: DateTime<Utc>,
}

/// A regular file at the hash level, with its size.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub record: IndexRecord,
    pub size: i64,
}

impl FileRecord {
    /// File extension including the dot, e.g. `.data`, or empty.
    pub fn extension(&self) -> &str {
        match self.record.name.rfind('.') {
            Some(idx) => &self.record.name[idx..],
            None => "",
        }
    }
}

/// List subdirectories of `path`, newest mtime first.
///
/// Listing errors are logged and yield what was read so far; the walk
/// continues with partial results. Non-directories are skipped.
pub(crate) async fn subdirectories(path: &Path) -> Vec<IndexRecord> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "list dir failed");
            return out;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                if !metadata.is_dir() {
                    continue;
                }
                out.push(IndexRecord {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                    mtime: mtime_of(&metadata),
                });
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "list dir failed mid-read");
                break;
            }
        }
    }

    out.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    out
}

/// List regular files of `path`, newest mtime first. Same error policy as
/// [`subdirectories`]; non-regular files are skipped.
pub(crate) async fn regular_files(path: &Path) -> Vec<FileRecord> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "list dir failed");
            return out;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                out.push(FileRecord {
                    record: IndexRecord {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        path: entry.path(),
                        mtime: mtime_of(&metadata),
                    },
                    size: metadata.len() as i64,
                });
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "list dir failed mid-read");
                break;
            }
        }
    }

    out.sort_by(|a, b| b.record.mtime.cmp(&a.record.mtime));
    out
}

pub(crate) fn mtime_of(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default()
}
