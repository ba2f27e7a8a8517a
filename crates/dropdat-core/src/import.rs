//! Recursive import of local files into an archive

use crate::archive::normalize_path;
use crate::{Archive, ArchiveError};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// A file that could not be imported
#[derive(Debug)]
pub struct ImportFailure {
    /// Local path that failed
    pub path: PathBuf,
    /// Why it failed
    pub error: ArchiveError,
}

/// Outcome of an import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Archive paths written
    pub imported: Vec<String>,
    /// Local paths that failed, with their errors
    pub errors: Vec<ImportFailure>,
}

impl ImportReport {
    /// True when every file was imported
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: ImportReport) {
        self.imported.extend(other.imported);
        self.errors.extend(other.errors);
    }

    fn failed(path: PathBuf, error: impl Into<ArchiveError>) -> Self {
        Self {
            imported: Vec::new(),
            errors: vec![ImportFailure {
                path,
                error: error.into(),
            }],
        }
    }
}

/// Import `names` (resolved against `base`) into `archive`.
///
/// Directories are walked recursively; entries whose name starts with `.`
/// are skipped during the walk. A name given explicitly is always imported.
/// Each file lands at its path relative to `base`; names that leave `base`
/// (absolute or containing `..`) land under their final component.
pub async fn import_paths<S: AsRef<Path>>(
    archive: &dyn Archive,
    base: &Path,
    names: &[S],
) -> ImportReport {
    let mut report = ImportReport::default();

    for name in names {
        let name = name.as_ref();
        let source = base.join(name);
        info!(path = %source.display(), "adding");
        report.merge(import_entry(archive, source, archive_path_for(name)).await);
    }

    if !report.is_complete() {
        warn!(failed = report.errors.len(), "some files could not be imported");
    }
    report
}

/// Archive location for a name given on the command line
fn archive_path_for(name: &Path) -> String {
    let stays_inside = name
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    let relative = if stays_inside {
        name.to_string_lossy().into_owned()
    } else {
        name.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    normalize_path(&relative).unwrap_or_default()
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn join_archive_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn import_entry<'a>(
    archive: &'a dyn Archive,
    source: PathBuf,
    target: String,
) -> BoxFuture<'a, ImportReport> {
    Box::pin(async move {
        let metadata = match tokio::fs::metadata(&source).await {
            Ok(m) => m,
            Err(e) => return ImportReport::failed(source, e),
        };

        if metadata.is_dir() {
            return import_dir(archive, source, target).await;
        }

        let data = match tokio::fs::read(&source).await {
            Ok(data) => Bytes::from(data),
            Err(e) => return ImportReport::failed(source, e),
        };

        if target.is_empty() {
            return ImportReport::failed(source, ArchiveError::InvalidPath("/".to_string()));
        }

        debug!(path = %source.display(), target = %target, size = data.len(), "importing file");
        match archive.write_file(&target, data).await {
            Ok(()) => ImportReport {
                imported: vec![target],
                errors: Vec::new(),
            },
            Err(e) => ImportReport::failed(source, e),
        }
    })
}

async fn import_dir(archive: &dyn Archive, source: PathBuf, target: String) -> ImportReport {
    let mut report = ImportReport::default();

    let mut entries = match tokio::fs::read_dir(&source).await {
        Ok(entries) => entries,
        Err(e) => return ImportReport::failed(source, e),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(e) => {
                report.merge(ImportReport::failed(source.clone(), e));
                break;
            }
        }
    }
    names.sort();

    for name in names.into_iter().filter(|n| !is_hidden(n)) {
        let child = import_entry(archive, source.join(&name), join_archive_path(&target, &name));
        report.merge(child.await);
    }
    report
}
