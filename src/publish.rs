//! Link publisher
//!
//! The link directory is what status tools read. Every record copied there
//! goes through [`atomic::write_atomic_staged`], so a reader of
//! `<link_dir>/status.json` sees the previous complete document or the new
//! complete document and nothing in between.

use std::fs;
use std::io;
use std::path::Path;

use crate::atomic;
use crate::error::Result;
use crate::record::{ResultRecord, StatusRecord};
use crate::store::{Record, ResultStore};

/// Documents mirrored from the data directory into the link directory
pub const PUBLISHED_FILES: &[&str] = &[StatusRecord::FILE_NAME, ResultRecord::FILE_NAME];

/// What a publish pass changed in the link directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub written: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Mirror the data-directory records into the link directory.
///
/// A record missing from the data directory is removed from the link
/// directory. Publishing a directory onto itself does nothing.
pub fn publish(data_dir: &Path, link_dir: &Path) -> Result<PublishSummary> {
    publish_staged(data_dir, link_dir, |_, _| Ok(()))
}

/// [`publish`] with a hook called as `(target, staged)` for every file,
/// after the staged copy is complete and before it replaces `target`.
///
/// A hook error aborts the publish; the target keeps its old content.
pub fn publish_staged<F>(
    data_dir: &Path,
    link_dir: &Path,
    mut before_replace: F,
) -> Result<PublishSummary>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut summary = PublishSummary::default();
    if same_dir(data_dir, link_dir) {
        tracing::debug!(
            dir = %data_dir.display(),
            "data and link directories are the same, nothing to publish"
        );
        summary.unchanged = PUBLISHED_FILES.len();
        return Ok(summary);
    }

    for name in PUBLISHED_FILES {
        let source = data_dir.join(name);
        let target = link_dir.join(name);

        let data = match fs::read(&source) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if atomic::remove_if_exists(&target)? {
                    summary.removed += 1;
                } else {
                    summary.unchanged += 1;
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if fs::read(&target).is_ok_and(|current| current == data) {
            summary.unchanged += 1;
            continue;
        }

        atomic::write_atomic_staged(&target, &data, |staged| before_replace(&target, staged))?;
        summary.written += 1;
    }

    tracing::debug!(
        link_dir = %link_dir.display(),
        written = summary.written,
        removed = summary.removed,
        "published records"
    );
    Ok(summary)
}

/// Remove `result.json` from both directories. Missing files are fine.
pub fn purge_result(data_dir: &Path, link_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for dir in [data_dir, link_dir] {
        if ResultStore::in_dir(dir).remove()? {
            tracing::info!(dir = %dir.display(), "removed stale result.json");
            removed += 1;
        }
    }
    Ok(removed)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
