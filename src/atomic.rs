//! Crash-safe file replacement.
//!
//! Data is written to a temp file in the target's own directory, flushed,
//! then renamed over the target. A reader of the target path sees either the
//! old file or the new one, never a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Published records are read by unprivileged status tools
#[cfg(unix)]
const PUBLISHED_MODE: u32 = 0o644;

/// Atomically replace `target` with `data`, creating parent directories.
pub fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    write_atomic_staged(target, data, |_| Ok(()))
}

/// Like [`write_atomic`], but calls `before_replace` with the staged temp
/// file path after it is fully written and synced and before the rename.
///
/// If `before_replace` fails the temp file is discarded and `target` keeps
/// its previous content.
pub fn write_atomic_staged<F>(target: &Path, data: &[u8], before_replace: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if target.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("target path is a directory: {}", target.display()),
        ));
    }
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".bootstage-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::Permissions::from_mode(PUBLISHED_MODE);
        if let Err(e) = fs::set_permissions(temp.path(), mode) {
            tracing::warn!(
                path = %temp.path().display(),
                err = %e,
                "failed to set record permissions"
            );
        }
    }

    before_replace(temp.path())?;

    temp.persist(target).map_err(|e| e.error)?;
    sync_dir(parent);
    tracing::debug!(path = %target.display(), bytes = data.len(), "replaced file atomically");
    Ok(())
}

/// Remove `path` if present. Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
