use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::fetch::FetchError;

/// True when `path` is a regular file with at least one byte.
pub(super) async fn is_complete(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Hidden sibling the transfer is written to: `dir/.name.pdf.part`.
pub(super) fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(".part");
    destination.with_file_name(name)
}

/// Creates the destination's parent directories. Safe to race.
pub(super) async fn ensure_parent(destination: &Path) -> Result<(), FetchError> {
    let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    match fs::create_dir_all(parent).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(FetchError::io(parent, e)),
    }
}

/// Moves a finished transfer into place.
pub(super) async fn finalize(temp: &Path, destination: &Path) -> Result<(), FetchError> {
    fs::rename(temp, destination)
        .await
        .map_err(|e| FetchError::io(destination, e))?;
    debug!(path = %destination.display(), "download finalized");
    Ok(())
}

/// Removes a partial transfer. Missing files are fine.
pub(super) async fn discard(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => debug!(path = %temp.display(), "removed partial download"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp.display(), error = %e, "failed to remove partial download"),
    }
}
