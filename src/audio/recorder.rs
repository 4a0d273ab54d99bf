//! Capture-to-file.  The artifact path is fixed and overwritten every session.

use std::path::Path;

use crate::process::{CommandSpec, ManagedProcess, ProcessError};

/// Launch the recording command writing to `file`.
///
/// The file's parent directory is created first; failing that is reported as
/// [`ProcessError::Prepare`] and nothing is launched.
pub fn start_recording(spec: &CommandSpec, file: &Path) -> Result<ManagedProcess, ProcessError> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ProcessError::Prepare {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let process = ManagedProcess::start(spec)?;
    log::info!("recorder: capturing to {} (pid {})", file.display(), process.pid());
    Ok(process)
}
