// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Filesystem helpers.


use std::{fs, io::Write, path::Path};

use chrono::Utc;
use log::debug;

use crate::naming::{CALTABLES_DIR, LOG_DIR, PLOTS_DIR};

/// Replace `path` with `bytes` such that readers only ever see the old or the
/// new contents. The bytes go to a temporary sibling file which is synced and
/// then renamed over the target.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{name}.tmp.{pid}.{ts}"));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Create the output directory and its standard sub-directories.
pub(crate) fn create_output_tree(outdir: &Path) -> std::io::Result<()> {
    for sub in [LOG_DIR, PLOTS_DIR, CALTABLES_DIR] {
        fs::create_dir_all(outdir.join(sub))?;
    }
    Ok(())
}

/// Remove a stale artifact, whether it's a file or a directory (tables and
/// measurement sets are directories). Returns whether anything was removed.
pub(crate) fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    debug!("Removed stale '{}'", path.display());
    Ok(true)
}
