//! Crash-safe file writes shared by the config writer and the session store.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` atomically.
///
/// Creates parent directories, writes and syncs `<path>.tmp`, then renames
/// it over `path`. A reader therefore sees either the old file or the new
/// one, never a partial write. If the rename fails (some Windows setups),
/// falls back to a direct write.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        tracing::warn!(path = %path.display(), "atomic rename failed ({e}), falling back to direct write");
        fs::write(path, contents)?;
        let _ = fs::remove_file(&tmp_path);
    }

    Ok(())
}
