//! Incremental Writer.
//!
//! Writes a generated file only when its content changed. A replaced file
//! can be kept as `<name>.<hash>.bak`, where `<hash>` is the first twelve hex
//! digits of the SHA-256 of the replaced content.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::WriteError;

/// Hex digits of the content hash kept in a backup name.
const BACKUP_HASH_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalWriter {
    /// Keep the replaced content next to the new file.
    pub backup: bool,
    /// Report would-be changes without touching the filesystem.
    pub check: bool,
}

impl Default for IncrementalWriter {
    fn default() -> Self {
        IncrementalWriter {
            backup: true,
            check: false,
        }
    }
}

impl IncrementalWriter {
    pub fn new(backup: bool, check: bool) -> Self {
        IncrementalWriter { backup, check }
    }

    /// Write `content` to `path`. Returns whether the file changed (or, in
    /// check mode, would change).
    pub fn write(&self, path: &Path, content: &str) -> Result<bool, WriteError> {
        let existing = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(WriteError::new(path, e)),
        };

        if existing.as_deref() == Some(content.as_bytes()) {
            info!(path = %path.display(), "unchanged");
            return Ok(false);
        }

        if self.check {
            info!(path = %path.display(), "would change");
            return Ok(true);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| WriteError::new(parent, e))?;
        }

        if let (true, Some(old)) = (self.backup, existing.as_deref()) {
            let backup = backup_path(path, old);
            if backup.exists() {
                fs::remove_file(&backup).map_err(|e| WriteError::new(&backup, e))?;
            }
            fs::rename(path, &backup).map_err(|e| WriteError::new(&backup, e))?;
            info!(path = %path.display(), backup = %backup.display(), "backed up");
        }

        fs::write(path, content).map_err(|e| WriteError::new(path, e))?;
        info!(path = %path.display(), bytes = content.len(), "wrote");
        Ok(true)
    }
}

/// `<path>.<first 12 hex digits of sha256(content)>.bak`.
pub fn backup_path(path: &Path, content: &[u8]) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(&content_hash(content)[..BACKUP_HASH_LEN]);
    name.push(".bak");
    PathBuf::from(name)
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
