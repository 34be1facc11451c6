//! Whole-file JSON snapshots with atomic replacement.
//!
//! Readers treat a missing or unreadable snapshot as absent state.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Write bytes to `path` via a sibling temp file renamed over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Serialize `value` as JSON and write it atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value)?;
    write_atomic(path, &json)
}

/// Read a JSON snapshot. Returns `None` when the file is missing or malformed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Unreadable snapshot {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Malformed snapshot {}: {}", path.display(), e);
            None
        }
    }
}
