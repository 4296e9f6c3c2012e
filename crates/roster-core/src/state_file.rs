//! Small JSON state files written with temp-file + rename.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::time_utils::current_unix_timestamp_ms;

/// Replaces `path` with `content` via a sibling temp file and a rename, so
/// a reader sees either the old state or the new one.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.is_dir() {
        bail!("state file path '{}' is a directory", path.display());
    }
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("state file path '{}' has no file name", path.display());
    };
    let state_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("cannot create state directory {}", state_dir.display()))?;

    let staging = state_dir.join(format!(
        ".{file_name}.{}.{}.partial",
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    std::fs::write(&staging, content)
        .with_context(|| format!("cannot stage state file {}", staging.display()))?;
    if let Err(error) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(error).with_context(|| format!("cannot replace state file {}", path.display()));
    }
    Ok(())
}

/// Serializes `value` as pretty JSON (trailing newline) and writes it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("failed to encode state")?;
    payload.push('\n');
    write_text_atomic(path, &payload)
}

/// Loads a JSON state file, falling back to `T::default()` when it does not exist yet.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))
}
