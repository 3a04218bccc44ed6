//! JSON file persistence shared by every persisted store.
//!
//! Each store owns exactly one file and rewrites it whole on save. Writes go
//! to a sibling `*.tmp` file that is then renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact.
//!
//! Two layers:
//! - [`read_json`] / [`write_json`] return `Result` and are used by the
//!   `try_*` paths.
//! - [`load_or_default`] is the fail-soft loader used on startup: absent,
//!   unreadable or malformed files yield an empty store and a `warn!`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Read and decode `path`.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`crate::RecollectError::Io`] if the file exists but cannot be
/// read, or [`crate::RecollectError::Serialization`] if it is not valid JSON
/// of the expected shape.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let start = Instant::now();
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let value = serde_json::from_slice(&data)?;
    debug!(
        path = %path.display(),
        bytes = data.len(),
        elapsed_us = start.elapsed().as_micros(),
        "Loaded JSON snapshot"
    );
    Ok(Some(value))
}

/// Encode `value` and replace `path` with it.
///
/// Parent directories are created on demand.
///
/// # Errors
///
/// Returns [`crate::RecollectError::Serialization`] if encoding fails or
/// [`crate::RecollectError::Io`] if the file cannot be written or renamed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let start = Instant::now();
    let json = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;

    debug!(
        path = %path.display(),
        bytes = json.len(),
        elapsed_us = start.elapsed().as_micros(),
        "Wrote JSON snapshot"
    );
    Ok(())
}

/// Fail-soft loader: any problem is logged and yields `T::default()`.
///
/// The second element reports whether a load failure occurred (a missing
/// file is not a failure).
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> (T, bool) {
    match read_json(path) {
        Ok(Some(value)) => {
            info!(store = what, path = %path.display(), "Restored from disk");
            (value, false)
        }
        Ok(None) => {
            debug!(store = what, path = %path.display(), "No snapshot on disk, starting empty");
            (T::default(), false)
        }
        Err(e) => {
            warn!(
                store = what,
                path = %path.display(),
                error = %e,
                "Could not load snapshot, starting empty"
            );
            (T::default(), true)
        }
    }
}

/// Ensure `dir` exists; failures are logged, not raised.
pub fn ensure_dir(dir: &Path) {
    if dir.as_os_str().is_empty() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "Could not create data directory");
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let value: Option<Vec<u32>> = read_json(&dir.path().join("nope.json")).expect("read");
        assert!(value.is_none());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("facts.json");
        let mut facts = BTreeMap::new();
        facts.insert("name".to_string(), "Кристина".to_string());

        write_json(&path, &facts, true).expect("write");
        let back: BTreeMap<String, String> = read_json(&path).expect("read").expect("present");
        assert_eq!(back, facts);
        assert!(!tmp_path(&path).exists(), "temp file should be renamed away");
    }

    #[test]
    fn malformed_file_is_an_error_but_loads_soft() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").expect("write");

        assert!(read_json::<Vec<u32>>(&path).is_err());
        let (value, failed): (Vec<u32>, bool) = load_or_default(&path, "test");
        assert!(value.is_empty());
        assert!(failed);
    }

    #[test]
    fn wrong_shape_loads_soft() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shape.json");
        std::fs::write(&path, b"{\"a\": 1}").expect("write");

        let (value, failed): (Vec<String>, bool) = load_or_default(&path, "test");
        assert!(value.is_empty());
        assert!(failed);
    }
}
