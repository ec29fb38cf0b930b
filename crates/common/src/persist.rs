//! Flat-file JSON persistence shared by the store and the monitors.
//!
//! Loading never fails: a missing file is a fresh start and a corrupt file is
//! logged and replaced by the default value on the next save.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::PersistError;

/// Load `T` from `path`, falling back to `T::default()` when the file is
/// missing, unreadable or malformed.
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "State file not found, starting empty");
            return T::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read state file, starting empty");
            return T::default();
        }
    };

    match serde_json::from_slice(&data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
            T::default()
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// Parent directories are created on demand. The data goes to a uniquely
/// named temp file in the same directory, which is then renamed into place,
/// so concurrent writers never share a temp file. Callers that need
/// last-writer-wins ordering must serialize their calls per path.
pub fn save_json<T>(path: &Path, value: &T) -> Result<(), PersistError>
where
    T: Serialize + ?Sized,
{
    let data = serde_json::to_vec_pretty(value)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| io_error(dir, source))?;
    tmp.write_all(&data)
        .map_err(|source| io_error(tmp.path(), source))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<String> = load_or_default(&dir.path().join("absent.json"));
        assert!(value.is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{not json").unwrap();
        let value: HashMap<String, i64> = load_or_default(&path);
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let value = vec!["a".to_string(), "b".to_string()];

        save_json(&path, &value).unwrap();
        let loaded: Vec<String> = load_or_default(&path);
        assert_eq!(loaded, value);

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_concurrent_saves_never_corrupt_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let path = &path;
                scope.spawn(move || {
                    for round in 0..25 {
                        let value = vec![format!("{writer}-{round}"); 50];
                        save_json(path, &value).unwrap();
                    }
                });
            }
        });

        let raw = std::fs::read(&path).unwrap();
        let loaded: Vec<String> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(loaded.len(), 50);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
