use buildgate_core::{MemoryState, MemoryStore};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Memory document kept as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MemoryStore for JsonFileStore {
    type Error = StoreError;

    fn load(&self) -> Result<Option<MemoryState>, Self::Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    // Written beside the target then renamed, so a failed write keeps the old document.
    fn save(&self, state: &MemoryState) -> Result<(), Self::Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.staging_path();
        fs::write(&staging, json + "\n").map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "buildgate-store-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let store = JsonFileStore::new(temp_path("missing").join("MEMORY.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_parents_and_roundtrips() {
        let dir = temp_path("roundtrip");
        let store = JsonFileStore::new(dir.join("docs").join("MEMORY.json"));
        let state = MemoryState {
            active_game: Some("slicer".into()),
            build_number: 5,
            last_qa_score: 0.72,
            revision: 9,
            ..MemoryState::default()
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.staging_path().exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_document_is_a_parse_error() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
        let _ = fs::remove_file(path);
    }
}
