//! JSON state files — whole-document load and atomic rewrite.
//!
//! Layout under the state root:
//! - `history/news.json`  — deduplication ledger (`{"seen": [...]}`)
//! - `state/drafts.json`  — draft store (`{"drafts": [...]}`)
//! - `state/cursors.json` — channel cursors (`{"channels": {...}}`)
//!
//! Each document is loaded once at run start and rewritten in full at run
//! end. There is no locking: a second concurrent run would be last-writer-wins.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::channels::cursor::CursorStore;
use crate::drafts::DraftStore;
use crate::error::StateError;
use crate::ledger::Ledger;

/// Well-known state file paths, relative to the state root.
pub mod paths {
    pub const HISTORY: &str = "history/news.json";
    pub const DRAFTS: &str = "state/drafts.json";
    pub const CURSORS: &str = "state/cursors.json";
}

/// Everything the orchestrator loads at start and saves at end.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub ledger: Ledger,
    pub drafts: DraftStore,
    pub cursors: CursorStore,
}

/// File-backed home for the pipeline state.
#[derive(Debug, Clone)]
pub struct StateFiles {
    root: PathBuf,
}

impl StateFiles {
    /// Create a state store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative state path to an absolute path.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Load all three documents. Missing files yield empty state.
    pub fn load(&self) -> Result<PipelineState, StateError> {
        Ok(PipelineState {
            ledger: load_json(&self.resolve_path(paths::HISTORY))?,
            drafts: load_json(&self.resolve_path(paths::DRAFTS))?,
            cursors: load_json(&self.resolve_path(paths::CURSORS))?,
        })
    }

    /// Rewrite all three documents.
    pub fn save(&self, state: &PipelineState) -> Result<(), StateError> {
        save_json(&self.resolve_path(paths::HISTORY), &state.ledger)?;
        save_json(&self.resolve_path(paths::DRAFTS), &state.drafts)?;
        save_json(&self.resolve_path(paths::CURSORS), &state.cursors)?;
        Ok(())
    }
}

/// Read a JSON document, falling back to `T::default()` when the file is absent.
pub fn load_json<T>(path: &Path) -> Result<T, StateError>
where
    T: DeserializeOwned + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|source| StateError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-print `value` with a trailing newline and atomically replace `path`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    atomic_write(path, data.as_bytes())
}

/// Write via a tempfile in the same directory, then rename over `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StateError> {
    let write_err = |source| StateError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::drafts::Draft;
    use crate::ledger::story_key;

    #[test]
    fn missing_files_load_as_empty_state() {
        let tmp = TempDir::new().unwrap();
        let state = StateFiles::new(tmp.path()).load().unwrap();
        assert!(state.ledger.is_empty());
        assert!(state.drafts.all().is_empty());
        assert!(state.cursors.get("any").is_none());
    }

    #[test]
    fn save_writes_pretty_json_with_trailing_newline() {
        let tmp = TempDir::new().unwrap();
        let files = StateFiles::new(tmp.path());
        let mut state = PipelineState::default();
        state.ledger.mark_seen(&story_key("1234"));
        files.save(&state).unwrap();

        let raw = std::fs::read_to_string(files.resolve_path(paths::HISTORY)).unwrap();
        assert!(raw.starts_with("{\n  \"seen\": ["));
        assert!(raw.ends_with("}\n"));

        let cursors = std::fs::read_to_string(files.resolve_path(paths::CURSORS)).unwrap();
        assert_eq!(cursors, "{\n  \"channels\": {}\n}\n");
    }

    #[test]
    fn state_survives_a_save_load_cycle() {
        let tmp = TempDir::new().unwrap();
        let files = StateFiles::new(tmp.path());
        let mut state = PipelineState::default();
        state.ledger.mark_seen("abcdef0123");
        state.drafts.add(Draft::from_group(
            "GameStop opens a new store https://example.com/a",
            &["https://example.com/a".to_string()],
            Utc::now(),
        ));
        state.cursors.advance("chan", "1001");
        files.save(&state).unwrap();

        let loaded = files.load().unwrap();
        assert!(loaded.ledger.is_seen("abcdef0123"));
        assert_eq!(loaded.drafts.all().len(), 1);
        assert_eq!(loaded.cursors.get("chan"), Some("1001"));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let tmp = TempDir::new().unwrap();
        let files = StateFiles::new(tmp.path());
        std::fs::create_dir_all(tmp.path().join("state")).unwrap();
        std::fs::write(files.resolve_path(paths::DRAFTS), "{ not json").unwrap();
        let err = files.load().unwrap_err();
        assert!(matches!(err, StateError::Decode { .. }));
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/doc.json");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
