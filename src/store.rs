//! Project file persistence: `{ version, project, view }` JSON, written
//! atomically with a `.bak` of the previous version kept alongside.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Project, ViewConfig};

/// Project file format version.
pub const PROJECT_FILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: u32,
    #[serde(default)]
    pub project: Project,
    #[serde(default)]
    pub view: ViewConfig,
}

impl ProjectFile {
    pub fn new(project: Project, view: ViewConfig) -> Self {
        Self {
            version: PROJECT_FILE_VERSION,
            project,
            view,
        }
    }
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self::new(Project::new(), ViewConfig::default())
    }
}

/// Per-file mutex map to serialize concurrent writes to the same path. An
/// entry lives only while some writer holds or waits on it.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.file_name().unwrap_or_default());
    name.push(suffix);
    path.with_file_name(name)
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

/// Atomically write bytes to a file: write a `.tmp` sibling, fsync, move the
/// current file to `.bak` (best-effort) and rename the temp file into place.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let lock = FILE_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let result = {
        let _guard = lock.lock();
        replace_file(path, data)
    };

    let mut locks = FILE_LOCKS.lock();
    // One reference in the map plus ours: nobody else is waiting.
    if Arc::strong_count(&lock) == 2 {
        locks.remove(path);
    }
    result
}

fn replace_file(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp_path = sibling(path, ".tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if path.exists() {
        let _ = fs::rename(path, backup_path(path));
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save_project_file(path: &Path, file: &ProjectFile) -> Result<(), StoreError> {
    write_json(path, file)?;
    tracing::debug!(path = %path.display(), tasks = file.project.task_count(), "project saved");
    Ok(())
}

pub fn load_project_file(path: &Path) -> Result<ProjectFile, StoreError> {
    let file: ProjectFile = read_json(path)?;
    if file.version > PROJECT_FILE_VERSION {
        return Err(StoreError::Unsupported(format!(
            "Project file version {} is newer than supported version {PROJECT_FILE_VERSION}",
            file.version
        )));
    }
    Ok(file)
}

/// Load a project file, or an empty one if the path does not exist yet.
pub fn load_or_default(path: &Path) -> Result<ProjectFile, StoreError> {
    if path.exists() {
        load_project_file(path)
    } else {
        Ok(ProjectFile::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{ItemId, Skin, Task};
    use chrono::NaiveDate;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gantt-pilot-store-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample() -> ProjectFile {
        let mut project = Project::new();
        project.set_name(Some("Launch".into()));
        project
            .add_task(Task::new(ItemId::from(1), "Plan", NaiveDate::from_ymd_opt(2025, 5, 5).unwrap(), 3))
            .unwrap();
        let view = ViewConfig {
            skin: Skin::Dark,
            ..ViewConfig::default()
        };
        ProjectFile::new(project, view)
    }

    #[test]
    fn save_and_load() {
        let dir = temp_dir("save");
        let path = dir.join("p.gantt.json");
        let file = sample();
        save_project_file(&path, &file).unwrap();
        assert_eq!(load_project_file(&path).unwrap(), file);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn second_save_keeps_backup() {
        let dir = temp_dir("backup");
        let path = dir.join("p.gantt.json");
        let first = sample();
        save_project_file(&path, &first).unwrap();
        save_project_file(&path, &ProjectFile::default()).unwrap();

        assert!(load_project_file(&path).unwrap().project.is_empty());
        assert_eq!(load_project_file(&backup_path(&path)).unwrap(), first);
        assert!(!sibling(&path, ".tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_locks_are_released_after_use() {
        let dir = temp_dir("locks");
        let path = dir.join("p.gantt.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(!FILE_LOCKS.lock().contains_key(&path));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = temp_dir("version");
        let path = dir.join("p.gantt.json");
        fs::write(&path, r#"{"version": 99, "project": {"data": [], "links": []}}"#).unwrap();
        assert!(matches!(load_project_file(&path), Err(StoreError::Unsupported(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_project_is_a_json_error() {
        let dir = temp_dir("invalid");
        let path = dir.join("p.gantt.json");
        // Link to a task that does not exist.
        fs::write(
            &path,
            r#"{"version": 1, "project": {"data": [], "links": [{"id": 1, "source": 1, "target": 2, "type": "0"}]}}"#,
        )
        .unwrap();
        assert!(matches!(load_project_file(&path), Err(StoreError::Json(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_empty_project() {
        let dir = temp_dir("missing");
        let file = load_or_default(&dir.join("nope.json")).unwrap();
        assert!(file.project.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
