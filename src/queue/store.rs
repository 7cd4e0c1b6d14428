use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::queue::task::TaskReport;

/// One JSON file per task id. Status queries work across process restarts
/// as long as they share the output directory.
pub struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn for_storage(config: &StorageConfig) -> Result<Self> {
        Self::new(config.output_dir.join("tasks"))
    }

    pub fn put(&self, report: &TaskReport) -> Result<()> {
        let body = serde_json::to_vec_pretty(report)?;
        std::fs::write(self.path(report.task_id), body)?;
        Ok(())
    }

    /// Ids the store has never seen report as PENDING, matching how result
    /// backends answer for tasks that are queued elsewhere or expired.
    pub fn get(&self, task_id: Uuid) -> Result<TaskReport> {
        let path = self.path(task_id);
        if !path.exists() {
            return Ok(TaskReport::pending(task_id));
        }
        let body = std::fs::read(path)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn path(&self, task_id: Uuid) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::task::TaskStatus;
    use tempfile::TempDir;

    #[test]
    fn reports_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = StatusStore::new(dir.path()).unwrap();

        let id = Uuid::new_v4();
        store
            .put(&TaskReport::success(id, serde_json::json!({"n": 1})))
            .unwrap();

        let report = store.get(id).unwrap();
        assert_eq!(report.status, TaskStatus::Success);
        assert_eq!(report.result.unwrap()["n"], 1);
    }

    #[test]
    fn unknown_ids_answer_as_pending() {
        let dir = TempDir::new().unwrap();
        let store = StatusStore::new(dir.path()).unwrap();

        let report = store.get(Uuid::new_v4()).unwrap();
        assert_eq!(report.status, TaskStatus::Pending);
        assert!(!report.ready);
    }
}
