use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::{Importance, Status, Task};

/// Fixed name of the persistence slot inside the data directory.
pub const BOARD_FILE: &str = "board.json";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub board_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let board_path = data_dir.join(BOARD_FILE);

        info!(
            data_dir = %data_dir.display(),
            board = %board_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            board_path,
        })
    }

    /// Reads the whole board. A missing slot seeds the four example tasks;
    /// an unparsable slot is treated the same way, with a warning, rather
    /// than failing the launch. The seed is persisted immediately so the
    /// next load sees it.
    #[tracing::instrument(skip(self, now))]
    pub fn load_or_seed(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Task>> {
        let raw = match fs::read_to_string(&self.board_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(board = %self.board_path.display(), "no board file; seeding example tasks");
                let tasks = seed_tasks(now);
                self.save(&tasks)?;
                return Ok(tasks);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed reading {}", self.board_path.display())
                });
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded board");
                Ok(tasks)
            }
            Err(err) => {
                warn!(
                    board = %self.board_path.display(),
                    error = %err,
                    "board file is unparsable; falling back to seed tasks"
                );
                let tasks = seed_tasks(now);
                self.save(&tasks)?;
                Ok(tasks)
            }
        }
    }

    /// Serializes the full collection and replaces the slot atomically.
    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        debug!(board = %self.board_path.display(), count = tasks.len(), "saving board");

        let serialized = serde_json::to_string(tasks).context("failed to serialize board")?;

        let dir = self
            .board_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.board_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.board_path.display(), err))?;

        Ok(())
    }
}

/// The four example tasks a fresh board starts with; due dates are relative
/// to load time.
pub fn seed_tasks(now: DateTime<Utc>) -> Vec<Task> {
    vec![
        Task {
            id: "1".to_string(),
            text: "Walk the dog".to_string(),
            status: Status::Done,
            importance: Importance::Medium,
            due: Some(now),
        },
        Task {
            id: "2".to_string(),
            text: "Walk the cat".to_string(),
            status: Status::Todo,
            importance: Importance::Low,
            due: Some(now),
        },
        Task {
            id: "3".to_string(),
            text: "Walk the fish".to_string(),
            status: Status::InProgress,
            importance: Importance::High,
            due: Some(now + Duration::days(1)),
        },
        Task {
            id: "4".to_string(),
            text: "Walk the chickens".to_string(),
            status: Status::Todo,
            importance: Importance::Medium,
            due: Some(now + Duration::days(2)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{DataStore, seed_tasks};
    use crate::task::{Importance, Status, Task};

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_slot_seeds_and_persists() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let now = fixed_now();

        let tasks = store.load_or_seed(now).expect("first load");
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].id, "1");
        assert_eq!(tasks[2].status, Status::InProgress);

        // The seed was written through; a second load parses the file.
        let again = store.load_or_seed(now).expect("second load");
        assert_eq!(again, tasks);
    }

    #[test]
    fn corrupt_slot_falls_back_to_seed() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        std::fs::write(&store.board_path, "{not json").expect("write garbage");

        let tasks = store.load_or_seed(fixed_now()).expect("load over garbage");
        assert_eq!(tasks, seed_tasks(fixed_now()));
    }

    #[test]
    fn save_then_load_is_identity() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let now = fixed_now();

        let tasks = vec![
            Task::new("first".to_string(), Importance::High, now, Status::Todo),
            Task::new("second".to_string(), Importance::Low, now, Status::Done),
        ];
        store.save(&tasks).expect("save");

        let loaded = store.load_or_seed(now).expect("load");
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn seed_due_dates_are_relative_to_load_time() {
        let now = fixed_now();
        let tasks = seed_tasks(now);
        assert_eq!(tasks[1].due, Some(now));
        assert_eq!(tasks[3].due, Some(now + chrono::Duration::days(2)));
    }
}
