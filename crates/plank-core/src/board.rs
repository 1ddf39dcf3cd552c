use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::datastore::DataStore;
use crate::task::{Importance, Status, Task};

/// The task store: an ordered collection owned by a single board, persisted
/// in full after every mutation. Storage order is insertion order and is
/// never re-sorted.
#[derive(Debug)]
pub struct Board {
    store: DataStore,
    tasks: Vec<Task>,
}

impl Board {
    #[tracing::instrument(skip(store, now))]
    pub fn open(store: DataStore, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let tasks = store
            .load_or_seed(now)
            .context("failed to load the board")?;
        Ok(Self { store, tasks })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Appends a new record with a fresh id and persists. The store does not
    /// validate the label; empty submissions are the command layer's problem.
    #[tracing::instrument(skip(self, text, due))]
    pub fn create(
        &mut self,
        text: String,
        importance: Importance,
        due: DateTime<Utc>,
        status: Status,
    ) -> anyhow::Result<Task> {
        let task = Task::new(text, importance, due, status);
        debug!(id = %task.id, "created task");
        self.tasks.push(task.clone());
        self.persist()?;
        Ok(task)
    }

    /// Replaces the record matching `id` wholesale. Absent ids are ignored.
    #[tracing::instrument(skip(self, record))]
    pub fn update(&mut self, id: &str, record: Task) -> anyhow::Result<()> {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(slot) => *slot = record,
            None => debug!(id, "update target not found; ignoring"),
        }
        self.persist()
    }

    /// Flips done <-> todo. An in-progress task becomes done; only `move`
    /// can take it back to in-progress.
    #[tracing::instrument(skip(self))]
    pub fn toggle_done(&mut self, id: &str) -> anyhow::Result<()> {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.status = if task.status == Status::Done {
                    Status::Todo
                } else {
                    Status::Done
                };
                debug!(id, status = %task.status, "toggled task");
            }
            None => debug!(id, "toggle target not found; ignoring"),
        }
        self.persist()
    }

    /// Sets the status of the record matching `id`. Absent ids are ignored.
    #[tracing::instrument(skip(self))]
    pub fn move_status(&mut self, id: &str, status: Status) -> anyhow::Result<()> {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.status = status;
                debug!(id, status = %status, "moved task");
            }
            None => debug!(id, "move target not found; ignoring"),
        }
        self.persist()
    }

    /// Deletes the record matching `id` unconditionally. Absent ids are
    /// ignored.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> anyhow::Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        debug!(id, removed = before - self.tasks.len(), "removed task");
        self.persist()
    }

    fn persist(&self) -> anyhow::Result<()> {
        self.store
            .save(&self.tasks)
            .context("failed to persist the board")
    }
}
