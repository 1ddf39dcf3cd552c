use crate::filter::{Criteria, DueBucket};
use crate::task::{Importance, Status, Task};

/// How the projection is presented: a flat table or Kanban columns.
/// Transient; the default command renders the board, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Board,
}

/// The grouped projection: one ordered column per status, each preserving
/// the filtered sequence's relative order. `Status` is a closed set, so the
/// three columns always form an exact partition of the input.
#[derive(Debug, Default)]
pub struct Columns<'a> {
    pub todo: Vec<&'a Task>,
    pub in_progress: Vec<&'a Task>,
    pub done: Vec<&'a Task>,
}

impl<'a> Columns<'a> {
    pub fn column(&self, status: Status) -> &[&'a Task] {
        match status {
            Status::Todo => &self.todo,
            Status::InProgress => &self.in_progress,
            Status::Done => &self.done,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.todo.is_empty() && self.in_progress.is_empty() && self.done.is_empty()
    }
}

pub fn group_by_status<'a>(filtered: &[&'a Task]) -> Columns<'a> {
    let mut columns = Columns::default();
    for task in filtered {
        match task.status {
            Status::Todo => columns.todo.push(task),
            Status::InProgress => columns.in_progress.push(task),
            Status::Done => columns.done.push(task),
        }
    }
    columns
}

/// Built-in saved views, addressable as `view:<name>` filter terms.
pub const PREDEFINED_VIEWS: &[(&str, Criteria)] = &[
    ("all", Criteria::all()),
    (
        "todo",
        Criteria {
            status: Some(Status::Todo),
            importance: None,
            due: None,
        },
    ),
    (
        "in-progress",
        Criteria {
            status: Some(Status::InProgress),
            importance: None,
            due: None,
        },
    ),
    (
        "done",
        Criteria {
            status: Some(Status::Done),
            importance: None,
            due: None,
        },
    ),
    (
        "high-priority",
        Criteria {
            status: None,
            importance: Some(Importance::High),
            due: None,
        },
    ),
    (
        "due-today",
        Criteria {
            status: None,
            importance: None,
            due: Some(DueBucket::Today),
        },
    ),
    (
        "overdue",
        Criteria {
            status: None,
            importance: None,
            due: Some(DueBucket::Overdue),
        },
    ),
];

pub fn lookup_view(name: &str) -> Option<Criteria> {
    PREDEFINED_VIEWS
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, criteria)| *criteria)
}
