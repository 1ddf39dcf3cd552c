use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::due_date_serde;

/// Lifecycle stage of a task. The wire names are camel case
/// (`"inProgress"`) to match the persisted board format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "inProgress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl Status {
    /// Column order of the board.
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];

    pub fn heading(self) -> &'static str {
        match self {
            Status::Todo => "To Do",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        })
    }
}

impl std::str::FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "todo" => Ok(Status::Todo),
            "in-progress" | "inprogress" | "in_progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            other => Err(anyhow!(
                "invalid status: {other} (expected todo, in-progress or done)"
            )),
        }
    }
}

/// Urgency level, carried numerically as 1-3 in the persisted form.
/// Out-of-range numbers are rejected at the serde boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Importance {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl From<Importance> for u8 {
    fn from(value: Importance) -> Self {
        match value {
            Importance::Low => 1,
            Importance::Medium => 2,
            Importance::High => 3,
        }
    }
}

impl TryFrom<u8> for Importance {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Importance::Low),
            2 => Ok(Importance::Medium),
            3 => Ok(Importance::High),
            other => Err(anyhow!("invalid importance: {other} (expected 1, 2 or 3)")),
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
        })
    }
}

impl std::str::FromStr for Importance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Importance::Low),
            "medium" | "2" => Ok(Importance::Medium),
            "high" | "3" => Ok(Importance::High),
            other => Err(anyhow!(
                "invalid importance: {other} (expected low, medium, high or 1-3)"
            )),
        }
    }
}

/// A single work item. `due` is `None` when the persisted `dueDate` string
/// could not be parsed; such a task renders as "Invalid date" and never
/// matches a due-date filter bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,

    pub text: String,

    pub status: Status,

    pub importance: Importance,

    #[serde(rename = "dueDate", with = "due_date_serde")]
    pub due: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(text: String, importance: Importance, due: DateTime<Utc>, status: Status) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            status,
            importance,
            due: Some(due),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Importance, Status, Task};

    #[test]
    fn wire_format_matches_persisted_shape() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let task = Task {
            id: "2".to_string(),
            text: "Walk the cat".to_string(),
            status: Status::InProgress,
            importance: Importance::Low,
            due: Some(due),
        };

        let json = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(json["id"], "2");
        assert_eq!(json["text"], "Walk the cat");
        assert_eq!(json["status"], "inProgress");
        assert_eq!(json["importance"], 1);
        assert_eq!(json["dueDate"], "2024-01-10T00:00:00+00:00");

        let back: Task = serde_json::from_value(json).expect("deserialize task");
        assert_eq!(back, task);
    }

    #[test]
    fn unknown_status_is_rejected_on_the_wire() {
        let raw = r#"{"id":"x","text":"t","status":"archived","importance":2,"dueDate":null}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn out_of_range_importance_is_rejected_on_the_wire() {
        let raw = r#"{"id":"x","text":"t","status":"todo","importance":5,"dueDate":null}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn status_parsing_accepts_the_closed_set_only() {
        assert_eq!("todo".parse::<Status>().expect("todo"), Status::Todo);
        assert_eq!(
            "In-Progress".parse::<Status>().expect("in-progress"),
            Status::InProgress
        );
        assert_eq!("done".parse::<Status>().expect("done"), Status::Done);
        assert!("doing".parse::<Status>().is_err());
        assert!("".parse::<Status>().is_err());
    }

    #[test]
    fn importance_parses_names_and_digits() {
        assert_eq!("high".parse::<Importance>().expect("high"), Importance::High);
        assert_eq!("2".parse::<Importance>().expect("2"), Importance::Medium);
        assert!("0".parse::<Importance>().is_err());
        assert!("urgent".parse::<Importance>().is_err());
    }

    #[test]
    fn new_tasks_get_distinct_ids() {
        let now = Utc::now();
        let a = Task::new("a".to_string(), Importance::Medium, now, Status::Todo);
        let b = Task::new("b".to_string(), Importance::Medium, now, Status::Todo);
        assert_ne!(a.id, b.id);
    }
}
