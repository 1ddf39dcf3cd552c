use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::datetime::{due_overdue, due_this_week, due_today};
use crate::task::{Importance, Status, Task};

/// The three due-date buckets a board can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBucket {
    Today,
    ThisWeek,
    Overdue,
}

impl std::fmt::Display for DueBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DueBucket::Today => "today",
            DueBucket::ThisWeek => "this-week",
            DueBucket::Overdue => "overdue",
        })
    }
}

impl std::str::FromStr for DueBucket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(DueBucket::Today),
            "this-week" | "thisweek" | "week" => Ok(DueBucket::ThisWeek),
            "overdue" => Ok(DueBucket::Overdue),
            other => Err(anyhow!(
                "invalid due bucket: {other} (expected today, this-week or overdue)"
            )),
        }
    }
}

/// Transient filter criteria: the conjunction of up to three predicates.
/// `status: None` is the "all" sentinel. Never persisted; every invocation
/// starts from `Criteria::all()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Criteria {
    pub status: Option<Status>,
    pub importance: Option<Importance>,
    pub due: Option<DueBucket>,
}

impl Criteria {
    pub const fn all() -> Self {
        Self {
            status: None,
            importance: None,
            due: None,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        *self == Self::all()
    }

    /// Parses CLI filter terms. Recognized forms: `status:<todo|in-progress|
    /// done|all>`, `importance:<low|medium|high|1-3>` (alias `priority:`),
    /// `due:<today|this-week|overdue>`, `view:<name>`. Anything else is a
    /// validation error.
    #[tracing::instrument(skip(terms))]
    pub fn parse(terms: &[String]) -> anyhow::Result<Self> {
        let mut criteria = Criteria::all();

        for term in terms {
            if let Some(value) = term.strip_prefix("status:") {
                criteria.status = if value.eq_ignore_ascii_case("all") {
                    None
                } else {
                    Some(value.parse()?)
                };
            } else if let Some(value) = term
                .strip_prefix("importance:")
                .or_else(|| term.strip_prefix("priority:"))
            {
                criteria.importance = Some(value.parse()?);
            } else if let Some(value) = term.strip_prefix("due:") {
                criteria.due = Some(value.parse()?);
            } else if let Some(name) = term.strip_prefix("view:") {
                // A named view replaces the criteria built so far, the way
                // picking a saved view resets the filter; later terms still
                // refine it.
                criteria = crate::view::lookup_view(name)
                    .ok_or_else(|| anyhow!("unknown view: {name} (see the views command)"))?;
            } else {
                return Err(anyhow!(
                    "unrecognized filter term: {term} (expected status:, importance:, due: or view:)"
                ));
            }
        }

        Ok(criteria)
    }

    /// True when every active predicate holds. Predicates are independent
    /// and AND-ed; evaluation order does not matter.
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if let Some(status) = self.status
            && task.status != status
        {
            trace!(id = %task.id, %status, "status predicate rejected task");
            return false;
        }

        if let Some(importance) = self.importance
            && task.importance != importance
        {
            trace!(id = %task.id, %importance, "importance predicate rejected task");
            return false;
        }

        if let Some(bucket) = self.due {
            // The invalid-date state fails every bucket.
            let Some(due) = task.due else {
                trace!(id = %task.id, %bucket, "task has no parsable due date");
                return false;
            };
            let ok = match bucket {
                DueBucket::Today => due_today(due, now),
                DueBucket::ThisWeek => due_this_week(due, now),
                DueBucket::Overdue => due_overdue(due, now) && task.status != Status::Done,
            };
            if !ok {
                trace!(id = %task.id, %bucket, "due predicate rejected task");
                return false;
            }
        }

        true
    }

    /// The filtered sequence: storage order, never re-sorted.
    pub fn apply<'a>(&self, tasks: &'a [Task], now: DateTime<Utc>) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|task| self.matches(task, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Criteria, DueBucket};
    use crate::task::{Importance, Status, Task};

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn task(id: &str, status: Status, importance: Importance, due_offset_days: i64) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task {id}"),
            status,
            importance,
            due: Some(fixed_now() + Duration::days(due_offset_days)),
        }
    }

    #[test]
    fn importance_filter_selects_the_matching_record() {
        let now = fixed_now();
        let tasks = vec![
            task("1", Status::Todo, Importance::Medium, -5),
            task("2", Status::Done, Importance::High, -10),
        ];

        let criteria = Criteria::parse(&["priority:3".to_string()]).expect("parse");
        let filtered = criteria.apply(&tasks, now);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "2");
    }

    #[test]
    fn predicates_commute() {
        let now = fixed_now();
        let tasks = vec![
            task("1", Status::Done, Importance::High, 0),
            task("2", Status::Done, Importance::Low, 0),
            task("3", Status::Todo, Importance::High, 0),
        ];

        let both = Criteria {
            status: Some(Status::Done),
            importance: Some(Importance::High),
            due: None,
        };
        let status_only = Criteria {
            status: Some(Status::Done),
            ..Criteria::all()
        };
        let importance_only = Criteria {
            importance: Some(Importance::High),
            ..Criteria::all()
        };

        let combined: Vec<_> = both.apply(&tasks, now).iter().map(|t| t.id.clone()).collect();
        let sequential: Vec<_> = tasks
            .iter()
            .filter(|t| status_only.matches(t, now))
            .filter(|t| importance_only.matches(t, now))
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(combined, sequential);
        assert_eq!(combined, vec!["1".to_string()]);
    }

    #[test]
    fn status_all_is_a_sentinel_for_no_status_predicate() {
        let criteria = Criteria::parse(&["status:all".to_string()]).expect("parse");
        assert!(criteria.is_unfiltered());

        let narrowed = Criteria::parse(&["status:in-progress".to_string()]).expect("parse");
        assert_eq!(narrowed.status, Some(Status::InProgress));
    }

    #[test]
    fn overdue_excludes_done_tasks() {
        let now = fixed_now();
        let mut yesterday = task("1", Status::Todo, Importance::Medium, -1);
        let criteria = Criteria {
            due: Some(DueBucket::Overdue),
            ..Criteria::all()
        };

        assert!(criteria.matches(&yesterday, now));
        yesterday.status = Status::Done;
        assert!(!criteria.matches(&yesterday, now));
    }

    #[test]
    fn invalid_due_date_fails_every_bucket() {
        let now = fixed_now();
        let mut broken = task("1", Status::Todo, Importance::Medium, -1);
        broken.due = None;

        for bucket in [DueBucket::Today, DueBucket::ThisWeek, DueBucket::Overdue] {
            let criteria = Criteria {
                due: Some(bucket),
                ..Criteria::all()
            };
            assert!(!criteria.matches(&broken, now), "bucket {bucket}");
        }
    }

    #[test]
    fn apply_preserves_storage_order() {
        let now = fixed_now();
        let tasks = vec![
            task("c", Status::Todo, Importance::High, 0),
            task("a", Status::Todo, Importance::High, 0),
            task("b", Status::Todo, Importance::High, 0),
        ];

        let ids: Vec<_> = Criteria::all()
            .apply(&tasks, now)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids, vec!["c".to_string(), "a".to_string(), "b".to_string()]);
    }

    #[test]
    fn view_terms_expand_to_their_criteria() {
        let criteria = Criteria::parse(&["view:high-priority".to_string()]).expect("parse");
        assert_eq!(criteria.importance, Some(Importance::High));

        let refined = Criteria::parse(&[
            "view:overdue".to_string(),
            "importance:low".to_string(),
        ])
        .expect("parse");
        assert_eq!(refined.due, Some(DueBucket::Overdue));
        assert_eq!(refined.importance, Some(Importance::Low));

        assert!(Criteria::parse(&["view:nope".to_string()]).is_err());
    }

    #[test]
    fn unknown_terms_are_rejected() {
        assert!(Criteria::parse(&["assignee:me".to_string()]).is_err());
        assert!(Criteria::parse(&["status:archived".to_string()]).is_err());
        assert!(Criteria::parse(&["importance:9".to_string()]).is_err());
        assert!(Criteria::parse(&["due:someday".to_string()]).is_err());
    }
}
