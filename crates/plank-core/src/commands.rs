use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::board::Board;
use crate::cli::Invocation;
use crate::datetime::parse_date_expr;
use crate::filter::Criteria;
use crate::render::{Renderer, short_id};
use crate::task::{Importance, Status, Task};
use crate::view::{self, ViewMode};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "modify", "done", "move", "delete", "list", "board", "info", "views", "export",
        "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(board, renderer, inv))]
pub fn dispatch(board: &mut Board, renderer: &mut Renderer, inv: Invocation) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    let is_projection = matches!(command, "list" | "board" | "export");
    if !is_projection && !inv.filter_terms.is_empty() {
        warn!(terms = ?inv.filter_terms, "filter terms are ignored by {command}");
    }

    match command {
        "add" => cmd_add(board, &inv.command_args, now),
        "modify" => cmd_modify(board, &inv.command_args, now),
        "done" => cmd_done(board, &inv.command_args),
        "move" => cmd_move(board, &inv.command_args),
        "delete" => cmd_delete(board, &inv.command_args),
        "list" => {
            let terms = merged_filter_terms(&inv);
            cmd_projection(board, renderer, ViewMode::List, &terms, now)
        }
        "board" => {
            let terms = merged_filter_terms(&inv);
            cmd_projection(board, renderer, ViewMode::Board, &terms, now)
        }
        "info" => cmd_info(board, renderer, &inv.command_args, now),
        "views" => cmd_views(),
        "export" => {
            let terms = merged_filter_terms(&inv);
            cmd_export(board, &terms, now)
        }
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(board, args, now))]
fn cmd_add(board: &mut Board, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args, now)?;
    let text = words.join(" ").trim().to_string();
    if text.is_empty() {
        return Err(anyhow!("add requires a task description"));
    }

    // Defaults for unspecified fields: medium importance, status todo, due today.
    let mut importance = Importance::Medium;
    let mut due = parse_date_expr("today", now)?;
    let mut status = Status::Todo;
    for one_mod in mods {
        match one_mod {
            Mod::Importance(value) => importance = value,
            Mod::Due(value) => due = value,
            Mod::Status(value) => status = value,
        }
    }

    let task = board.create(text, importance, due, status)?;
    println!("Created task {}.", short_id(&task.id));
    Ok(())
}

#[instrument(skip(board, args, now))]
fn cmd_modify(board: &mut Board, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command modify");

    let (selector, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify requires a task id"))?;
    let Some(existing) = resolve_task(board, selector)? else {
        println!("No task matches {selector}.");
        return Ok(());
    };

    let (words, mods) = parse_words_and_mods(rest, now)?;

    // Wholesale replacement: the new record starts from the old one and
    // carries every given field over it.
    let mut record = existing.clone();
    if !words.is_empty() {
        record.text = words.join(" ").trim().to_string();
    }
    for one_mod in mods {
        match one_mod {
            Mod::Importance(value) => record.importance = value,
            Mod::Due(value) => record.due = Some(value),
            Mod::Status(value) => record.status = value,
        }
    }

    board.update(&existing.id, record)?;
    println!("Modified task {}.", short_id(&existing.id));
    Ok(())
}

#[instrument(skip(board, args))]
fn cmd_done(board: &mut Board, args: &[String]) -> anyhow::Result<()> {
    info!("command done");

    let selector = single_selector(args, "done")?;
    let Some(task) = resolve_task(board, selector)? else {
        println!("No task matches {selector}.");
        return Ok(());
    };

    board.toggle_done(&task.id)?;
    if let Some(after) = board.find(&task.id) {
        println!("Toggled task {} to {}.", short_id(&task.id), after.status);
    }
    Ok(())
}

#[instrument(skip(board, args))]
fn cmd_move(board: &mut Board, args: &[String]) -> anyhow::Result<()> {
    info!("command move");

    let [selector, status_raw] = args else {
        return Err(anyhow!("move requires a task id and a status"));
    };
    let status: Status = status_raw.parse()?;
    let Some(task) = resolve_task(board, selector)? else {
        println!("No task matches {selector}.");
        return Ok(());
    };

    board.move_status(&task.id, status)?;
    println!("Moved task {} to {}.", short_id(&task.id), status);
    Ok(())
}

#[instrument(skip(board, args))]
fn cmd_delete(board: &mut Board, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let selector = single_selector(args, "delete")?;
    let Some(task) = resolve_task(board, selector)? else {
        println!("No task matches {selector}.");
        return Ok(());
    };

    board.remove(&task.id)?;
    println!("Deleted task {}.", short_id(&task.id));
    Ok(())
}

#[instrument(skip(board, renderer, filter_terms, now))]
fn cmd_projection(
    board: &Board,
    renderer: &mut Renderer,
    mode: ViewMode,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!(?mode, "command list/board");

    let criteria = Criteria::parse(filter_terms)?;
    let filtered = criteria.apply(board.tasks(), now);
    debug!(
        total = board.tasks().len(),
        shown = filtered.len(),
        "projected board"
    );

    match mode {
        ViewMode::List => renderer.print_task_table(&filtered, now),
        ViewMode::Board => renderer.print_board(&view::group_by_status(&filtered)),
    }
}

#[instrument(skip(board, renderer, args, now))]
fn cmd_info(
    board: &Board,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command info");

    let selector = single_selector(args, "info")?;
    let Some(task) = resolve_task(board, selector)? else {
        println!("No task matches {selector}.");
        return Ok(());
    };

    renderer.print_task_info(&task, now)
}

fn cmd_views() -> anyhow::Result<()> {
    for (name, criteria) in view::PREDEFINED_VIEWS {
        println!("{name:<14} {}", describe_criteria(criteria));
    }
    Ok(())
}

#[instrument(skip(board, filter_terms, now))]
fn cmd_export(board: &Board, filter_terms: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command export");

    let criteria = Criteria::parse(filter_terms)?;
    let filtered = criteria.apply(board.tasks(), now);
    let out = serde_json::to_string(&filtered)?;
    println!("{out}");
    Ok(())
}

/// Projection commands accept filter terms on either side of the command
/// token.
fn merged_filter_terms(inv: &Invocation) -> Vec<String> {
    let mut terms = inv.filter_terms.clone();
    terms.extend(inv.command_args.iter().cloned());
    terms
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: plank [filter terms] <command> [args]");
    println!();
    println!("commands: add, modify, done, move, delete, list, board, info, views, export, help, version");
    println!("filter terms: status:<todo|in-progress|done|all>, importance:<low|medium|high>, due:<today|this-week|overdue>, view:<name>");
    Ok(())
}

fn describe_criteria(criteria: &Criteria) -> String {
    let mut parts = Vec::new();
    if let Some(status) = criteria.status {
        parts.push(format!("status:{status}"));
    }
    if let Some(importance) = criteria.importance {
        parts.push(format!("importance:{importance}"));
    }
    if let Some(due) = criteria.due {
        parts.push(format!("due:{due}"));
    }
    if parts.is_empty() {
        "(everything)".to_string()
    } else {
        parts.join(" ")
    }
}

fn single_selector<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    match args {
        [selector] => Ok(selector.as_str()),
        _ => Err(anyhow!("{command} requires exactly one task id")),
    }
}

/// Resolves a user-supplied selector to a task: an exact id, or an
/// unambiguous id prefix. A selector matching nothing is not an error; the
/// store treats mutations of unknown ids as no-ops.
fn resolve_task(board: &Board, selector: &str) -> anyhow::Result<Option<Task>> {
    if selector.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    if let Some(task) = board.find(selector) {
        return Ok(Some(task.clone()));
    }

    let mut matches = board
        .tasks()
        .iter()
        .filter(|task| task.id.starts_with(selector));
    let Some(first) = matches.next() else {
        return Ok(None);
    };
    if matches.next().is_some() {
        return Err(anyhow!("task id prefix is ambiguous: {selector}"));
    }
    Ok(Some(first.clone()))
}

enum Mod {
    Importance(Importance),
    Due(DateTime<Utc>),
    Status(Status),
}

/// Splits arguments into free text words and `key:value` modifiers.
/// Unrecognized keys stay part of the text, so labels may contain colons.
fn parse_words_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    for arg in args {
        if let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
        } else {
            words.push(arg.clone());
        }
    }

    Ok((words, mods))
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "importance" | "imp" | "priority" | "pri" => Ok(Some(Mod::Importance(value.parse()?))),
        "due" => Ok(Some(Mod::Due(parse_date_expr(value, now)?))),
        "status" => Ok(Some(Mod::Status(value.parse()?))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::{cmd_add, cmd_modify, cmd_move, expand_command_abbrev, resolve_task};
    use crate::board::Board;
    use crate::datastore::DataStore;
    use crate::task::{Importance, Status};

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn empty_board(dir: &std::path::Path) -> Board {
        let store = DataStore::open(dir).expect("open datastore");
        store.save(&[]).expect("start empty");
        Board::open(store, fixed_now()).expect("open board")
    }

    #[test]
    fn abbreviations_expand_only_when_unambiguous() {
        let known = super::known_command_names();
        assert_eq!(expand_command_abbrev("exp", &known), Some("export"));
        assert_eq!(expand_command_abbrev("do", &known), Some("done"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        // "d" could be done or delete.
        assert_eq!(expand_command_abbrev("d", &known), None);
    }

    #[test]
    fn add_parses_modifiers_and_defaults() {
        let temp = tempdir().expect("tempdir");
        let mut board = empty_board(temp.path());
        let now = fixed_now();

        cmd_add(
            &mut board,
            &[
                "Ship".to_string(),
                "the".to_string(),
                "release".to_string(),
                "importance:high".to_string(),
                "due:tomorrow".to_string(),
            ],
            now,
        )
        .expect("add");

        let task = &board.tasks()[0];
        assert_eq!(task.text, "Ship the release");
        assert_eq!(task.importance, Importance::High);
        assert_eq!(task.status, Status::Todo);
        assert_eq!(
            task.due,
            Some(Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn add_rejects_an_empty_description() {
        let temp = tempdir().expect("tempdir");
        let mut board = empty_board(temp.path());

        assert!(cmd_add(&mut board, &[], fixed_now()).is_err());
        assert!(
            cmd_add(&mut board, &["importance:low".to_string()], fixed_now()).is_err()
        );
        assert!(board.tasks().is_empty());
    }

    #[test]
    fn modify_replaces_only_the_given_fields() {
        let temp = tempdir().expect("tempdir");
        let mut board = empty_board(temp.path());
        let now = fixed_now();

        let task = board
            .create("draft".to_string(), Importance::Low, now, Status::Todo)
            .expect("create");

        cmd_modify(
            &mut board,
            &[task.id.clone(), "status:in-progress".to_string()],
            now,
        )
        .expect("modify");

        let after = board.find(&task.id).expect("find");
        assert_eq!(after.status, Status::InProgress);
        assert_eq!(after.text, "draft");
        assert_eq!(after.importance, Importance::Low);
    }

    #[test]
    fn move_rejects_out_of_set_statuses() {
        let temp = tempdir().expect("tempdir");
        let mut board = empty_board(temp.path());
        let now = fixed_now();

        let task = board
            .create("shuffle".to_string(), Importance::Medium, now, Status::Todo)
            .expect("create");

        let err = cmd_move(&mut board, &[task.id.clone(), "archived".to_string()]);
        assert!(err.is_err());
        assert_eq!(board.find(&task.id).expect("find").status, Status::Todo);
    }

    #[test]
    fn selectors_resolve_exact_ids_and_unique_prefixes() {
        let temp = tempdir().expect("tempdir");
        let mut board = empty_board(temp.path());
        let now = fixed_now();

        let a = board
            .create("a".to_string(), Importance::Low, now, Status::Todo)
            .expect("create");
        board
            .create("b".to_string(), Importance::Low, now, Status::Todo)
            .expect("create");

        let exact = resolve_task(&board, &a.id).expect("resolve");
        assert_eq!(exact.map(|t| t.id), Some(a.id.clone()));

        let prefix = resolve_task(&board, &a.id[..8]).expect("resolve prefix");
        assert_eq!(prefix.map(|t| t.id), Some(a.id.clone()));

        assert!(resolve_task(&board, "zzz").expect("resolve miss").is_none());
        // Every uuid shares the empty prefix; a blank selector is an error,
        // as is any genuinely ambiguous one.
        assert!(resolve_task(&board, "").is_err());
    }
}
