use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::{due_overdue, format_due};
use crate::task::{Status, Task};
use crate::view::Columns;

const KANBAN_COLUMN_WIDTH: usize = 34;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Flat projection: one table row per task in storage order.
    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&mut self, tasks: &[&Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks match the current filters.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Importance".to_string(),
            "Due".to_string(),
            "Task".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(short_id(&task.id), "33");

            let due = format_due(task.due);
            let overdue = task
                .due
                .map(|due| due_overdue(due, now) && task.status != Status::Done)
                .unwrap_or(false);
            let due = if overdue { self.paint(&due, "31") } else { due };

            rows.push(vec![
                id,
                task.status.to_string(),
                task.importance.to_string(),
                due,
                task.text.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Grouped projection: three status columns side by side.
    #[tracing::instrument(skip(self, columns))]
    pub fn print_board(&mut self, columns: &Columns<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if columns.is_empty() {
            writeln!(out, "No tasks match the current filters.")?;
            return Ok(());
        }

        let mut rendered: Vec<Vec<String>> = Vec::with_capacity(Status::ALL.len());
        let mut headings = Vec::with_capacity(Status::ALL.len());
        for status in Status::ALL {
            let column = columns.column(status);
            headings.push(format!("{} ({})", status.heading(), column.len()));
            rendered.push(
                column
                    .iter()
                    .map(|task| {
                        truncate_to_width(
                            &format!("{} · {}", task.text, format_due(task.due)),
                            KANBAN_COLUMN_WIDTH,
                        )
                    })
                    .collect(),
            );
        }

        for (idx, heading) in headings.iter().enumerate() {
            let painted = self.paint(heading, "1");
            write_cell(&mut out, &painted, KANBAN_COLUMN_WIDTH, idx + 1 < headings.len())?;
        }
        writeln!(out)?;
        for idx in 0..headings.len() {
            write_cell(
                &mut out,
                &"-".repeat(KANBAN_COLUMN_WIDTH),
                KANBAN_COLUMN_WIDTH,
                idx + 1 < headings.len(),
            )?;
        }
        writeln!(out)?;

        let depth = rendered.iter().map(Vec::len).max().unwrap_or(0);
        for row in 0..depth {
            for (idx, column) in rendered.iter().enumerate() {
                let cell = column.get(row).map(String::as_str).unwrap_or("");
                write_cell(&mut out, cell, KANBAN_COLUMN_WIDTH, idx + 1 < rendered.len())?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    /// Single-task detail view.
    #[tracing::instrument(skip(self, task, now))]
    pub fn print_task_info(&mut self, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "task        {}", task.text)?;
        writeln!(out, "status      {}", task.status)?;
        writeln!(
            out,
            "importance  {} ({})",
            task.importance,
            u8::from(task.importance)
        )?;

        let due = format_due(task.due);
        let overdue = task
            .due
            .map(|due| due_overdue(due, now) && task.status != Status::Done)
            .unwrap_or(false);
        if overdue {
            writeln!(out, "due         {} (overdue)", self.paint(&due, "31"))?;
        } else {
            writeln!(out, "due         {due}")?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// First eight characters of an id: enough to address any realistic board,
/// and the whole id for the short seed ids.
pub fn short_id(id: &str) -> &str {
    let mut end = 0;
    for (count, (idx, ch)) in id.char_indices().enumerate() {
        if count == 8 {
            return &id[..end];
        }
        end = idx + ch.len_utf8();
    }
    id
}

fn write_cell<W: Write>(
    mut writer: W,
    cell: &str,
    width: usize,
    pad_after: bool,
) -> anyhow::Result<()> {
    let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    write!(writer, "{cell}")?;
    if pad_after {
        let padding = width.saturating_sub(visible);
        write!(writer, "{}  ", " ".repeat(padding))?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let budget = max.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > budget {
            break;
        }
        out.push(ch);
        used += width;
    }
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
