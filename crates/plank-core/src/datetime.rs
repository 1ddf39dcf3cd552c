use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "plank-time.toml";
const TIMEZONE_ENV_VAR: &str = "PLANK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "PLANK_TIME_CONFIG";
const DEFAULT_BOARD_TIMEZONE: &str = "UTC";

/// Shown wherever a task's due date cannot be represented.
pub const INVALID_DATE_LABEL: &str = "Invalid date";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The timezone every day-granularity comparison happens in. Resolved once
/// per process: `PLANK_TIMEZONE` env var, then `plank-time.toml`, then UTC.
pub fn board_timezone() -> &'static Tz {
    static BOARD_TZ: OnceLock<Tz> = OnceLock::new();
    BOARD_TZ.get_or_init(resolve_board_timezone)
}

#[must_use]
pub fn format_board_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(board_timezone())
        .format("%Y-%m-%d")
        .to_string()
}

/// Renders a due date for display; the invalid state gets a fixed label.
#[must_use]
pub fn format_due(due: Option<DateTime<Utc>>) -> String {
    match due {
        Some(dt) => format_board_date(dt),
        None => INVALID_DATE_LABEL.to_string(),
    }
}

fn local_naive(dt: DateTime<Utc>) -> NaiveDateTime {
    dt.with_timezone(board_timezone()).naive_local()
}

fn start_of_today(now: DateTime<Utc>) -> NaiveDateTime {
    local_naive(now).date().and_time(NaiveTime::MIN)
}

/// Due falls within [start of today, start of tomorrow).
#[must_use]
pub fn due_today(due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let start = start_of_today(now);
    let due = local_naive(due);
    due >= start && due < start + Duration::days(1)
}

/// Due falls within [start of today, week-end midnight]. The week end is
/// `today + (7 - days_from_sunday)` days; the lower bound is pinned to
/// today rather than the start of the calendar week, and the upper bound is
/// closed at the midnight instant.
#[must_use]
pub fn due_this_week(due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let start = start_of_today(now);
    let days_ahead = 7 - i64::from(start.date().weekday().num_days_from_sunday());
    let week_end = start + Duration::days(days_ahead);
    let due = local_naive(due);
    due >= start && due <= week_end
}

/// Due is strictly before the start of today. Callers exclude done tasks.
#[must_use]
pub fn due_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    local_naive(due) < start_of_today(now)
}

fn resolve_board_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR) {
        if let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR) {
            return tz;
        }
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_BOARD_TIMEZONE, "DEFAULT_BOARD_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured board timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(
                source,
                timezone = %trimmed,
                error = %err,
                "failed to parse timezone id"
            );
            None
        }
    }
}

fn to_utc_from_board_local(
    local_naive: NaiveDateTime,
    context: &str,
) -> anyhow::Result<DateTime<Utc>> {
    match board_timezone().from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Ok(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                context,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Ok(chosen.with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in configured timezone: {context}"
        )),
    }
}

/// Parses a user-supplied due-date expression into an instant.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let midnight = start_of_today(now);
            return to_utc_from_board_local(midnight, "today");
        }
        "tomorrow" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today + Duration::days(1));
        }
        "yesterday" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today - Duration::days(1));
        }
        _ => {}
    }

    if let Some(target_weekday) = parse_weekday_name(&lower) {
        let local_today = local_naive(now).date();
        let target_date = next_weekday_date(local_today, target_weekday);
        let midnight = target_date.and_time(NaiveTime::MIN);
        return to_utc_from_board_local(midnight, "weekday-name");
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

    if let Some(caps) = rel_re.captures(token) {
        let sign = caps
            .name("sign")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative sign"))?;
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative unit"))?;

        let duration = match unit {
            "d" => Duration::days(num),
            "h" => Duration::hours(num),
            "m" => Duration::minutes(num),
            _ => return Err(anyhow!("unknown relative unit: {unit}")),
        };

        return Ok(if sign == "-" { now - duration } else { now + duration });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return to_utc_from_board_local(date.and_time(NaiveTime::MIN), "date");
    }

    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_board_local(ndt, fmt);
        }
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported forms: now/today/tomorrow/yesterday, weekday names (e.g. monday), \
         +Nd/+Nh/+Nm, RFC3339, YYYY-MM-DD, YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM"
    })
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday_date(today: NaiveDate, target: Weekday) -> NaiveDate {
    let today_index = i64::from(today.weekday().num_days_from_monday());
    let target_index = i64::from(target.num_days_from_monday());
    let mut ahead = (target_index - today_index).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

/// Serde codec for the persisted `dueDate` field. Serializes as an ISO-8601
/// string (or null for the invalid state); deserializes leniently, mapping
/// an unparsable string to `None` instead of failing the whole document.
pub mod due_date_serde {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(due: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match due {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(text) => Ok(parse_wire_date(&text)),
            None => Ok(None),
        }
    }

    fn parse_wire_date(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        // Bare dates were written by hand-edited stores; treat them as UTC
        // midnight the way `new Date("YYYY-MM-DD")` did.
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
        tracing::warn!(raw, "unparsable due date; carrying it as invalid");
        None
    }
}
