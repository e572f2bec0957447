use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  SecondsFormat,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "taskpilot-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TASKPILOT_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TASKPILOT_TIME_CONFIG";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Storage format of task deadlines.
pub const DEADLINE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn local_timezone() -> &'static Tz {
  static LOCAL_TZ: OnceLock<Tz> =
    OnceLock::new();
  LOCAL_TZ.get_or_init(resolve_timezone)
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(local_timezone())
    .date_naive()
}

/// Timestamp string used for `createdAt` fields.
#[must_use]
pub fn format_timestamp(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

#[must_use]
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw.trim())
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Renders a stored timestamp in the local timezone, falling back to the raw
/// string when it does not parse.
#[must_use]
pub fn display_timestamp(
  raw: &str
) -> String {
  match parse_timestamp(raw) {
    | Some(dt) => {
      dt.with_timezone(local_timezone())
        .format("%Y-%m-%d %H:%M")
        .to_string()
    }
    | None => raw.to_string()
  }
}

#[must_use]
pub fn format_deadline(
  date: NaiveDate
) -> String {
  date.format(DEADLINE_FORMAT).to_string()
}

/// Reads a stored deadline. Full timestamps are accepted and truncated to
/// their date part.
#[must_use]
pub fn parse_stored_deadline(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  let date_part =
    trimmed.get(..10).unwrap_or(trimmed);
  NaiveDate::parse_from_str(
    date_part,
    DEADLINE_FORMAT
  )
  .ok()
}

fn resolve_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
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

/// Parses a deadline expression relative to `now` in the local timezone.
///
/// Accepts `today`, `tomorrow`, `yesterday`, weekday names (next occurrence,
/// never today), relative offsets such as `+3d`, `-1d` or `+2w`, and
/// `YYYY-MM-DD`.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_deadline_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = local_date(now);

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(today + Duration::days(1));
    }
    | "yesterday" => {
      return Ok(today - Duration::days(1));
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let duration = match &caps["unit"] {
      | "w" => Duration::weeks(num),
      | _ => Duration::days(num)
    };
    return Ok(
      if &caps["sign"] == "-" {
        today - duration
      } else {
        today + duration
      }
    );
  }

  NaiveDate::parse_from_str(
    token,
    DEADLINE_FORMAT
  )
  .map_err(|_| {
    anyhow!(
      "unrecognized deadline: {token}"
    )
  })
}

fn parse_weekday_name(
  input: &str
) -> Option<Weekday> {
  match input {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let wanted = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (wanted - current).rem_euclid(7);
  if delta == 0 {
    delta = 7;
  }
  today + Duration::days(delta)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    display_timestamp,
    format_timestamp,
    parse_deadline_expr,
    parse_stored_deadline,
    parse_timestamp
  };

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_deadline() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let parsed = parse_deadline_expr(
      "2026-03-09",
      now
    )
    .expect("parse iso date");
    assert_eq!(parsed, date(2026, 3, 9));
  }

  #[test]
  fn parses_relative_offsets() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let plus = parse_deadline_expr(
      "+3d", now
    )
    .expect("parse +3d");
    let weeks = parse_deadline_expr(
      "+2w", now
    )
    .expect("parse +2w");
    let minus = parse_deadline_expr(
      "-1d", now
    )
    .expect("parse -1d");
    assert_eq!(plus, date(2026, 2, 20));
    assert_eq!(weeks, date(2026, 3, 3));
    assert_eq!(minus, date(2026, 2, 16));
  }

  #[test]
  fn weekday_names_skip_today() {
    // 2026-02-17 is a Tuesday.
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let wed = parse_deadline_expr(
      "wednesday",
      now
    )
    .expect("parse weekday");
    let tue =
      parse_deadline_expr("tue", now)
        .expect("parse weekday");
    assert_eq!(wed, date(2026, 2, 18));
    assert_eq!(tue, date(2026, 2, 24));
  }

  #[test]
  fn rejects_garbage() {
    let now = Utc::now();
    assert!(
      parse_deadline_expr("soonish", now)
        .is_err()
    );
  }

  #[test]
  fn stored_deadlines_accept_timestamps()
  {
    assert_eq!(
      parse_stored_deadline(
        "2026-04-01T00:00:00.000Z"
      ),
      Some(date(2026, 4, 1))
    );
    assert_eq!(
      parse_stored_deadline("2026-04-01"),
      Some(date(2026, 4, 1))
    );
    assert_eq!(
      parse_stored_deadline("April"),
      None
    );
  }

  #[test]
  fn timestamps_round_trip() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 8, 30, 0
      )
      .single()
      .expect("valid now");
    let raw = format_timestamp(now);
    assert_eq!(
      raw,
      "2026-02-17T08:30:00.000Z"
    );
    assert_eq!(
      parse_timestamp(&raw),
      Some(now)
    );
    assert_eq!(
      display_timestamp("not a time"),
      "not a time"
    );
  }
}
