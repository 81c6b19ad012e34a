use std::fmt;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  NaiveDateTime,
  Weekday
};
use regex::{
  Captures,
  Regex
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

pub const MONTH_NAMES: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December"
];

pub const MONTH_NAMES_SHORT: [&str;
  12] = [
  "Jan", "Feb", "Mar", "Apr", "May",
  "Jun", "Jul", "Aug", "Sep", "Oct",
  "Nov", "Dec"
];

/// Indexed from Sunday.
pub const DAY_NAMES: [&str; 7] = [
  "Sunday",
  "Monday",
  "Tuesday",
  "Wednesday",
  "Thursday",
  "Friday",
  "Saturday"
];

pub const DAY_NAMES_SHORT: [&str; 7] = [
  "Sun", "Mon", "Tue", "Wed", "Thu",
  "Fri", "Sat"
];

pub const DAY_NAMES_MIN: [&str; 7] = [
  "Su", "Mo", "Tu", "We", "Th", "Fr",
  "Sa"
];

const FORMAT_TOKEN_PATTERN: &str =
  "YYYY|YY|MMMM|MMM|MM|M|DD|D|dddd|ddd|dd";

/// A local calendar day. Time of day
/// never enters into it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
  /// `month0` is zero-based (0 =
  /// January).
  #[must_use]
  pub fn new(
    year: i32,
    month0: u32,
    day: u32
  ) -> Option<Self> {
    NaiveDate::from_ymd_opt(
      year,
      month0.checked_add(1)?,
      day
    )
    .map(Self)
  }

  #[must_use]
  pub fn today() -> Self {
    Self(Local::now().date_naive())
  }

  #[must_use]
  pub fn naive(&self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month0(&self) -> u32 {
    self.0.month0()
  }

  #[must_use]
  pub fn day(&self) -> u32 {
    self.0.day()
  }

  #[must_use]
  pub fn weekday(&self) -> Weekday {
    self.0.weekday()
  }

  #[must_use]
  pub fn iso(&self) -> String {
    iso_day(self)
  }
}

impl From<NaiveDate> for CalendarDate {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl fmt::Display for CalendarDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&iso_day(self))
  }
}

impl Serialize for CalendarDate {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&iso_day(self))
  }
}

impl<'de> Deserialize<'de>
  for CalendarDate
{
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    parse_iso_day(&raw).ok_or_else(
      || {
        serde::de::Error::custom(
          format!(
            "expected YYYY-MM-DD, got \
             {raw}"
          )
        )
      }
    )
  }
}

/// Anything `parse_date` accepts.
#[derive(Debug, Clone)]
pub enum DateInput {
  Date(CalendarDate),
  Text(String)
}

impl From<CalendarDate> for DateInput {
  fn from(date: CalendarDate) -> Self {
    Self::Date(date)
  }
}

impl From<NaiveDate> for DateInput {
  fn from(date: NaiveDate) -> Self {
    Self::Date(CalendarDate(date))
  }
}

impl From<&str> for DateInput {
  fn from(raw: &str) -> Self {
    Self::Text(raw.to_string())
  }
}

impl From<String> for DateInput {
  fn from(raw: String) -> Self {
    Self::Text(raw)
  }
}

/// Zero-padded `YYYY-MM-DD` built from
/// the local fields.
#[must_use]
pub fn iso_day(
  date: &CalendarDate
) -> String {
  format!(
    "{:04}-{:02}-{:02}",
    date.year(),
    date.month0() + 1,
    date.day()
  )
}

fn format_token_regex()
-> Option<&'static Regex> {
  static TOKENS: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  TOKENS
    .get_or_init(|| {
      match Regex::new(
        FORMAT_TOKEN_PATTERN
      ) {
        | Ok(re) => Some(re),
        | Err(err) => {
          tracing::error!(
            error = %err,
            "failed to compile format token regex"
          );
          None
        }
      }
    })
    .as_ref()
}

/// Formats `date` with a token pattern
/// (`YYYY`, `MMMM`, `DD`, `dddd`,
/// ...). Tokens are matched longest
/// first in a single pass, so text
/// produced by one token is never
/// re-read as another. Without a
/// pattern the en-US short date is
/// used.
#[must_use]
pub fn format_date(
  date: &CalendarDate,
  pattern: Option<&str>
) -> String {
  let Some(pattern) = pattern
    .filter(|p| !p.trim().is_empty())
  else {
    return date
      .naive()
      .format("%-m/%-d/%Y")
      .to_string();
  };

  let Some(re) = format_token_regex()
  else {
    return iso_day(date);
  };

  let month0 = date.month0() as usize;
  let weekday = date
    .weekday()
    .num_days_from_sunday()
    as usize;

  re.replace_all(
    pattern,
    |caps: &Captures<'_>| {
      match &caps[0] {
        | "YYYY" => {
          format!("{:04}", date.year())
        }
        | "YY" => format!(
          "{:02}",
          date.year().rem_euclid(100)
        ),
        | "MMMM" => {
          MONTH_NAMES[month0]
            .to_string()
        }
        | "MMM" => {
          MONTH_NAMES_SHORT[month0]
            .to_string()
        }
        | "MM" => {
          format!("{:02}", month0 + 1)
        }
        | "M" => {
          (month0 + 1).to_string()
        }
        | "DD" => {
          format!("{:02}", date.day())
        }
        | "D" => date.day().to_string(),
        | "dddd" => {
          DAY_NAMES[weekday].to_string()
        }
        | "ddd" => {
          DAY_NAMES_SHORT[weekday]
            .to_string()
        }
        | "dd" => {
          DAY_NAMES_MIN[weekday]
            .to_string()
        }
        | other => other.to_string()
      }
    }
  )
  .into_owned()
}

/// Like `parse_date_at` with today's
/// local day.
#[must_use]
pub fn parse_date(
  input: impl Into<DateInput>
) -> Option<CalendarDate> {
  parse_date_at(
    input,
    CalendarDate::today()
  )
}

/// Resolves a date value, `today`
/// (plus `tomorrow`/`yesterday`), an
/// ISO day read as local components,
/// or a handful of common textual
/// forms. `None` means "ignore this".
#[tracing::instrument(
  level = "trace",
  skip(input)
)]
pub fn parse_date_at(
  input: impl Into<DateInput>,
  today: CalendarDate
) -> Option<CalendarDate> {
  let raw = match input.into() {
    | DateInput::Date(date) => {
      return Some(date);
    }
    | DateInput::Text(raw) => raw
  };

  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Some(today),
    | "tomorrow" => {
      return Some(add_days(&today, 1));
    }
    | "yesterday" => {
      return Some(add_days(
        &today, -1
      ));
    }
    | _ => {}
  }

  if let Some(date) =
    parse_iso_day(token)
  {
    return Some(date);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(CalendarDate(
      dt.with_timezone(&Local)
        .date_naive()
    ));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(CalendarDate(
        ndt.date()
      ));
    }
  }

  for fmt in [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%a %b %d %Y"
  ] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Some(CalendarDate(date));
    }
  }

  tracing::debug!(
    input = %token,
    "unparseable date input"
  );
  None
}

fn iso_day_regex()
-> Option<&'static Regex> {
  static ISO: OnceLock<Option<Regex>> =
    OnceLock::new();
  ISO
    .get_or_init(|| {
      Regex::new(
        r"^(?P<y>-\d{3,}|\+?\d{4,})-(?P<m>\d{2})-(?P<d>\d{2})$"
      )
      .ok()
    })
    .as_ref()
}

fn parse_iso_day(
  token: &str
) -> Option<CalendarDate> {
  let caps = iso_day_regex()?
    .captures(token.trim())?;
  let year =
    caps["y"].parse::<i32>().ok()?;
  let month =
    caps["m"].parse::<u32>().ok()?;
  let day =
    caps["d"].parse::<u32>().ok()?;
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .map(CalendarDate)
}

#[must_use]
pub fn add_days(
  date: &CalendarDate,
  days: i64
) -> CalendarDate {
  date
    .0
    .checked_add_signed(Duration::days(
      days
    ))
    .map(CalendarDate)
    .unwrap_or(*date)
}

/// Whole days from `a` to `b`
/// (negative when `b` is earlier).
#[must_use]
pub fn days_diff(
  a: &CalendarDate,
  b: &CalendarDate
) -> i64 {
  b.0.signed_duration_since(a.0)
    .num_days()
}

#[must_use]
pub fn is_same_day(
  a: &CalendarDate,
  b: &CalendarDate
) -> bool {
  iso_day(a) == iso_day(b)
}

/// `month0` is zero-based.
#[must_use]
pub fn days_in_month(
  year: i32,
  month0: u32
) -> u32 {
  let (next_year, next_month) =
    if month0 >= 11 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month0 + 2)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(31)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(
    y: i32,
    m0: u32,
    d: u32
  ) -> CalendarDate {
    CalendarDate::new(y, m0, d)
      .expect("valid date")
  }

  #[test]
  fn iso_day_is_zero_padded() {
    assert_eq!(
      iso_day(&date(2025, 0, 5)),
      "2025-01-05"
    );
    assert_eq!(
      iso_day(&date(987, 10, 25)),
      "0987-11-25"
    );
  }

  #[test]
  fn formats_long_tokens_before_short_ones()
   {
    let d = date(2025, 10, 25);
    assert_eq!(
      format_date(
        &d,
        Some("dddd, MMMM D YYYY")
      ),
      "Tuesday, November 25 2025"
    );
    assert_eq!(
      format_date(&d, Some("DD/MM/YY")),
      "25/11/25"
    );
    assert_eq!(
      format_date(&d, Some("ddd MMM")),
      "Tue Nov"
    );
    assert_eq!(
      format_date(&d, Some("dd M")),
      "Tu 11"
    );
  }

  #[test]
  fn month_names_are_not_reexpanded() {
    // "March" and "May" both contain
    // an M token character.
    let d = date(2024, 2, 3);
    assert_eq!(
      format_date(&d, Some("MMMM M")),
      "March 3"
    );
    let d = date(2024, 4, 1);
    assert_eq!(
      format_date(&d, Some("MMM D")),
      "May 1"
    );
  }

  #[test]
  fn format_without_pattern_uses_short_date()
   {
    let d = date(2025, 10, 5);
    assert_eq!(
      format_date(&d, None),
      "11/5/2025"
    );
    assert_eq!(
      format_date(&d, Some("  ")),
      "11/5/2025"
    );
  }

  #[test]
  fn parses_today_and_relatives() {
    let today = date(2025, 10, 25);
    assert_eq!(
      parse_date_at("today", today),
      Some(today)
    );
    assert_eq!(
      parse_date_at("Tomorrow", today),
      Some(date(2025, 10, 26))
    );
    assert_eq!(
      parse_date_at("yesterday", today),
      Some(date(2025, 10, 24))
    );
  }

  #[test]
  fn parses_iso_as_local_components() {
    let today = date(2000, 0, 1);
    assert_eq!(
      parse_date_at(
        "2025-01-01",
        today
      ),
      Some(date(2025, 0, 1))
    );
    assert_eq!(
      parse_date_at(
        "2025-02-30",
        today
      ),
      None
    );
  }

  #[test]
  fn parses_generic_forms() {
    let today = date(2000, 0, 1);
    let expected = date(2025, 10, 25);
    for raw in [
      "2025/11/25",
      "11/25/2025",
      "November 25, 2025",
      "Nov 25, 2025",
      "25 November 2025",
      "2025-11-25 08:30",
      "2025-11-25T08:30:00"
    ] {
      assert_eq!(
        parse_date_at(raw, today),
        Some(expected),
        "input {raw}"
      );
    }
  }

  #[test]
  fn rejects_garbage() {
    let today = date(2000, 0, 1);
    assert_eq!(
      parse_date_at("", today),
      None
    );
    assert_eq!(
      parse_date_at("not a date", today),
      None
    );
  }

  #[test]
  fn date_values_pass_through() {
    let today = date(2000, 0, 1);
    let d = date(2030, 5, 15);
    assert_eq!(
      parse_date_at(d, today),
      Some(d)
    );
  }

  #[test]
  fn iso_round_trip_is_same_day() {
    let mut d = date(2023, 11, 25);
    for _ in 0..500 {
      let parsed = parse_date(iso_day(
        &d
      ))
      .expect("round trip");
      assert!(is_same_day(&parsed, &d));
      d = add_days(&d, 3);
    }

    let edges = [
      date(0, 5, 15),
      date(-1, 0, 1),
      date(9999, 11, 31),
      date(10000, 0, 1),
      date(99999, 11, 31),
      CalendarDate::from(NaiveDate::MIN),
      CalendarDate::from(NaiveDate::MAX)
    ];
    for edge in edges {
      let parsed = parse_date(iso_day(
        &edge
      ))
      .expect("edge round trip");
      assert_eq!(parsed, edge);
    }
  }

  #[test]
  fn same_day_is_reflexive_and_symmetric()
   {
    let a = date(2025, 10, 25);
    let b = date(2025, 10, 26);
    assert!(is_same_day(&a, &a));
    assert_eq!(
      is_same_day(&a, &b),
      is_same_day(&b, &a)
    );
    assert!(!is_same_day(&a, &b));
  }

  #[test]
  fn day_arithmetic_crosses_months() {
    let d = date(2024, 1, 28);
    assert_eq!(
      add_days(&d, 1),
      date(2024, 1, 29)
    );
    assert_eq!(
      add_days(&d, 2),
      date(2024, 2, 1)
    );
    assert_eq!(
      days_diff(&d, &date(2024, 2, 1)),
      2
    );
    assert_eq!(
      days_diff(&date(2024, 2, 1), &d),
      -2
    );
  }

  #[test]
  fn month_lengths() {
    assert_eq!(days_in_month(2024, 1), 29);
    assert_eq!(days_in_month(2025, 1), 28);
    assert_eq!(days_in_month(2025, 11), 31);
    assert_eq!(days_in_month(2025, 3), 30);
  }

  #[test]
  fn serializes_as_iso_string() {
    let d = date(2025, 10, 25);
    let json = serde_json::to_string(&d)
      .expect("serialize");
    assert_eq!(json, "\"2025-11-25\"");
    let back: CalendarDate =
      serde_json::from_str(&json)
        .expect("deserialize");
    assert_eq!(back, d);
  }
}
