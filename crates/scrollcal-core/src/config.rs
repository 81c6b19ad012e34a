use std::fmt;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow,
  bail
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::date::{
  CalendarDate,
  parse_date_at
};
use crate::grid::WeekStart;
use crate::pagination::PaginationLimits;
use crate::rules::{
  DateBounds,
  DateRule,
  RuleSet
};
use crate::selection::{
  RangeLimits,
  SelectionMode
};

const CONFIG_ENV_VAR: &str =
  "SCROLLCAL_CONFIG";
const CONFIG_DIR_NAME: &str =
  "scrollcal";
const CONFIG_FILE_NAME: &str =
  "picker.toml";

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DisplayVariant {
  #[default]
  Popup,
  Modal,
  /// Always open; never closes.
  Inline
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark
}

impl Theme {
  pub fn as_str(self) -> &'static str {
    match self {
      | Theme::Light => "light",
      | Theme::Dark => "dark"
    }
  }
}

impl fmt::Display for Theme {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Theme {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "light" => Ok(Theme::Light),
      | "dark" => Ok(Theme::Dark),
      | other => {
        Err(anyhow!(
          "unknown theme: {other}"
        ))
      }
    }
  }
}

/// A disable/enable rule as written in
/// TOML: a bare string matches one ISO
/// day, a `{ from, to }` table an
/// inclusive interval.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(untagged)]
pub enum RuleSpec {
  Iso(String),
  Interval {
    from: String,
    to:   String
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
#[serde(deny_unknown_fields)]
pub struct PickerConfig {
  #[serde(default)]
  pub mode:              SelectionMode,
  #[serde(default)]
  pub display:           DisplayVariant,
  #[serde(default)]
  pub theme:             Theme,
  #[serde(default)]
  pub format:            Option<String>,
  #[serde(default)]
  pub min_date:          Option<String>,
  #[serde(default)]
  pub max_date:          Option<String>,
  #[serde(default)]
  pub min_year:          Option<i32>,
  #[serde(default)]
  pub max_year:          Option<i32>,
  #[serde(default)]
  pub disabled_dates:    Vec<RuleSpec>,
  #[serde(default)]
  pub enabled_dates:     Option<Vec<RuleSpec>>,
  #[serde(
    default = "picker_default_min_range_days"
  )]
  pub min_range_days:    u32,
  #[serde(default)]
  pub max_range_days:    Option<u32>,
  #[serde(
    default = "picker_default_max_months"
  )]
  pub max_months:        usize,
  #[serde(
    default = "picker_default_initial_months"
  )]
  pub initial_months:    usize,
  #[serde(
    default = "picker_default_scroll_threshold"
  )]
  pub scroll_threshold:  f64,
  #[serde(default)]
  pub first_day_of_week: WeekStart,
  #[serde(default)]
  pub default_to_today:  bool,
  #[serde(
    default = "picker_true"
  )]
  pub close_on_select:   bool,
  #[serde(default)]
  pub start_month:       Option<String>
}

fn picker_true() -> bool {
  true
}

fn picker_default_min_range_days()
-> u32 {
  1
}

fn picker_default_max_months() -> usize
{
  24
}

fn picker_default_initial_months()
-> usize {
  3
}

fn picker_default_scroll_threshold()
-> f64 {
  100.0
}

impl Default for PickerConfig {
  fn default() -> Self {
    Self {
      mode:              SelectionMode::default(),
      display:           DisplayVariant::default(),
      theme:             Theme::default(),
      format:            None,
      min_date:          None,
      max_date:          None,
      min_year:          None,
      max_year:          None,
      disabled_dates:    Vec::new(),
      enabled_dates:     None,
      min_range_days:
        picker_default_min_range_days(),
      max_range_days:    None,
      max_months:
        picker_default_max_months(),
      initial_months:
        picker_default_initial_months(),
      scroll_threshold:
        picker_default_scroll_threshold(
        ),
      first_day_of_week:
        WeekStart::default(),
      default_to_today:  false,
      close_on_select:   picker_true(),
      start_month:       None
    }
  }
}

impl PickerConfig {
  #[tracing::instrument(skip(
    path_override
  ))]
  pub fn load(
    path_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    Self::load_with_overrides(
      path_override,
      std::iter::empty()
    )
  }

  /// Reads the resolved config file (or
  /// nothing), applies `key=value`
  /// overrides on top, then validates.
  #[tracing::instrument(skip(
    path_override,
    overrides
  ))]
  pub fn load_with_overrides<I>(
    path_override: Option<&Path>,
    overrides: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    Self::load_with_overrides_at(
      path_override,
      overrides,
      CalendarDate::today()
    )
  }

  /// Like `load_with_overrides`, with
  /// relative bounds resolved against
  /// `today`.
  #[tracing::instrument(skip(
    path_override,
    overrides
  ))]
  pub fn load_with_overrides_at<I>(
    path_override: Option<&Path>,
    overrides: I,
    today: CalendarDate
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut table =
      match resolve_config_path(
        path_override
      )? {
        | Some(path) => {
          info!(config = %path.display(), "loading picker config");
          read_table(&path)?
        }
        | None => {
          warn!(
            "no picker config found; \
             using defaults"
          );
          toml::Table::new()
        }
      };

    apply_overrides(
      &mut table, overrides
    );

    let cfg: PickerConfig =
      toml::Value::Table(table)
        .try_into()
        .context(
          "invalid picker \
           configuration"
        )?;
    cfg.validate_at(today)?;
    debug!(?cfg, "resolved picker config");
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let cfg: PickerConfig =
      toml::from_str(raw).context(
        "failed to parse picker \
         config"
      )?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(
    &self
  ) -> anyhow::Result<()> {
    self.validate_at(
      CalendarDate::today()
    )
  }

  pub fn validate_at(
    &self,
    today: CalendarDate
  ) -> anyhow::Result<()> {
    if self.max_months == 0 {
      bail!(
        "max_months must be at least 1"
      );
    }
    if self.initial_months == 0 {
      bail!(
        "initial_months must be at \
         least 1"
      );
    }
    if self.min_range_days == 0 {
      bail!(
        "min_range_days must be at \
         least 1"
      );
    }
    if let Some(max) =
      self.max_range_days
      && max < self.min_range_days
    {
      bail!(
        "max_range_days ({max}) is \
         below min_range_days ({})",
        self.min_range_days
      );
    }
    if let (Some(min), Some(max)) =
      (self.min_year, self.max_year)
      && min > max
    {
      bail!(
        "min_year ({min}) is after \
         max_year ({max})"
      );
    }
    if !self.scroll_threshold.is_finite()
      || self.scroll_threshold < 0.0
    {
      bail!(
        "scroll_threshold must be a \
         non-negative number"
      );
    }

    let bounds =
      self.resolve_bounds(today);
    if let (Some(min), Some(max)) =
      (bounds.min_date, bounds.max_date)
      && min > max
    {
      bail!(
        "min_date ({min}) is after \
         max_date ({max})"
      );
    }
    Ok(())
  }

  /// Unparseable bounds are dropped
  /// with a warning.
  pub fn resolve_bounds(
    &self,
    today: CalendarDate
  ) -> DateBounds {
    DateBounds {
      min_date: resolve_optional_date(
        self.min_date.as_deref(),
        "min_date",
        today
      ),
      max_date: resolve_optional_date(
        self.max_date.as_deref(),
        "max_date",
        today
      ),
      min_year: self.min_year,
      max_year: self.max_year
    }
  }

  pub fn resolve_rules(
    &self,
    today: CalendarDate
  ) -> RuleSet {
    RuleSet {
      blacklist: resolve_rule_specs(
        &self.disabled_dates,
        today
      ),
      whitelist: self
        .enabled_dates
        .as_ref()
        .map(|specs| {
          resolve_rule_specs(
            specs, today
          )
        })
    }
  }

  pub fn resolve_start_month(
    &self,
    today: CalendarDate
  ) -> Option<CalendarDate> {
    resolve_optional_date(
      self.start_month.as_deref(),
      "start_month",
      today
    )
  }

  pub fn range_limits(
    &self
  ) -> RangeLimits {
    RangeLimits {
      min_days: self.min_range_days,
      max_days: self.max_range_days
    }
  }

  pub fn pagination_limits(
    &self
  ) -> PaginationLimits {
    PaginationLimits {
      initial_months: self
        .initial_months,
      max_months:     self.max_months,
      min_year:       self.min_year,
      max_year:       self.max_year
    }
  }
}

fn resolve_optional_date(
  raw: Option<&str>,
  field: &str,
  today: CalendarDate
) -> Option<CalendarDate> {
  let raw = raw?;
  let parsed = parse_date_at(raw, today);
  if parsed.is_none() {
    warn!(
      field,
      value = %raw,
      "ignoring unparseable date"
    );
  }
  parsed
}

fn resolve_rule_specs(
  specs: &[RuleSpec],
  today: CalendarDate
) -> Vec<DateRule> {
  specs
    .iter()
    .filter_map(|spec| {
      match spec {
        | RuleSpec::Iso(raw) => {
          Some(DateRule::Iso(
            raw.trim().to_string()
          ))
        }
        | RuleSpec::Interval {
          from,
          to
        } => {
          let start = parse_date_at(
            from.as_str(),
            today
          );
          let end = parse_date_at(
            to.as_str(),
            today
          );
          match (start, end) {
            | (Some(start), Some(end)) => {
              Some(DateRule::interval(
                start, end
              ))
            }
            | _ => {
              warn!(
                from = %from,
                to = %to,
                "ignoring interval rule with unparseable bounds"
              );
              None
            }
          }
        }
      }
    })
    .collect()
}

/// Values are read as TOML scalars
/// when they parse as such and kept as
/// strings otherwise.
pub fn apply_overrides<I>(
  table: &mut toml::Table,
  overrides: I
) where
  I: IntoIterator<
    Item = (String, String)
  >
{
  for (k, v) in overrides {
    let key = k
      .strip_prefix("set.")
      .unwrap_or(&k)
      .trim()
      .to_string();
    let value = parse_override_value(
      v.trim()
    );
    debug!(key = %key, value = %value, "applying override");
    table.insert(key, value);
  }
}

fn parse_override_value(
  raw: &str
) -> toml::Value {
  toml::from_str::<toml::Table>(
    &format!("value = {raw}")
  )
  .ok()
  .and_then(|mut parsed| {
    parsed.remove("value")
  })
  .unwrap_or_else(|| {
    toml::Value::String(
      raw.to_string()
    )
  })
}

#[tracing::instrument]
fn read_table(
  path: &Path
) -> anyhow::Result<toml::Table> {
  let path = expand_tilde(path);
  let text =
    fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
  trace!(bytes = text.len(), "read config file");
  toml::from_str::<toml::Table>(&text)
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = env_path.trim();
    if trimmed == "/dev/null" {
      return Ok(None);
    }
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  fn day(
    y: i32,
    m0: u32,
    d: u32
  ) -> CalendarDate {
    CalendarDate::new(y, m0, d)
      .expect("valid date")
  }

  #[test]
  fn defaults_match_documented_values()
  {
    let cfg = PickerConfig::from_toml_str(
      ""
    )
    .expect("empty config");
    assert_eq!(cfg, PickerConfig::default());
    assert_eq!(cfg.max_months, 24);
    assert_eq!(cfg.initial_months, 3);
    assert!(cfg.close_on_select);
    assert_eq!(
      cfg.mode,
      SelectionMode::Single
    );
  }

  #[test]
  fn parses_full_config() {
    let cfg = PickerConfig::from_toml_str(
      r#"
mode = "range"
display = "inline"
theme = "dark"
format = "MMM D, YYYY"
min_date = "2025-01-01"
max_year = 2027
min_range_days = 2
max_range_days = 14
first_day_of_week = "monday"
disabled_dates = [
  "2025-12-25",
  { from = "2025-12-29", to = "2025-12-31" },
]
enabled_dates = ["2025-12-24"]
"#
    )
    .expect("parse config");

    assert_eq!(
      cfg.mode,
      SelectionMode::Range
    );
    assert_eq!(
      cfg.display,
      DisplayVariant::Inline
    );
    assert_eq!(cfg.theme, Theme::Dark);
    assert_eq!(
      cfg.first_day_of_week,
      WeekStart::Monday
    );

    let today = day(2025, 0, 1);
    let rules = cfg.resolve_rules(today);
    assert_eq!(rules.blacklist.len(), 2);
    assert!(rules.is_disabled(&day(
      2025, 11, 30
    )));
    assert!(rules.is_disabled(&day(
      2025, 11, 23
    )));
    assert!(!rules.is_disabled(&day(
      2025, 11, 24
    )));

    let bounds =
      cfg.resolve_bounds(today);
    assert_eq!(
      bounds.min_date,
      Some(day(2025, 0, 1))
    );
    assert_eq!(bounds.max_year, Some(2027));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    assert!(
      PickerConfig::from_toml_str(
        "colour = \"red\""
      )
      .is_err()
    );
  }

  #[test]
  fn validation_catches_bad_limits() {
    for raw in [
      "max_months = 0",
      "initial_months = 0",
      "min_range_days = 0",
      "min_range_days = 5\nmax_range_days = 2",
      "min_year = 2030\nmax_year = 2020",
      "min_date = \"2025-06-01\"\nmax_date = \"2025-01-01\"",
      "scroll_threshold = -1.0"
    ] {
      assert!(
        PickerConfig::from_toml_str(raw)
          .is_err(),
        "expected rejection of {raw}"
      );
    }
  }

  #[test]
  fn unparseable_bounds_and_rules_are_ignored()
   {
    let cfg = PickerConfig::from_toml_str(
      r#"
min_date = "someday"
disabled_dates = [{ from = "soon", to = "2025-01-01" }]
"#
    )
    .expect("still valid");
    let today = day(2025, 0, 1);
    assert_eq!(
      cfg.resolve_bounds(today).min_date,
      None
    );
    assert!(
      cfg
        .resolve_rules(today)
        .blacklist
        .is_empty()
    );
  }

  #[test]
  fn overrides_apply_typed_values() {
    let mut table = toml::Table::new();
    apply_overrides(
      &mut table,
      vec![
        (
          "set.max_months".to_string(),
          "6".to_string()
        ),
        (
          "mode".to_string(),
          "range".to_string()
        ),
        (
          "close_on_select".to_string(),
          "false".to_string()
        ),
      ]
    );
    let cfg: PickerConfig =
      toml::Value::Table(table)
        .try_into()
        .expect("deserialize");
    assert_eq!(cfg.max_months, 6);
    assert_eq!(
      cfg.mode,
      SelectionMode::Range
    );
    assert!(!cfg.close_on_select);
  }

  #[test]
  fn loads_file_with_overrides() {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("tempfile");
    writeln!(
      file,
      "mode = \"range\"\nmax_months = 12"
    )
    .expect("write config");

    let cfg =
      PickerConfig::load_with_overrides(
        Some(file.path()),
        vec![(
          "max_months".to_string(),
          "4".to_string()
        )]
      )
      .expect("load config");
    assert_eq!(
      cfg.mode,
      SelectionMode::Range
    );
    assert_eq!(cfg.max_months, 4);
  }

  #[test]
  fn relative_bounds_validate_against_given_day()
   {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("tempfile");
    writeln!(
      file,
      "min_date = \"today\"\nmax_date = \"2025-12-31\""
    )
    .expect("write config");

    let today =
      CalendarDate::new(2025, 10, 19)
        .expect("today");
    assert!(
      PickerConfig::load_with_overrides_at(
        Some(file.path()),
        std::iter::empty(),
        today
      )
      .is_ok()
    );

    let later =
      CalendarDate::new(2026, 0, 5)
        .expect("later");
    let cfg = PickerConfig {
      min_date: Some(
        "today".to_string()
      ),
      max_date: Some(
        "2025-12-31".to_string()
      ),
      ..PickerConfig::default()
    };
    assert!(cfg.validate_at(today).is_ok());
    assert!(
      cfg.validate_at(later).is_err()
    );
  }

  #[test]
  fn missing_file_is_an_error() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let missing =
      dir.path().join("absent.toml");
    assert!(
      PickerConfig::load(Some(&missing))
        .is_err()
    );
  }

  #[test]
  fn theme_names() {
    assert_eq!(
      "Dark"
        .parse::<Theme>()
        .expect("theme"),
      Theme::Dark
    );
    assert!(
      "neon".parse::<Theme>().is_err()
    );
  }
}
