use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::date::{CalendarDate, DAY_NAMES_MIN, iso_day};
use crate::pagination::MonthKey;
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    /// Column of `weekday` in a week starting on `self`.
    pub fn column(self, weekday: Weekday) -> u32 {
        match self {
            WeekStart::Sunday => weekday.num_days_from_sunday(),
            WeekStart::Monday => weekday.num_days_from_monday(),
        }
    }

    pub fn labels(self) -> [&'static str; 7] {
        let mut labels = DAY_NAMES_MIN;
        if self == WeekStart::Monday {
            labels.rotate_left(1);
        }
        labels
    }
}

impl FromStr for WeekStart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" | "0" => Ok(WeekStart::Sunday),
            "monday" | "mon" | "1" => Ok(WeekStart::Monday),
            other => Err(anyhow!("unsupported first day of week: {other}")),
        }
    }
}

/// One rendered day. Day-create hooks may edit `classes` and `label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: CalendarDate,
    pub iso: String,
    pub day: u32,
    /// 0 = Sunday.
    pub weekday: u32,
    pub disabled: bool,
    pub today: bool,
    pub selected: bool,
    pub range_start: bool,
    pub range_end: bool,
    pub in_range: bool,
    pub classes: Vec<String>,
    pub label: Option<String>,
}

impl DayCell {
    fn class_names(&self) -> Vec<String> {
        let mut classes = vec!["day".to_string()];
        let flags = [
            (self.weekday == 0 || self.weekday == 6, "weekend"),
            (self.disabled, "disabled"),
            (self.today, "today"),
            (self.selected, "selected"),
            (self.range_start, "range-start"),
            (self.range_end, "range-end"),
            (self.in_range, "in-range"),
        ];
        for (set, name) in flags {
            if set {
                classes.push(name.to_string());
            }
        }
        classes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    pub key: MonthKey,
    pub title: String,
    /// Empty cells before day 1 in the first week row.
    pub leading_blanks: u32,
    pub cells: Vec<DayCell>,
}

impl fmt::Display for MonthView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} days)", self.title, self.cells.len())
    }
}

/// Builds one cell per day of `key`, flagged against the selection and the
/// disabled check.
pub fn build_month<F>(
    key: MonthKey,
    week_start: WeekStart,
    today: CalendarDate,
    selection: &Selection,
    is_disabled: F,
) -> MonthView
where
    F: Fn(&CalendarDate) -> bool,
{
    let leading_blanks = key
        .first_day()
        .map(|first| week_start.column(first.weekday()))
        .unwrap_or(0);

    let cells: Vec<DayCell> = (1..=key.days())
        .filter_map(|day| key.day(day))
        .map(|date| {
            let mut cell = DayCell {
                date,
                iso: iso_day(&date),
                day: date.day(),
                weekday: date.weekday().num_days_from_sunday(),
                disabled: is_disabled(&date),
                today: date == today,
                selected: selection.is_selected(&date),
                range_start: selection.is_range_start(&date),
                range_end: selection.is_range_end(&date),
                in_range: selection.is_in_range(&date),
                classes: Vec::new(),
                label: None,
            };
            cell.classes = cell.class_names();
            cell
        })
        .collect();

    trace!(month = %key, cells = cells.len(), leading_blanks, "built month view");
    MonthView {
        key,
        title: key.title(),
        leading_blanks,
        cells,
    }
}
