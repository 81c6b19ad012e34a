use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date::{CalendarDate, days_diff};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Range,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::Single => "single",
            SelectionMode::Range => "range",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(SelectionMode::Single),
            "range" => Ok(SelectionMode::Range),
            other => Err(anyhow!("unknown selection mode: {other}")),
        }
    }
}

/// Current selection. In range mode `end` is only ever set together with
/// an earlier-or-equal `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Single {
        date: Option<CalendarDate>,
    },
    Range {
        start: Option<CalendarDate>,
        end: Option<CalendarDate>,
    },
}

impl Selection {
    pub fn empty(mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::Single => Selection::Single { date: None },
            SelectionMode::Range => Selection::Range {
                start: None,
                end: None,
            },
        }
    }

    pub fn mode(&self) -> SelectionMode {
        match self {
            Selection::Single { .. } => SelectionMode::Single,
            Selection::Range { .. } => SelectionMode::Range,
        }
    }

    pub fn state(&self) -> SelectionState {
        match self {
            Selection::Single { date: Some(_) } => SelectionState::SingleSelected,
            Selection::Range {
                start: Some(_),
                end: Some(_),
            } => SelectionState::RangeComplete,
            Selection::Range { start: Some(_), .. } => SelectionState::RangeStartOnly,
            _ => SelectionState::Empty,
        }
    }

    pub fn is_selected(&self, date: &CalendarDate) -> bool {
        match self {
            Selection::Single { date: selected } => selected.as_ref() == Some(date),
            Selection::Range { start, end } => {
                start.as_ref() == Some(date) || end.as_ref() == Some(date)
            }
        }
    }

    pub fn is_range_start(&self, date: &CalendarDate) -> bool {
        matches!(self, Selection::Range { start: Some(start), .. } if start == date)
    }

    pub fn is_range_end(&self, date: &CalendarDate) -> bool {
        matches!(self, Selection::Range { end: Some(end), .. } if end == date)
    }

    /// Strictly between a complete range's endpoints.
    pub fn is_in_range(&self, date: &CalendarDate) -> bool {
        match self {
            Selection::Range {
                start: Some(start),
                end: Some(end),
            } => start < date && date < end,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Empty,
    SingleSelected,
    RangeStartOnly,
    RangeComplete,
}

/// Allowed range length, counted in days including both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimits {
    pub min_days: u32,
    pub max_days: Option<u32>,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            min_days: 1,
            max_days: None,
        }
    }
}

impl RangeLimits {
    pub fn accepts(&self, nights: i64) -> bool {
        if nights < i64::from(self.min_days) - 1 {
            return false;
        }
        if let Some(max) = self.max_days
            && nights > i64::from(max) - 1
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Single(CalendarDate),
    Range {
        start: CalendarDate,
        end: CalendarDate,
        nights: i64,
    },
}

/// What a click did to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The date is disabled; nothing changed.
    Disabled,
    /// A range start was set or moved earlier.
    RangeStarted,
    /// The tentative end gave a range of the wrong length; the clicked date
    /// became the new start.
    RangeRestarted { nights: i64 },
    Completed(Completion),
}

impl Transition {
    pub fn completion(&self) -> Option<Completion> {
        match self {
            Transition::Completed(done) => Some(*done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    selection: Selection,
    limits: RangeLimits,
}

impl SelectionMachine {
    pub fn new(mode: SelectionMode, limits: RangeLimits) -> Self {
        Self {
            selection: Selection::empty(mode),
            limits,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn mode(&self) -> SelectionMode {
        self.selection.mode()
    }

    pub fn state(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn limits(&self) -> RangeLimits {
        self.limits
    }

    /// Hard reset, whatever was selected before.
    pub fn switch_mode(&mut self, mode: SelectionMode) {
        debug!(from = %self.mode(), to = %mode, "switching selection mode");
        self.selection = Selection::empty(mode);
    }

    pub fn clear(&mut self) {
        self.selection = Selection::empty(self.mode());
    }

    #[tracing::instrument(skip(self, is_disabled), fields(candidate = %candidate))]
    pub fn select<F>(&mut self, candidate: CalendarDate, is_disabled: F) -> Transition
    where
        F: Fn(&CalendarDate) -> bool,
    {
        if is_disabled(&candidate) {
            debug!("candidate disabled; ignoring");
            return Transition::Disabled;
        }

        match self.selection {
            Selection::Single { .. } => {
                self.selection = Selection::Single {
                    date: Some(candidate),
                };
                Transition::Completed(Completion::Single(candidate))
            }
            Selection::Range { start: None, .. }
            | Selection::Range {
                start: Some(_),
                end: Some(_),
            } => {
                self.start_range(candidate);
                Transition::RangeStarted
            }
            Selection::Range {
                start: Some(start),
                end: None,
            } => {
                if candidate < start {
                    self.start_range(candidate);
                    return Transition::RangeStarted;
                }
                let nights = days_diff(&start, &candidate);
                if !self.limits.accepts(nights) {
                    debug!(nights, "range length rejected; restarting at candidate");
                    self.start_range(candidate);
                    return Transition::RangeRestarted { nights };
                }
                self.selection = Selection::Range {
                    start: Some(start),
                    end: Some(candidate),
                };
                debug!(nights, "range completed");
                Transition::Completed(Completion::Range {
                    start,
                    end: candidate,
                    nights,
                })
            }
        }
    }

    /// Programmatic single selection; same disabled check as a click.
    pub fn set_single<F>(&mut self, date: CalendarDate, is_disabled: F) -> Option<Completion>
    where
        F: Fn(&CalendarDate) -> bool,
    {
        if self.mode() != SelectionMode::Single || is_disabled(&date) {
            return None;
        }
        self.selection = Selection::Single { date: Some(date) };
        Some(Completion::Single(date))
    }

    /// Programmatic range. Both ends must be enabled, ordered, and within
    /// the length limits; otherwise the selection is left untouched.
    pub fn set_range<F>(
        &mut self,
        start: CalendarDate,
        end: CalendarDate,
        is_disabled: F,
    ) -> Option<Completion>
    where
        F: Fn(&CalendarDate) -> bool,
    {
        if self.mode() != SelectionMode::Range || end < start {
            return None;
        }
        if is_disabled(&start) || is_disabled(&end) {
            return None;
        }
        let nights = days_diff(&start, &end);
        if !self.limits.accepts(nights) {
            return None;
        }
        self.selection = Selection::Range {
            start: Some(start),
            end: Some(end),
        };
        Some(Completion::Range { start, end, nights })
    }

    fn start_range(&mut self, start: CalendarDate) {
        self.selection = Selection::Range {
            start: Some(start),
            end: None,
        };
    }
}
