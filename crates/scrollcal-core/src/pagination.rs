use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::Serialize;
use tracing::{debug, trace};

use crate::date::{CalendarDate, MONTH_NAMES, days_in_month};

/// A (year, zero-based month) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (month < 12).then_some(Self { year, month })
    }

    pub fn of(date: &CalendarDate) -> Self {
        Self {
            year: date.year(),
            month: date.month0(),
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        if self.month >= 11 {
            Self {
                year: self.year.saturating_add(1),
                month: 0,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn days(self) -> u32 {
        days_in_month(self.year, self.month)
    }

    /// `None` only for years chrono cannot represent.
    pub fn day(self, day: u32) -> Option<CalendarDate> {
        CalendarDate::new(self.year, self.month, day)
    }

    pub fn first_day(self) -> Option<CalendarDate> {
        self.day(1)
    }

    pub fn title(self) -> String {
        format!("{} {}", MONTH_NAMES[self.month as usize % 12], self.year)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month + 1)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    /// Accepts `YYYY-MM` with a one-based month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected YYYY-MM, got: {s}"))?;
        let year: i32 = year.parse().context("invalid month key year")?;
        let month: u32 = month.parse().context("invalid month key month")?;
        month
            .checked_sub(1)
            .and_then(|month0| MonthKey::new(year, month0))
            .ok_or_else(|| anyhow!("month out of range in: {s}"))
    }
}

/// Months already materialised, earliest first, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedMonths {
    months: Vec<MonthKey>,
}

impl LoadedMonths {
    /// Returns false when the month was already present.
    pub fn insert(&mut self, key: MonthKey) -> bool {
        if self.months.contains(&key) {
            trace!(month = %key, "month already loaded");
            return false;
        }
        self.months.push(key);
        true
    }

    pub fn contains(&self, key: MonthKey) -> bool {
        self.months.contains(&key)
    }

    pub fn first(&self) -> Option<MonthKey> {
        self.months.first().copied()
    }

    pub fn last(&self) -> Option<MonthKey> {
        self.months.last().copied()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn as_slice(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn clear(&mut self) {
        self.months.clear();
    }
}

/// Starting at the anchor (moved up to January of `min_year` when earlier),
/// yields `count` consecutive months, stopping once a year passes `max_year`.
pub fn load_initial_window(
    anchor: MonthKey,
    count: usize,
    min_year: Option<i32>,
    max_year: Option<i32>,
) -> Vec<MonthKey> {
    let mut current = match min_year {
        Some(min) if anchor.year < min => MonthKey {
            year: min,
            month: 0,
        },
        _ => anchor,
    };

    let mut window = Vec::with_capacity(count);
    for _ in 0..count {
        if max_year.is_some_and(|max| current.year > max) {
            debug!(month = %current, "initial window stopped at max year");
            break;
        }
        window.push(current);
        current = current.next();
    }
    window
}

/// The month after `last`, unless `max_months` are already loaded or the
/// candidate falls after `max_year`.
pub fn load_next(
    last: MonthKey,
    loaded_count: usize,
    max_months: usize,
    max_year: Option<i32>,
) -> Option<MonthKey> {
    if loaded_count >= max_months {
        trace!(loaded_count, max_months, "month limit reached");
        return None;
    }
    let candidate = last.next();
    if max_year.is_some_and(|max| candidate.year > max) {
        trace!(month = %candidate, "next month beyond max year");
        return None;
    }
    Some(candidate)
}

/// Viewport geometry reported by the rendering side on scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    pub fn remaining(&self) -> f64 {
        self.content_height - (self.scroll_top + self.viewport_height)
    }

    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.remaining() <= threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub initial_months: usize,
    pub max_months: usize,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

/// Owns the loaded-month set of one picker and applies the forward-only
/// loading policy to it.
#[derive(Debug, Clone)]
pub struct Paginator {
    limits: PaginationLimits,
    loaded: LoadedMonths,
}

impl Paginator {
    pub fn new(limits: PaginationLimits) -> Self {
        Self {
            limits,
            loaded: LoadedMonths::default(),
        }
    }

    pub fn limits(&self) -> PaginationLimits {
        self.limits
    }

    pub fn loaded(&self) -> &LoadedMonths {
        &self.loaded
    }

    /// Replaces whatever was loaded with the initial window at `anchor`.
    #[tracing::instrument(skip(self), fields(anchor = %anchor))]
    pub fn load_initial(&mut self, anchor: MonthKey) -> Vec<MonthKey> {
        self.loaded.clear();
        let count = self.limits.initial_months.min(self.limits.max_months);
        let window = load_initial_window(anchor, count, self.limits.min_year, self.limits.max_year);
        for key in &window {
            self.loaded.insert(*key);
        }
        debug!(count = window.len(), "loaded initial months");
        window
    }

    pub fn load_next(&mut self) -> Option<MonthKey> {
        let last = self.loaded.last()?;
        let candidate = load_next(
            last,
            self.loaded.len(),
            self.limits.max_months,
            self.limits.max_year,
        )?;
        if !self.loaded.insert(candidate) {
            return None;
        }
        debug!(month = %candidate, total = self.loaded.len(), "loaded next month");
        Some(candidate)
    }

    /// Loads forward until `target` is present. Returns false when the policy
    /// refuses first, or when `target` lies before the window.
    pub fn ensure_loaded(&mut self, target: MonthKey) -> bool {
        if self.loaded.contains(target) {
            return true;
        }
        match self.loaded.first() {
            Some(first) if target < first => {
                debug!(month = %target, "month precedes loaded window");
                return false;
            }
            _ => {}
        }
        while self.load_next().is_some() {
            if self.loaded.contains(target) {
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}
