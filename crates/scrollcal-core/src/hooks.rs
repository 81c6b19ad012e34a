use serde::Serialize;
use tracing::{debug, trace};

use crate::date::{CalendarDate, format_date, iso_day};
use crate::grid::DayCell;
use crate::pagination::MonthKey;
use crate::selection::{Completion, Selection};

/// Sent to change hooks once a selection completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ChangePayload {
    Single {
        date: CalendarDate,
        formatted: String,
        iso: String,
    },
    Range {
        start: CalendarDate,
        end: CalendarDate,
        start_formatted: String,
        end_formatted: String,
        start_iso: String,
        end_iso: String,
        nights: i64,
        days: i64,
    },
}

impl ChangePayload {
    pub fn from_completion(done: Completion, format: Option<&str>) -> Self {
        match done {
            Completion::Single(date) => ChangePayload::Single {
                date,
                formatted: format_date(&date, format),
                iso: iso_day(&date),
            },
            Completion::Range { start, end, nights } => ChangePayload::Range {
                start,
                end,
                start_formatted: format_date(&start, format),
                end_formatted: format_date(&end, format),
                start_iso: iso_day(&start),
                end_iso: iso_day(&end),
                nights,
                days: nights + 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthChange {
    pub month: MonthKey,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearChange {
    pub year: i32,
}

/// Handlers for one event, called in registration order.
pub struct HookList<T> {
    handlers: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> Default for HookList<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T> HookList<T> {
    pub fn single<F>(handler: F) -> Self
    where
        F: FnMut(&T) + 'static,
    {
        let mut list = Self::default();
        list.push(handler);
        list
    }

    pub fn many<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FnMut(&T)>>,
    {
        Self {
            handlers: handlers.into_iter().collect(),
        }
    }

    pub fn push<F>(&mut self, handler: F)
    where
        F: FnMut(&T) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn emit(&mut self, payload: &T) {
        for handler in &mut self.handlers {
            handler(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

/// Every callback a picker can fire.
#[derive(Default)]
pub struct Hooks {
    pub change: HookList<ChangePayload>,
    pub open: HookList<Selection>,
    pub close: HookList<Selection>,
    pub month_change: HookList<MonthChange>,
    pub year_change: HookList<YearChange>,
    day_create: Vec<Box<dyn FnMut(&mut DayCell)>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("change", &self.change.len())
            .field("open", &self.open.len())
            .field("close", &self.close.len())
            .field("month_change", &self.month_change.len())
            .field("year_change", &self.year_change.len())
            .field("day_create", &self.day_create.len())
            .finish()
    }
}

impl Hooks {
    pub fn on_change<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&ChangePayload) + 'static,
    {
        self.change.push(handler);
        self
    }

    pub fn on_open<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Selection) + 'static,
    {
        self.open.push(handler);
        self
    }

    pub fn on_close<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Selection) + 'static,
    {
        self.close.push(handler);
        self
    }

    pub fn on_month_change<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&MonthChange) + 'static,
    {
        self.month_change.push(handler);
        self
    }

    pub fn on_year_change<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&YearChange) + 'static,
    {
        self.year_change.push(handler);
        self
    }

    pub fn on_day_create<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&mut DayCell) + 'static,
    {
        self.day_create.push(Box::new(handler));
        self
    }

    pub fn decorate(&mut self, cell: &mut DayCell) {
        for handler in &mut self.day_create {
            handler(cell);
        }
        if !self.day_create.is_empty() {
            trace!(date = %cell.iso, "ran day-create hooks");
        }
    }

    pub fn clear(&mut self) {
        debug!("detaching all hooks");
        self.change.clear();
        self.open.clear();
        self.close.clear();
        self.month_change.clear();
        self.year_change.clear();
        self.day_create.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn nov(day: u32) -> CalendarDate {
        CalendarDate::new(2025, 10, day).expect("valid date")
    }

    #[test]
    fn single_payload_carries_formats() {
        let payload = ChangePayload::from_completion(Completion::Single(nov(25)), Some("MMM D"));
        assert_eq!(
            payload,
            ChangePayload::Single {
                date: nov(25),
                formatted: "Nov 25".to_string(),
                iso: "2025-11-25".to_string(),
            }
        );
    }

    #[test]
    fn range_payload_counts_days() {
        let done = Completion::Range {
            start: nov(26),
            end: nov(28),
            nights: 2,
        };
        let json = serde_json::to_value(ChangePayload::from_completion(done, None))
            .expect("serialize");
        assert_eq!(json["mode"], "range");
        assert_eq!(json["start"], "2025-11-26");
        assert_eq!(json["end_formatted"], "11/28/2025");
        assert_eq!(json["nights"], 2);
        assert_eq!(json["days"], 3);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::default();
        for tag in ["first", "second", "third"] {
            let seen = Rc::clone(&seen);
            hooks.on_year_change(move |change| seen.borrow_mut().push((tag, change.year)));
        }
        hooks.year_change.emit(&YearChange { year: 2026 });
        assert_eq!(
            *seen.borrow(),
            vec![("first", 2026), ("second", 2026), ("third", 2026)]
        );
    }

    #[test]
    fn many_builds_a_normalized_list() {
        let count = Rc::new(RefCell::new(0));
        let handlers: Vec<Box<dyn FnMut(&YearChange)>> = (0..3)
            .map(|_| {
                let count = Rc::clone(&count);
                Box::new(move |_: &YearChange| *count.borrow_mut() += 1) as Box<dyn FnMut(&YearChange)>
            })
            .collect();
        let mut list = HookList::many(handlers);
        list.emit(&YearChange { year: 1 });
        assert_eq!(*count.borrow(), 3);
        assert_eq!(HookList::single(|_: &YearChange| {}).len(), 1);
    }

    #[test]
    fn clear_detaches_everything() {
        let mut hooks = Hooks::default();
        hooks.on_change(|_| {}).on_open(|_| {}).on_day_create(|_| {});
        hooks.clear();
        assert!(hooks.change.is_empty());
        assert!(hooks.open.is_empty());
        assert_eq!(format!("{hooks:?}").matches(": 0").count(), 6);
    }
}
