use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::date::{CalendarDate, iso_day};

pub type DatePredicate = Rc<dyn Fn(&CalendarDate) -> bool>;

/// One entry of a disable (blacklist) or enable (whitelist) list.
#[derive(Clone)]
pub enum DateRule {
    Predicate(DatePredicate),
    Date(CalendarDate),
    /// Compared textually against the ISO day string.
    Iso(String),
    /// Inclusive on both ends.
    Interval { from: CalendarDate, to: CalendarDate },
}

impl fmt::Debug for DateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRule::Predicate(_) => f.write_str("Predicate(..)"),
            DateRule::Date(date) => f.debug_tuple("Date").field(date).finish(),
            DateRule::Iso(raw) => f.debug_tuple("Iso").field(raw).finish(),
            DateRule::Interval { from, to } => f
                .debug_struct("Interval")
                .field("from", from)
                .field("to", to)
                .finish(),
        }
    }
}

impl DateRule {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&CalendarDate) -> bool + 'static,
    {
        DateRule::Predicate(Rc::new(f))
    }

    pub fn interval(from: CalendarDate, to: CalendarDate) -> Self {
        DateRule::Interval { from, to }
    }

    /// `iso` must be `iso_day(date)`; callers compute it once per date.
    fn matches(&self, date: &CalendarDate, iso: &str) -> bool {
        match self {
            DateRule::Predicate(f) => f(date),
            DateRule::Date(exact) => iso_day(exact) == iso,
            DateRule::Iso(raw) => raw == iso,
            DateRule::Interval { from, to } => {
                let from = iso_day(from);
                let to = iso_day(to);
                from.as_str() <= iso && iso <= to.as_str()
            }
        }
    }
}

fn any_match(rules: &[DateRule], date: &CalendarDate, iso: &str) -> bool {
    rules.iter().any(|rule| rule.matches(date, iso))
}

/// A configured whitelist must match; otherwise, or in addition, any
/// blacklist match disables the date.
pub fn is_disabled(
    date: &CalendarDate,
    blacklist: &[DateRule],
    whitelist: Option<&[DateRule]>,
) -> bool {
    let iso = iso_day(date);

    if let Some(allowed) = whitelist
        && !any_match(allowed, date, &iso)
    {
        trace!(date = %iso, "date not in whitelist");
        return true;
    }

    let blocked = any_match(blacklist, date, &iso);
    if blocked {
        trace!(date = %iso, "date matched blacklist");
    }
    blocked
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub blacklist: Vec<DateRule>,
    pub whitelist: Option<Vec<DateRule>>,
}

impl RuleSet {
    pub fn is_disabled(&self, date: &CalendarDate) -> bool {
        is_disabled(date, &self.blacklist, self.whitelist.as_deref())
    }
}

/// Hard limits that apply regardless of the rule lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub min_date: Option<CalendarDate>,
    pub max_date: Option<CalendarDate>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl DateBounds {
    pub fn excludes(&self, date: &CalendarDate) -> bool {
        self.min_date.is_some_and(|min| *date < min)
            || self.max_date.is_some_and(|max| *date > max)
            || self.min_year.is_some_and(|min| date.year() < min)
            || self.max_year.is_some_and(|max| date.year() > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::add_days;
    use chrono::Datelike;

    fn date(y: i32, m0: u32, d: u32) -> CalendarDate {
        CalendarDate::new(y, m0, d).expect("valid date")
    }

    #[test]
    fn empty_rules_never_disable() {
        let mut d = date(2024, 0, 1);
        for _ in 0..400 {
            assert!(!is_disabled(&d, &[], None));
            d = add_days(&d, 1);
        }
    }

    #[test]
    fn matches_each_variant() {
        let target = date(2025, 11, 25);
        let weekends = DateRule::predicate(|d| {
            d.naive().weekday().num_days_from_monday() >= 5
        });
        assert!(is_disabled(&target, &[DateRule::Date(target)], None));
        assert!(is_disabled(
            &target,
            &[DateRule::Iso("2025-12-25".to_string())],
            None
        ));
        assert!(!is_disabled(
            &target,
            &[DateRule::Iso("2025-12-24".to_string())],
            None
        ));
        // 2025-12-27 is a Saturday.
        assert!(is_disabled(&date(2025, 11, 27), &[weekends.clone()], None));
        assert!(!is_disabled(&target, &[weekends], None));
    }

    #[test]
    fn interval_is_inclusive() {
        let rule = DateRule::interval(date(2025, 11, 20), date(2025, 11, 31));
        let rules = [rule];
        assert!(is_disabled(&date(2025, 11, 20), &rules, None));
        assert!(is_disabled(&date(2025, 11, 31), &rules, None));
        assert!(!is_disabled(&date(2025, 11, 19), &rules, None));
        assert!(!is_disabled(&date(2026, 0, 1), &rules, None));
    }

    #[test]
    fn whitelist_takes_precedence() {
        let allowed = vec![DateRule::Date(date(2025, 10, 25))];
        let other = date(2025, 10, 26);
        assert!(is_disabled(&other, &[], Some(&allowed)));
        assert!(!is_disabled(&date(2025, 10, 25), &[], Some(&allowed)));
    }

    #[test]
    fn blacklist_applies_inside_whitelist() {
        let d = date(2025, 10, 25);
        let allowed = vec![DateRule::interval(date(2025, 10, 1), date(2025, 10, 30))];
        let blocked = vec![DateRule::Date(d)];
        assert!(is_disabled(&d, &blocked, Some(&allowed)));
        assert!(!is_disabled(&date(2025, 10, 24), &blocked, Some(&allowed)));
    }

    #[test]
    fn empty_whitelist_disables_everything() {
        let set = RuleSet {
            blacklist: vec![],
            whitelist: Some(vec![]),
        };
        assert!(set.is_disabled(&date(2025, 0, 1)));
    }

    #[test]
    fn bounds_exclude_outside_dates() {
        let bounds = DateBounds {
            min_date: Some(date(2025, 0, 10)),
            max_date: Some(date(2026, 5, 30)),
            min_year: None,
            max_year: Some(2025),
        };
        assert!(bounds.excludes(&date(2025, 0, 9)));
        assert!(!bounds.excludes(&date(2025, 0, 10)));
        assert!(bounds.excludes(&date(2026, 0, 1)));
        assert!(!DateBounds::default().excludes(&date(1, 0, 1)));
    }
}
