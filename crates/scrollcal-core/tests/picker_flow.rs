use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use scrollcal_core::config::PickerConfig;
use scrollcal_core::date::CalendarDate;
use scrollcal_core::hooks::ChangePayload;
use scrollcal_core::pagination::MonthKey;
use scrollcal_core::picker::{DatePicker, SelectOutcome};
use scrollcal_core::selection::SelectionState;
use tempfile::{NamedTempFile, tempdir};

fn day(year: i32, month: u32, day: u32) -> CalendarDate {
    CalendarDate::new(year, month - 1, day).expect("valid date")
}

fn picker(raw: &str) -> DatePicker {
    let cfg = PickerConfig::from_toml_str(raw).expect("config");
    DatePicker::with_today(cfg, day(2025, 11, 19)).expect("picker")
}

fn record_changes(picker: &mut DatePicker) -> Rc<RefCell<Vec<ChangePayload>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    picker
        .hooks_mut()
        .on_change(move |payload| sink.borrow_mut().push(payload.clone()));
    log
}

#[test]
fn single_click_notifies_with_iso_day() {
    let mut p = picker("mode = \"single\"");
    let log = record_changes(&mut p);

    let outcome = p.select_date(day(2025, 11, 25));
    assert!(matches!(outcome, SelectOutcome::Changed(_)));

    let changes = log.borrow();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        ChangePayload::Single { date, iso, .. } => {
            assert_eq!(*date, day(2025, 11, 25));
            assert_eq!(iso, "2025-11-25");
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn short_range_restarts_at_second_click() {
    // Nov 25 to Nov 26 is one night; three days means two nights minimum.
    let mut p = picker("mode = \"range\"\nmin_range_days = 3");
    let log = record_changes(&mut p);

    assert_eq!(p.select_date(day(2025, 11, 25)), SelectOutcome::RangeStarted);
    assert_eq!(
        p.select_date(day(2025, 11, 26)),
        SelectOutcome::RangeRestarted { nights: 1 }
    );
    assert_eq!(p.state(), SelectionState::RangeStartOnly);
    assert!(log.borrow().is_empty());

    p.select_date(day(2025, 11, 28));
    let changes = log.borrow();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        ChangePayload::Range {
            start,
            end,
            nights,
            days,
            ..
        } => {
            assert_eq!(*start, day(2025, 11, 26));
            assert_eq!(*end, day(2025, 11, 28));
            assert_eq!(*nights, 2);
            assert_eq!(*days, 3);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn third_click_starts_a_new_range() {
    let mut p = picker("mode = \"range\"");
    p.select_date(day(2025, 11, 20));
    p.select_date(day(2025, 11, 22));
    assert_eq!(p.state(), SelectionState::RangeComplete);

    assert_eq!(p.select_date(day(2025, 11, 21)), SelectOutcome::RangeStarted);
    assert_eq!(p.state(), SelectionState::RangeStartOnly);
}

#[test]
fn pagination_stops_at_max_months() {
    let mut p = picker("max_months = 3\ninitial_months = 2\nstart_month = \"2025-11-01\"");
    let m = MonthKey::new(2025, 10).expect("month");
    assert_eq!(p.loaded_months(), &[m, m.next()]);

    assert_eq!(p.load_next_month(), Some(m.next().next()));
    assert_eq!(p.load_next_month(), None);
    assert_eq!(p.loaded_months(), &[m, m.next(), m.next().next()]);
    assert_eq!(p.load_next_month(), None);
}

#[test]
fn whitelist_overrides_blacklist() {
    let p = picker(
        "disabled_dates = [\"2025-11-25\"]\nenabled_dates = [\"2025-11-25\", { from = \"2025-12-01\", to = \"2025-12-03\" }]",
    );
    assert!(!p.is_disabled(&day(2025, 11, 25)));
    assert!(!p.is_disabled(&day(2025, 12, 2)));
    assert!(p.is_disabled(&day(2025, 11, 26)));
}

#[test]
fn repeated_selection_is_idempotent() {
    let mut p = picker("close_on_select = false");
    let log = record_changes(&mut p);
    p.select_date(day(2025, 11, 25));
    let first = p.selection().clone();
    p.select_date(day(2025, 11, 25));
    assert_eq!(p.selection(), &first);
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(p.state(), SelectionState::SingleSelected);
}

#[test]
fn config_file_with_overrides() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "mode = \"range\"\ntheme = \"dark\"\nformat = \"DD/MM/YYYY\"\nmax_months = 12"
    )
    .expect("write config");

    let cfg = PickerConfig::load_with_overrides(
        Some(file.path()),
        vec![("set.max_months".to_string(), "6".to_string())],
    )
    .expect("load config");
    assert_eq!(cfg.max_months, 6);
    assert_eq!(cfg.format.as_deref(), Some("DD/MM/YYYY"));

    let mut p = DatePicker::with_today(cfg, day(2025, 11, 19)).expect("picker");
    let log = record_changes(&mut p);
    assert!(p.set_range("2025-11-20", "2025-11-23", true));
    match &log.borrow()[0] {
        ChangePayload::Range {
            start_formatted,
            end_formatted,
            ..
        } => {
            assert_eq!(start_formatted, "20/11/2025");
            assert_eq!(end_formatted, "23/11/2025");
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("picker.toml");
    std::fs::write(&path, "min_range_days = 0\n").expect("write config");
    assert!(PickerConfig::load(Some(&path)).is_err());

    std::fs::write(&path, "colour = \"blue\"\n").expect("write config");
    assert!(PickerConfig::load(Some(&path)).is_err());
}
