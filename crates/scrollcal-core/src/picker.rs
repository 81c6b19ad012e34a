use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{DisplayVariant, PickerConfig, Theme};
use crate::date::{CalendarDate, DateInput, parse_date_at};
use crate::grid::{MonthView, build_month};
use crate::hooks::{ChangePayload, Hooks, MonthChange, YearChange};
use crate::pagination::{MonthKey, Paginator, ScrollMetrics};
use crate::rules::{DateBounds, DateRule, RuleSet};
use crate::selection::{
    Completion, Selection, SelectionMachine, SelectionMode, SelectionState, Transition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Disabled,
    Unparseable,
    Destroyed,
}

/// Result of activating a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Ignored(IgnoreReason),
    RangeStarted,
    /// The range had the wrong length and restarted at the clicked day.
    RangeRestarted { nights: i64 },
    Changed(ChangePayload),
}

fn date_disabled(rules: &RuleSet, bounds: &DateBounds, date: &CalendarDate) -> bool {
    bounds.excludes(date) || rules.is_disabled(date)
}

/// One widget instance. Everything it mutates lives here.
#[derive(Debug)]
pub struct DatePicker {
    id: Uuid,
    config: PickerConfig,
    today: CalendarDate,
    rules: RuleSet,
    bounds: DateBounds,
    machine: SelectionMachine,
    pages: Paginator,
    theme: Theme,
    open: bool,
    visible_month: Option<MonthKey>,
    destroyed: bool,
    hooks: Hooks,
}

impl DatePicker {
    pub fn new(config: PickerConfig) -> anyhow::Result<Self> {
        Self::with_today(config, CalendarDate::today())
    }

    /// Builds a picker that treats `today` as the current day.
    #[instrument(skip(config), fields(today = %today))]
    pub fn with_today(config: PickerConfig, today: CalendarDate) -> anyhow::Result<Self> {
        config.validate_at(today)?;

        let rules = config.resolve_rules(today);
        let bounds = config.resolve_bounds(today);
        let mut machine = SelectionMachine::new(config.mode, config.range_limits());

        if config.default_to_today && config.mode == SelectionMode::Single {
            let preset = machine.set_single(today, |d| date_disabled(&rules, &bounds, d));
            if preset.is_none() {
                debug!("today is disabled; not preselecting it");
            }
        }

        let mut picker = Self {
            id: Uuid::new_v4(),
            today,
            rules,
            bounds,
            machine,
            pages: Paginator::new(config.pagination_limits()),
            theme: config.theme,
            open: config.display == DisplayVariant::Inline,
            visible_month: None,
            destroyed: false,
            hooks: Hooks::default(),
            config,
        };

        let anchor = picker.initial_anchor();
        picker.pages.load_initial(anchor);

        info!(
            id = %picker.id,
            mode = %picker.mode(),
            display = ?picker.config.display,
            months = picker.pages.loaded().len(),
            "created date picker"
        );
        Ok(picker)
    }

    fn initial_anchor(&self) -> MonthKey {
        let selected = match self.machine.selection() {
            Selection::Single { date } => *date,
            Selection::Range { start, .. } => *start,
        };
        let mut anchor = self
            .config
            .resolve_start_month(self.today)
            .or(selected)
            .unwrap_or(self.today);
        if let Some(min) = self.bounds.min_date
            && anchor < min
        {
            anchor = min;
        }
        MonthKey::of(&anchor)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn today(&self) -> CalendarDate {
        self.today
    }

    pub fn selection(&self) -> &Selection {
        self.machine.selection()
    }

    pub fn state(&self) -> SelectionState {
        self.machine.state()
    }

    pub fn mode(&self) -> SelectionMode {
        self.machine.mode()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn loaded_months(&self) -> &[MonthKey] {
        self.pages.loaded().as_slice()
    }

    pub fn visible_month(&self) -> Option<MonthKey> {
        self.visible_month
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Bounds first, then the rule lists.
    pub fn is_disabled(&self, date: &CalendarDate) -> bool {
        date_disabled(&self.rules, &self.bounds, date)
    }

    fn guard_destroyed(&self, action: &str) -> bool {
        if self.destroyed {
            warn!(id = %self.id, action, "picker destroyed; ignoring");
        }
        self.destroyed
    }

    #[instrument(skip(self), fields(id = %self.id, candidate = %candidate))]
    pub fn select_date(&mut self, candidate: CalendarDate) -> SelectOutcome {
        if self.guard_destroyed("select") {
            return SelectOutcome::Ignored(IgnoreReason::Destroyed);
        }

        let rules = &self.rules;
        let bounds = &self.bounds;
        let transition = self
            .machine
            .select(candidate, |d| date_disabled(rules, bounds, d));

        match transition {
            Transition::Disabled => SelectOutcome::Ignored(IgnoreReason::Disabled),
            Transition::RangeStarted => SelectOutcome::RangeStarted,
            Transition::RangeRestarted { nights } => SelectOutcome::RangeRestarted { nights },
            Transition::Completed(done) => {
                let payload = self.notify_change(done);
                if self.config.close_on_select {
                    self.close();
                }
                SelectOutcome::Changed(payload)
            }
        }
    }

    /// Entry point for a rendered cell, identified by its ISO day.
    pub fn activate_cell(&mut self, iso: &str) -> SelectOutcome {
        match parse_date_at(iso, self.today) {
            Some(date) => self.select_date(date),
            None => {
                debug!(iso, "cell activation with unparseable date");
                SelectOutcome::Ignored(IgnoreReason::Unparseable)
            }
        }
    }

    fn notify_change(&mut self, done: Completion) -> ChangePayload {
        let payload = ChangePayload::from_completion(done, self.config.format.as_deref());
        debug!(id = %self.id, handlers = self.hooks.change.len(), "firing change hooks");
        self.hooks.change.emit(&payload);
        payload
    }

    /// Programmatic single selection, validated like a click. Returns false
    /// when the input is unparseable, disabled, or the mode is not single.
    #[instrument(skip(self, input), fields(id = %self.id))]
    pub fn set_date(&mut self, input: impl Into<DateInput>, notify: bool) -> bool {
        if self.guard_destroyed("set_date") {
            return false;
        }
        let Some(date) = parse_date_at(input, self.today) else {
            warn!("set_date with unparseable input");
            return false;
        };
        let rules = &self.rules;
        let bounds = &self.bounds;
        let Some(done) = self
            .machine
            .set_single(date, |d| date_disabled(rules, bounds, d))
        else {
            debug!(date = %date, "set_date rejected");
            return false;
        };
        self.load_for_selection(MonthKey::of(&date));
        if notify {
            self.notify_change(done);
        }
        true
    }

    /// Programmatic range, validated like two clicks.
    #[instrument(skip(self, start, end), fields(id = %self.id))]
    pub fn set_range(
        &mut self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
        notify: bool,
    ) -> bool {
        if self.guard_destroyed("set_range") {
            return false;
        }
        let (Some(start), Some(end)) = (
            parse_date_at(start, self.today),
            parse_date_at(end, self.today),
        ) else {
            warn!("set_range with unparseable input");
            return false;
        };
        let rules = &self.rules;
        let bounds = &self.bounds;
        let Some(done) = self
            .machine
            .set_range(start, end, |d| date_disabled(rules, bounds, d))
        else {
            debug!(start = %start, end = %end, "set_range rejected");
            return false;
        };
        self.load_for_selection(MonthKey::of(&start));
        if notify {
            self.notify_change(done);
        }
        true
    }

    fn load_for_selection(&mut self, month: MonthKey) {
        if !self.pages.ensure_loaded(month) {
            debug!(id = %self.id, month = %month, "selected month is outside the loadable window");
        }
    }

    pub fn clear(&mut self) {
        if self.guard_destroyed("clear") {
            return;
        }
        self.machine.clear();
    }

    /// Hard reset into `mode`.
    pub fn switch_mode(&mut self, mode: SelectionMode) {
        if self.guard_destroyed("switch_mode") {
            return;
        }
        self.machine.switch_mode(mode);
        self.config.mode = mode;
    }

    /// Runtime setter taking a name; unknown names are rejected with a
    /// warning and leave the picker unchanged.
    pub fn set_mode_name(&mut self, raw: &str) -> bool {
        match raw.parse::<SelectionMode>() {
            Ok(mode) if !self.destroyed => {
                self.switch_mode(mode);
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(id = %self.id, value = raw, error = %err, "rejected mode change");
                false
            }
        }
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if self.guard_destroyed("set_theme") {
            return false;
        }
        debug!(id = %self.id, theme = %theme, "theme changed");
        self.theme = theme;
        true
    }

    pub fn set_theme_name(&mut self, raw: &str) -> bool {
        match raw.parse::<Theme>() {
            Ok(theme) => self.set_theme(theme),
            Err(err) => {
                warn!(id = %self.id, value = raw, error = %err, "rejected theme change");
                false
            }
        }
    }

    /// `None` removes the bound. Unparseable input is ignored.
    pub fn set_min_date(&mut self, input: Option<DateInput>) -> bool {
        if self.guard_destroyed("set_min_date") {
            return false;
        }
        match Self::resolve_bound(input, self.today) {
            Some(bound) => {
                self.bounds.min_date = bound;
                true
            }
            None => false,
        }
    }

    pub fn set_max_date(&mut self, input: Option<DateInput>) -> bool {
        if self.guard_destroyed("set_max_date") {
            return false;
        }
        match Self::resolve_bound(input, self.today) {
            Some(bound) => {
                self.bounds.max_date = bound;
                true
            }
            None => false,
        }
    }

    fn resolve_bound(
        input: Option<DateInput>,
        today: CalendarDate,
    ) -> Option<Option<CalendarDate>> {
        let Some(input) = input else {
            return Some(None);
        };
        match parse_date_at(input, today) {
            Some(date) => Some(Some(date)),
            None => {
                warn!("ignoring unparseable date bound");
                None
            }
        }
    }

    pub fn add_disable_rule(&mut self, rule: DateRule) -> bool {
        if self.guard_destroyed("add_disable_rule") {
            return false;
        }
        self.rules.blacklist.push(rule);
        true
    }

    pub fn set_enable_rules(&mut self, rules: Option<Vec<DateRule>>) -> bool {
        if self.guard_destroyed("set_enable_rules") {
            return false;
        }
        self.rules.whitelist = rules;
        true
    }

    pub fn open(&mut self) -> bool {
        if self.open || self.guard_destroyed("open") {
            return false;
        }
        self.open = true;
        self.hooks.open.emit(self.machine.selection());
        true
    }

    /// The inline variant never closes.
    pub fn close(&mut self) -> bool {
        if !self.open || self.config.display == DisplayVariant::Inline {
            return false;
        }
        self.open = false;
        self.hooks.close.emit(self.machine.selection());
        true
    }

    pub fn toggle(&mut self) -> bool {
        if self.open { self.close() } else { self.open() }
    }

    /// Loads the next month when the viewport is within the scroll
    /// threshold of the bottom.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> Option<MonthKey> {
        if self.destroyed || !metrics.near_bottom(self.config.scroll_threshold) {
            return None;
        }
        self.pages.load_next()
    }

    pub fn load_next_month(&mut self) -> Option<MonthKey> {
        if self.guard_destroyed("load_next_month") {
            return None;
        }
        self.pages.load_next()
    }

    pub fn ensure_month_loaded(&mut self, month: MonthKey) -> bool {
        !self.destroyed && self.pages.ensure_loaded(month)
    }

    pub fn goto_today(&mut self) -> bool {
        let month = MonthKey::of(&self.today);
        self.ensure_month_loaded(month)
    }

    /// Records the month at the top of the viewport. Fires month-change when
    /// it moved, and year-change when the year differs from the previous one.
    pub fn notify_visible_month(&mut self, month: MonthKey) {
        if self.destroyed {
            return;
        }
        let previous = self.visible_month.replace(month);
        if previous == Some(month) {
            return;
        }
        self.hooks.month_change.emit(&MonthChange {
            month,
            title: month.title(),
        });
        if let Some(previous) = previous
            && previous.year != month.year
        {
            self.hooks.year_change.emit(&YearChange { year: month.year });
        }
    }

    /// Cells for a loaded month, passed through the day-create hooks.
    pub fn render_month(&mut self, month: MonthKey) -> Option<MonthView> {
        if self.destroyed || !self.pages.loaded().contains(month) {
            return None;
        }
        let rules = &self.rules;
        let bounds = &self.bounds;
        let mut view = build_month(
            month,
            self.config.first_day_of_week,
            self.today,
            self.machine.selection(),
            |d| date_disabled(rules, bounds, d),
        );
        for cell in &mut view.cells {
            self.hooks.decorate(cell);
        }
        Some(view)
    }

    pub fn render_loaded(&mut self) -> Vec<MonthView> {
        let months = self.loaded_months().to_vec();
        months
            .into_iter()
            .filter_map(|month| self.render_month(month))
            .collect()
    }

    /// Detaches every hook and drops loaded months. Nothing fires after this.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.hooks.clear();
        self.pages.clear();
        self.open = false;
        self.visible_month = None;
        self.destroyed = true;
        info!(id = %self.id, "destroyed date picker");
    }
}
