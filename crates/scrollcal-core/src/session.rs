use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::pagination::MonthKey;
use crate::picker::{DatePicker, SelectOutcome};
use crate::render::Renderer;
use crate::selection::{Selection, SelectionState};

/// One scripted step, standing in for a DOM event.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(String),
    SetDate(String),
    SetRange(String, String),
    Mode(String),
    Theme(String),
    Scroll(usize),
    Show(Option<MonthKey>),
    Visible(MonthKey),
    Open,
    Close,
    Toggle,
    Clear,
    Today,
    State,
    Destroy,
}

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "select", "date", "range", "mode", "theme", "scroll", "show", "visible", "open", "close",
        "toggle", "clear", "today", "state", "destroy",
    ]
}

/// Unique-prefix expansion against `known`.
pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

impl Command {
    pub fn parse(tokens: &[String]) -> anyhow::Result<Self> {
        let (head, args) = tokens
            .split_first()
            .ok_or_else(|| anyhow!("empty command"))?;
        let name = expand_command_abbrev(&head.to_ascii_lowercase(), &known_command_names())
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {head}"))?;

        let arg = |idx: usize| {
            args.get(idx)
                .cloned()
                .ok_or_else(|| anyhow!("{name}: missing argument {}", idx + 1))
        };

        let command = match name {
            "select" => Command::Select(args.join(" ")),
            "date" => Command::SetDate(args.join(" ")),
            "range" => Command::SetRange(arg(0)?, arg(1)?),
            "mode" => Command::Mode(arg(0)?),
            "theme" => Command::Theme(arg(0)?),
            "scroll" => {
                let count = match args.first() {
                    Some(raw) => raw
                        .parse::<usize>()
                        .with_context(|| format!("scroll: invalid count {raw}"))?,
                    None => 1,
                };
                Command::Scroll(count)
            }
            "show" => match args.first() {
                Some(raw) => Command::Show(Some(raw.parse()?)),
                None => Command::Show(None),
            },
            "visible" => Command::Visible(arg(0)?.parse()?),
            "open" => Command::Open,
            "close" => Command::Close,
            "toggle" => Command::Toggle,
            "clear" => Command::Clear,
            "today" => Command::Today,
            "state" => Command::State,
            "destroy" => Command::Destroy,
            other => return Err(anyhow!("unhandled command: {other}")),
        };

        if matches!(command, Command::Select(ref raw) | Command::SetDate(ref raw) if raw.is_empty())
        {
            return Err(anyhow!("{name}: missing date"));
        }
        Ok(command)
    }
}

/// Splits command-line words into commands at `;` (standalone or trailing).
pub fn parse_script(words: &[String]) -> anyhow::Result<Vec<Command>> {
    let mut commands = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for word in words {
        let (body, ends) = match word.strip_suffix(';') {
            Some(body) => (body, true),
            None => (word.as_str(), false),
        };
        if !body.is_empty() {
            current.push(body.to_string());
        }
        if ends && !current.is_empty() {
            commands.push(Command::parse(&current)?);
            current.clear();
        }
    }
    if !current.is_empty() {
        commands.push(Command::parse(&current)?);
    }
    Ok(commands)
}

/// One command per line; blank lines and `#` comments are skipped.
pub fn parse_lines(text: &str) -> anyhow::Result<Vec<Command>> {
    let mut commands = Vec::new();
    for (line_num, raw_line) in text.lines().enumerate() {
        let line = raw_line.split_once('#').map_or(raw_line, |(before, _)| before);
        let words: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
        if words.is_empty() {
            continue;
        }
        let command = Command::parse(&words)
            .with_context(|| format!("script line {}: {}", line_num + 1, raw_line.trim()))?;
        commands.push(command);
    }
    Ok(commands)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub event: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
struct StateReport<'a> {
    mode: String,
    state: SelectionState,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    theme: String,
    open: bool,
    destroyed: bool,
    loaded: Vec<String>,
    visible: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

type EventLog = Rc<RefCell<Vec<SessionEvent>>>;

fn push_event<T: Serialize>(log: &EventLog, event: &str, payload: &T) {
    let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
    log.borrow_mut().push(SessionEvent {
        event: event.to_string(),
        payload,
    });
}

/// Drives a picker from commands, collecting every hook notification.
pub struct Session {
    picker: DatePicker,
    renderer: Renderer,
    events: EventLog,
    print: bool,
}

impl Session {
    pub fn new(picker: DatePicker, renderer: Renderer) -> Self {
        let mut session = Self {
            picker,
            renderer,
            events: Rc::new(RefCell::new(Vec::new())),
            print: true,
        };
        session.attach_hooks();
        session
    }

    /// Collects events without writing to stdout.
    pub fn quiet(picker: DatePicker, renderer: Renderer) -> Self {
        let mut session = Self::new(picker, renderer);
        session.print = false;
        session
    }

    pub fn picker(&self) -> &DatePicker {
        &self.picker
    }

    fn attach_hooks(&mut self) {
        let hooks = self.picker.hooks_mut();
        let log = Rc::clone(&self.events);
        hooks.on_change(move |p| push_event(&log, "change", p));
        let log = Rc::clone(&self.events);
        hooks.on_open(move |s| push_event(&log, "open", &selection_json(s)));
        let log = Rc::clone(&self.events);
        hooks.on_close(move |s| push_event(&log, "close", &selection_json(s)));
        let log = Rc::clone(&self.events);
        hooks.on_month_change(move |c| push_event(&log, "month-change", c));
        let log = Rc::clone(&self.events);
        hooks.on_year_change(move |c| push_event(&log, "year-change", c));
    }

    pub fn run(&mut self, commands: Vec<Command>) -> anyhow::Result<Vec<SessionEvent>> {
        let mut all = Vec::new();
        for command in commands {
            all.extend(self.execute(command)?);
        }
        Ok(all)
    }

    #[instrument(skip(self))]
    pub fn execute(&mut self, command: Command) -> anyhow::Result<Vec<SessionEvent>> {
        let mut local = Vec::new();
        match command {
            Command::Select(raw) => {
                let outcome = self.picker.activate_cell(&raw);
                debug!(?outcome, "select finished");
                if !matches!(outcome, SelectOutcome::Changed(_)) {
                    local.push(outcome_event(&outcome));
                }
            }
            Command::SetDate(raw) => {
                let ok = self.picker.set_date(raw.as_str(), true);
                local.push(result_event("date", ok));
            }
            Command::SetRange(start, end) => {
                let ok = self.picker.set_range(start.as_str(), end.as_str(), true);
                local.push(result_event("range", ok));
            }
            Command::Mode(raw) => {
                let ok = self.picker.set_mode_name(&raw);
                local.push(result_event("mode", ok));
            }
            Command::Theme(raw) => {
                let ok = self.picker.set_theme_name(&raw);
                self.renderer.set_theme(self.picker.theme());
                local.push(result_event("theme", ok));
            }
            Command::Scroll(count) => {
                for _ in 0..count {
                    let loaded = self.picker.load_next_month();
                    local.push(SessionEvent {
                        event: "loaded".to_string(),
                        payload: serde_json::to_value(loaded)?,
                    });
                    if loaded.is_none() {
                        break;
                    }
                }
            }
            Command::Show(month) => {
                let months = match month {
                    Some(month) => vec![month],
                    None => self.picker.loaded_months().to_vec(),
                };
                for month in months {
                    let view = self
                        .picker
                        .render_month(month)
                        .ok_or_else(|| anyhow!("month {month} is not loaded"))?;
                    if self.print {
                        self.renderer
                            .print_month(&view, self.picker.config().first_day_of_week)?;
                    }
                }
            }
            Command::Visible(month) => self.picker.notify_visible_month(month),
            Command::Open => {
                self.picker.open();
            }
            Command::Close => {
                self.picker.close();
            }
            Command::Toggle => {
                self.picker.toggle();
            }
            Command::Clear => self.picker.clear(),
            Command::Today => {
                let ok = self.picker.goto_today();
                local.push(result_event("today", ok));
            }
            Command::State => {
                local.push(SessionEvent {
                    event: "state".to_string(),
                    payload: serde_json::to_value(self.state_report())?,
                });
            }
            Command::Destroy => self.picker.destroy(),
        }

        let mut emitted: Vec<SessionEvent> = self.events.borrow_mut().drain(..).collect();
        emitted.extend(local);
        if self.print {
            for event in &emitted {
                self.renderer.print_json(&event.event, &event.payload)?;
            }
        }
        Ok(emitted)
    }

    fn state_report(&self) -> StateReport<'_> {
        let (date, start, end) = match self.picker.selection() {
            Selection::Single { date } => (*date, None, None),
            Selection::Range { start, end } => (None, *start, *end),
        };
        StateReport {
            mode: self.picker.mode().to_string(),
            state: self.picker.state(),
            date: date.map(|d| d.iso()),
            start: start.map(|d| d.iso()),
            end: end.map(|d| d.iso()),
            theme: self.picker.theme().to_string(),
            open: self.picker.is_open(),
            destroyed: self.picker.is_destroyed(),
            loaded: self
                .picker
                .loaded_months()
                .iter()
                .map(ToString::to_string)
                .collect(),
            visible: self.picker.visible_month().map(|m| m.to_string()),
            format: self.picker.config().format.as_deref(),
        }
    }
}

fn selection_json(selection: &Selection) -> Value {
    match selection {
        Selection::Single { date } => serde_json::json!({ "date": date }),
        Selection::Range { start, end } => serde_json::json!({ "start": start, "end": end }),
    }
}

fn outcome_event(outcome: &SelectOutcome) -> SessionEvent {
    let payload = match outcome {
        SelectOutcome::Ignored(reason) => {
            serde_json::json!({ "ignored": format!("{reason:?}").to_ascii_lowercase() })
        }
        SelectOutcome::RangeStarted => serde_json::json!({ "range": "started" }),
        SelectOutcome::RangeRestarted { nights } => {
            serde_json::json!({ "range": "restarted", "nights": nights })
        }
        SelectOutcome::Changed(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
    };
    SessionEvent {
        event: "select".to_string(),
        payload,
    }
}

fn result_event(event: &str, ok: bool) -> SessionEvent {
    SessionEvent {
        event: event.to_string(),
        payload: serde_json::json!({ "ok": ok }),
    }
}
