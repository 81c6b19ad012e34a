use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::Theme;
use crate::grid::{DayCell, MonthView, WeekStart};

const CELL_WIDTH: usize = 3;

/// Terminal stand-in for the browser surface: draws month grids and prints
/// notifications as JSON lines.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(color: Option<bool>, theme: Theme) -> Self {
        let color = color.unwrap_or_else(|| io::stdout().is_terminal());
        Self { color, theme }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    #[tracing::instrument(skip(self, view), fields(month = %view.key))]
    pub fn print_month(&self, view: &MonthView, week_start: WeekStart) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_month(out, view, week_start)
    }

    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        view: &MonthView,
        week_start: WeekStart,
    ) -> anyhow::Result<()> {
        let grid_width = CELL_WIDTH * 7;
        let title_width = UnicodeWidthStr::width(view.title.as_str());
        let pad = grid_width.saturating_sub(title_width) / 2;
        writeln!(out, "{}{}", " ".repeat(pad), self.paint(&view.title, "1"))?;

        for label in week_start.labels() {
            write!(out, "{}", pad_cell(label))?;
        }
        writeln!(out)?;

        let mut column = view.leading_blanks as usize;
        write!(out, "{}", " ".repeat(CELL_WIDTH * column))?;
        for cell in &view.cells {
            let text = pad_cell(&cell.day.to_string());
            write!(out, "{}", self.paint_cell(cell, &text))?;
            column += 1;
            if column == 7 {
                writeln!(out)?;
                column = 0;
            }
        }
        if column != 0 {
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn print_json<T: Serialize>(&self, event: &str, payload: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_json(&mut out, event, payload)
    }

    fn paint_cell(&self, cell: &DayCell, text: &str) -> String {
        let selected = match self.theme {
            Theme::Light => "30;46",
            Theme::Dark => "97;44",
        };
        let code = if cell.selected {
            selected
        } else if cell.in_range {
            "4"
        } else if cell.disabled {
            "2"
        } else if cell.today {
            "1"
        } else {
            return text.to_string();
        };
        if !self.color {
            let marker = if cell.selected {
                '*'
            } else if cell.in_range {
                '+'
            } else if cell.disabled {
                '-'
            } else {
                return text.to_string();
            };
            return mark(text, marker);
        }
        self.paint(text, code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn write_json<W: Write, T: Serialize>(
    mut out: W,
    event: &str,
    payload: &T,
) -> anyhow::Result<()> {
    let line = serde_json::json!({ "event": event, "payload": payload });
    writeln!(out, "{line}")?;
    Ok(())
}

fn pad_cell(text: &str) -> String {
    let width = UnicodeWidthStr::width(text);
    format!("{}{}", " ".repeat(CELL_WIDTH.saturating_sub(width)), text)
}

/// Puts `marker` in the padding before the day number, keeping the width.
fn mark(text: &str, marker: char) -> String {
    let trimmed = text.trim_start();
    let lead = text.len() - trimmed.len();
    if lead == 0 {
        return text.to_string();
    }
    format!("{}{marker}{trimmed}", " ".repeat(lead - 1))
}
