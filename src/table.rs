//! Plain-text table rendering for terminal previews.

use std::{borrow::Cow, fmt::Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Column-aligned text table. Columns whose every non-empty cell parses as
/// a number are right-aligned.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn with_rows(mut self, rows: Vec<Vec<String>>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.rows[row].get(column).map(String::as_str).unwrap_or("")
    }

    fn layout(&self) -> Vec<(usize, Align)> {
        (0..self.headers.len())
            .map(|column| {
                let mut width = display_width(&self.headers[column]);
                let mut numeric = !self.rows.is_empty();
                for row in 0..self.rows.len() {
                    let cell = self.cell(row, column);
                    width = width.max(display_width(cell));
                    if !cell.is_empty() && cell.trim().parse::<f64>().is_err() {
                        numeric = false;
                    }
                }
                let align = if numeric { Align::Right } else { Align::Left };
                (width.max(3), align)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let layout = self.layout();
        let mut output = String::new();

        let header: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        push_line(&mut output, &header, &layout);
        let rule: Vec<String> = layout.iter().map(|(width, _)| "-".repeat(*width)).collect();
        let rule: Vec<&str> = rule.iter().map(String::as_str).collect();
        push_line(&mut output, &rule, &layout);
        for row in 0..self.rows.len() {
            let cells: Vec<&str> = (0..layout.len()).map(|column| self.cell(row, column)).collect();
            push_line(&mut output, &cells, &layout);
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

fn push_line(output: &mut String, cells: &[&str], layout: &[(usize, Align)]) {
    let rendered: Vec<String> = cells
        .iter()
        .zip(layout)
        .map(|(cell, (width, align))| {
            let cell = flatten(cell);
            let padding = " ".repeat(width.saturating_sub(display_width(&cell)));
            match align {
                Align::Left => format!("{cell}{padding}"),
                Align::Right => format!("{padding}{cell}"),
            }
        })
        .collect();
    let line = rendered.join("  ");
    let _ = writeln!(output, "{}", line.trim_end());
}

/// Character count, ignoring ANSI colour sequences.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            let _ = chars.by_ref().find(|next| *next == 'm');
        } else {
            width += 1;
        }
    }
    width
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
