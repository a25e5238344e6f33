use std::fmt::Display;
use std::io::IsTerminal;

use nu_ansi_term::{Color, Style};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Text renderer for command output.
///
/// Quiet mode drops icons, spacing and color so output stays grep-friendly.
pub struct Ui {
    styles: Styles,
    color: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let color = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if color {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        Self {
            styles: Styles::for_theme(theme),
            color,
            quiet,
        }
    }

    pub fn spacer(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Right-aligned `key: value` pairs under a heading.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.len()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let key = self.paint(self.styles.key, format!("{key:>width$}:"));
            println!("  {key} {}", self.paint(self.styles.value, value));
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        let bullet = if self.color { "•" } else { "-" };
        let bullet = self.paint(self.styles.accent, bullet);
        for entry in entries {
            println!("  {bullet} {entry}");
        }
    }

    /// Column-aligned table; `None` cells render empty.
    pub fn table(&self, title: &str, headers: &[String], rows: &[Vec<Option<String>>]) {
        self.heading(title);
        if headers.is_empty() {
            return;
        }
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                let len = cell.as_deref().map_or(0, |c| c.chars().count());
                *width = (*width).max(len);
            }
        }
        let header = join_padded(headers.iter().map(String::as_str), &widths);
        println!("  {}", self.paint(self.styles.key, header));
        for row in rows {
            let cells = row.iter().map(|cell| cell.as_deref().unwrap_or(""));
            println!("  {}", join_padded(cells, &widths));
        }
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            println!("{message}");
        } else {
            println!("{} {message}", self.paint(self.styles.ok, "✔"));
        }
    }

    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {message}", self.paint(self.styles.alert, "⚠"));
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            println!("{}", self.paint(self.styles.title, format!("▸ {title}")));
        }
    }

    fn paint(&self, style: Style, text: impl Into<String>) -> String {
        let text = text.into();
        if self.color {
            style.paint(text).to_string()
        } else {
            text
        }
    }
}

fn join_padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Clone, Copy)]
struct Styles {
    title: Style,
    key: Style,
    value: Style,
    accent: Style,
    ok: Style,
    alert: Style,
}

impl Styles {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Plain => Self {
                title: Style::new(),
                key: Style::new(),
                value: Style::new(),
                accent: Style::new(),
                ok: Style::new(),
                alert: Style::new(),
            },
            Theme::Light => Self {
                title: Color::Blue.bold(),
                key: Color::Black.bold(),
                value: Style::new().fg(Color::Black),
                accent: Style::new().fg(Color::Blue),
                ok: Color::Green.bold(),
                alert: Color::Red.bold(),
            },
            Theme::Dark | Theme::Auto => Self {
                title: Color::Purple.bold(),
                key: Color::LightBlue.bold(),
                value: Style::new().fg(Color::White),
                accent: Style::new().fg(Color::LightBlue),
                ok: Color::LightGreen.bold(),
                alert: Color::Yellow.bold(),
            },
        }
    }
}
