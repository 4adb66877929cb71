//! Terminal output for the CLI

pub mod progress;
pub mod table;

use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

pub use progress::Spinner;
pub use table::{plan_table, report_table, verification_table};

static THEME: OnceLock<Theme> = OnceLock::new();
static QUIET: OnceLock<bool> = OnceLock::new();

pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const DATABASE: &str = "🗄️";
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub dim: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if console::Term::stdout().is_term() {
            Self {
                header: Style::new().cyan().bold(),
                success: Style::new().green().bold(),
                error: Style::new().red().bold(),
                warn: Style::new().yellow().bold(),
                dim: Style::new().white().dimmed(),
            }
        } else {
            Self {
                header: Style::new(),
                success: Style::new(),
                error: Style::new(),
                warn: Style::new(),
                dim: Style::new(),
            }
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

/// `DEPREKEY_QUIET=1` drops banners and tables; errors still print
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("DEPREKEY_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn target(database: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::DATABASE, database.style(theme().dim.clone()));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

/// Fatal diagnostic line carrying the whole error chain
pub fn abort_message(err: &anyhow::Error) -> String {
    format!("Aborted: {:#}", err)
}

pub fn print_table(table: &str) {
    if is_quiet() || table.is_empty() {
        return;
    }
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_abort_message_prints_each_cause_once() {
        let err = Error::ConstraintLeftDisabled {
            constraint: "fk_links".to_string(),
            source: Box::new(Error::BatchFailed {
                label: "dependency ids",
                index: 2,
                source: rusqlite::Error::QueryReturnedNoRows,
            }),
        };
        let message = abort_message(&anyhow::Error::from(err));

        assert!(message.starts_with("Aborted: Foreign key fk_links left disabled"));
        assert!(message.contains("Batch 'dependency ids' failed at statement 2"));
        assert_eq!(message.matches("Query returned no rows").count(), 1);
        assert_eq!(message.matches("fk_links").count(), 1);
    }
}
