//! Terminal output for the CLI.

use console::{Style, Term};

/// Styled writer over stderr (status) and stdout (results).
///
/// Only command results go to stdout, so they can be piped.
pub(crate) struct Output {
    term: Term,
    out: Term,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
    dim: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            out: Term::stdout(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Yellow, on stderr.
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Red, on stderr.
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted result line (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self.out.write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Print a `key: value` result line with a dimmed key.
    pub(crate) fn field(&self, key: &str, value: &str) {
        let _ = self
            .out
            .write_line(&format!("{} {value}", self.dim.apply_to(format!("{key}:"))));
    }

    /// Print raw result text.
    pub(crate) fn data(&self, text: &str) {
        let _ = self.out.write_line(text);
    }

    pub(crate) fn separator(&self) {
        let _ = self.out.write_line(&"=".repeat(70));
    }
}
