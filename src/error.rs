//! Diagnostics for the whole front end.
//!
//! Everything user-visible goes to stderr in the form
//! `path[line:col] Error|Warning: message`. Lexical and parse errors carry
//! the offending source line and render it with a caret underline; semantic
//! and resolver errors carry only the location.

use std::fmt;

use crate::style::Style;

pub type Result<T> = std::result::Result<T, Diagnostic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Lex,
    Parse,
    Resolve,
    Sem,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub path: String,
    pub lnr: u32,
    pub col: usize,
    /// Offending source line, when the reporter still had it.
    pub excerpt: Option<String>,
    /// Column span `[start, end)` into the excerpt.
    pub span: Option<(usize, usize)>,
    pub msg: String,
}

impl Diagnostic {
    pub fn new(kind: DiagKind, path: &str, lnr: u32, col: usize, msg: String) -> Self {
        Diagnostic {
            kind,
            path: path.to_string(),
            lnr,
            col,
            excerpt: None,
            span: None,
            msg,
        }
    }

    pub fn with_excerpt(mut self, line: &str, start: usize, end: usize) -> Self {
        self.excerpt = Some(line.trim_end_matches('\n').to_string());
        self.span = Some((start, end.max(start + 1)));
        self
    }

    pub fn internal(msg: String) -> Self {
        Diagnostic::new(DiagKind::Internal, "-", 0, 0, msg)
    }

    /// The caret line under the excerpt: tabs are kept so the carets line up
    /// regardless of how the terminal expands them.
    fn underline(&self) -> Option<String> {
        let line = self.excerpt.as_deref()?;
        let (start, end) = self.span?;
        let mut s = String::new();
        for (i, c) in line.chars().enumerate() {
            if i >= start {
                break;
            }
            s.push(if c == '\t' { '\t' } else { ' ' });
        }
        let width = end.saturating_sub(start).max(1);
        for _ in 0..width {
            s.push('^');
        }
        Some(s)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = &self.excerpt {
            writeln!(f, "{}", line)?;
            if let Some(u) = self.underline() {
                writeln!(f, "{}", Style::red(&u))?;
            }
        }
        write!(
            f,
            "{}[{}:{}] {}: {}",
            self.path,
            self.lnr,
            self.col,
            Style::bold_red("Error"),
            self.msg
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Print a warning for a located construct. Warnings never abort.
pub fn warning(path: &str, lnr: u32, msg: &str) {
    eprintln!("{}[{}] {}: {}", path, lnr, Style::yellow("Warning"), msg);
}

/// Warning with no source position (resolver probes, driver-level notes).
pub fn warning_plain(msg: &str) {
    eprintln!("{}: {}", Style::yellow("Warning"), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_location_and_message() {
        let d = Diagnostic::new(DiagKind::Sem, "cell.chp", 12, 4, "Unknown name: x".into());
        let s = format!("{}", d);
        assert!(s.contains("cell.chp[12:4]"));
        assert!(s.contains("Unknown name: x"));
    }

    #[test]
    fn excerpt_gets_caret_underline() {
        let d = Diagnostic::new(DiagKind::Lex, "a.chp", 3, 8, "Expected a type".into())
            .with_excerpt("var x: 3;\n", 7, 8);
        let s = format!("{}", d);
        assert!(s.contains("var x: 3;"));
        assert!(s.contains('^'));
        assert!(!s.contains('\n') || s.lines().count() >= 3);
    }

    #[test]
    fn underline_covers_span() {
        let d = Diagnostic::new(DiagKind::Lex, "a.chp", 1, 4, "bad".into())
            .with_excerpt("abcdefgh", 4, 7);
        let u = d.underline().unwrap();
        assert!(u.contains("^^^"));
        assert!(u.starts_with("    "));
    }

    #[test]
    fn underline_preserves_tabs() {
        let d = Diagnostic::new(DiagKind::Lex, "a.chp", 1, 2, "bad".into())
            .with_excerpt("\t\tx := 1", 2, 3);
        let u = d.underline().unwrap();
        assert!(u.starts_with("\t\t"));
    }

    #[test]
    fn zero_width_span_still_shows_one_caret() {
        let d = Diagnostic::new(DiagKind::Parse, "a.chp", 1, 5, "Expected ;".into())
            .with_excerpt("skip", 4, 4);
        let u = d.underline().unwrap();
        assert!(u.ends_with('^'));
    }
}
