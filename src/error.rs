use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    EvalError,
}

/// A diagnostic from any phase of the pipeline. Tokens only carry a line
/// number, so errors are line-granular.
#[derive(Debug, Clone)]
pub struct FenError {
    pub kind: ErrorKind,
    pub line: usize,
    pub message: String,
    pub help: Option<String>,
}

impl FenError {
    pub fn new(kind: ErrorKind, line: usize, message: String) -> Self {
        Self {
            kind,
            line,
            message,
            help: None,
        }
    }

    pub fn new_with_help(kind: ErrorKind, line: usize, message: String, help: String) -> Self {
        Self {
            kind,
            line,
            message,
            help: Some(help),
        }
    }

    pub fn lex_error(line: usize, message: String) -> Self {
        Self::new(ErrorKind::LexError, line, message)
    }

    pub fn parse_error(line: usize, message: String) -> Self {
        Self::new(ErrorKind::ParseError, line, message)
    }

    pub fn parse_error_with_help(line: usize, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::ParseError, line, message, help)
    }

    pub fn eval_error(line: usize, message: String) -> Self {
        Self::new(ErrorKind::EvalError, line, message)
    }

    pub fn eval_error_with_help(line: usize, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::EvalError, line, message, help)
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.kind {
            ErrorKind::LexError => Color::Red,
            ErrorKind::ParseError => Color::Yellow,
            ErrorKind::EvalError => Color::Magenta,
        };

        let kind_str = match self.kind {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::ParseError => "Parse Error",
            ErrorKind::EvalError => "Evaluation Error",
        };

        let (start, end) = line_bounds(source, self.line);

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.message))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    }
}

/// Char range of the 1-based `line` in `source`, for ariadne labels.
fn line_bounds(source: &str, line: usize) -> (usize, usize) {
    let mut offset = 0;
    for (i, text) in source.lines().enumerate() {
        let len = text.chars().count();
        if i + 1 == line {
            return (offset, offset + len.max(1));
        }
        offset += len + 1;
    }
    let total = source.chars().count();
    (total.saturating_sub(1), total)
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for FenError {}
