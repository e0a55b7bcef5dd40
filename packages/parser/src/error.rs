use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        line: u32,
        column: u32,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of file: expected {expected}")]
    UnexpectedEof { pos: usize, expected: String },

    #[error("Invalid syntax at {line}:{column}: {message}")]
    InvalidSyntax {
        pos: usize,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Unrecognised character at {line}:{column}")]
    LexerError { pos: usize, line: u32, column: u32 },
}

impl ParseError {
    /// Byte offset the error points at
    pub fn pos(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::UnexpectedEof { pos, .. }
            | ParseError::InvalidSyntax { pos, .. }
            | ParseError::LexerError { pos, .. } => *pos,
        }
    }

    /// 1-based line, when known
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::InvalidSyntax { line, .. }
            | ParseError::LexerError { line, .. } => Some(*line),
            ParseError::UnexpectedEof { .. } => None,
        }
    }

    fn label(&self) -> String {
        match self {
            ParseError::UnexpectedToken { expected, .. }
            | ParseError::UnexpectedEof { expected, .. } => format!("expected {}", expected),
            ParseError::InvalidSyntax { message, .. } => message.clone(),
            ParseError::LexerError { .. } => "unrecognised character".to_string(),
        }
    }
}

/// Pretty-print a parse error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let start = error.pos().min(source.len());
    let end = (start + 1).min(source.len()).max(start);

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, start..end))
                .with_color(Color::Red)
                .with_message(error.label()),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

/// Plain fallback when ariadne is not compiled in
#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(_source: &str, filename: &str, error: &ParseError) -> String {
    format!("{}: {} ({})", filename, error, error.label())
}
