use std::{error::Error, fmt};

use cactus::Cactus;
use indexmap::IndexSet;
use rdgrammar::{NewlineCache, Span};
use unicode_width::UnicodeWidthStr;

/// One entry of the parser's diagnostic call stack: a rule being matched and which of its
/// alternatives (or items) is currently being tried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Frame {
    pub rule: String,
    pub alt: usize,
}

/// The furthest position at which any token was tried, the tokens tried there, and the call
/// stack when the position was first reached.
pub(crate) struct BestFailure {
    pos: Option<usize>,
    expected: IndexSet<String>,
    stack: Cactus<Frame>,
}

impl BestFailure {
    pub(crate) fn new() -> Self {
        BestFailure::starting_at(None)
    }

    /// A fresh record that only takes note of tokens tried at or beyond `pos`.
    pub(crate) fn starting_at(pos: Option<usize>) -> Self {
        BestFailure {
            pos,
            expected: IndexSet::new(),
            stack: Cactus::new(),
        }
    }

    pub(crate) fn pos(&self) -> Option<usize> {
        self.pos
    }

    /// Note that the token `name` was tried at `pos` with the call stack `stack`.
    pub(crate) fn record(&mut self, pos: usize, name: &str, stack: &Cactus<Frame>) {
        match self.pos {
            Some(best) if pos < best => (),
            Some(best) if pos == best => {
                self.expected.insert(name.to_owned());
            }
            _ => {
                self.pos = Some(pos);
                self.expected.clear();
                self.expected.insert(name.to_owned());
                self.stack = stack.clone();
            }
        }
    }

    /// Replace this record with `inner` if `inner` got strictly further.
    pub(crate) fn merge(&mut self, inner: BestFailure) {
        if inner.pos > self.pos {
            *self = inner;
        }
    }

    pub(crate) fn expected_at(&self, pos: usize) -> Vec<String> {
        if self.pos == Some(pos) {
            self.expected.iter().cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// The call stack, outermost rule first.
    pub(crate) fn stack(&self) -> Vec<(String, usize)> {
        let mut frames = self
            .stack
            .vals()
            .map(|f| (f.rule.clone(), f.alt))
            .collect::<Vec<_>>();
        frames.reverse();
        frames
    }
}

/// The kinds of parse failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No rule could match the character at the error position.
    UnexpectedInput(char),
    /// The input ended while the grammar still required more.
    UnexpectedEof,
    /// The start rule matched, but did not consume all the input.
    TrailingInput,
    /// The rule nesting depth exceeded the configured maximum.
    DepthExceeded(usize),
}

/// A failed parse, located at the most informative position known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// The byte offset of the error in the input.
    pub position: usize,
    /// 1-based line number of `position`.
    pub line: usize,
    /// 1-based column number (in characters) of `position`.
    pub column: usize,
    /// The full text of the line containing the error.
    pub source_line: String,
    /// The tokens tried at `position`, in the order they were first tried.
    pub expected: Vec<String>,
    /// In verbose mode, the rules (and alternative indices) being matched when `position` was
    /// first reached, outermost first.
    pub stack: Option<Vec<(String, usize)>>,
    /// Display width of `source_line` before `position`.
    indent: usize,
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        src: &str,
        nlc: &NewlineCache,
        position: usize,
        expected: Vec<String>,
        stack: Option<Vec<(String, usize)>>,
    ) -> Self {
        let (line, column) = nlc.byte_to_line_and_col(src, position).unwrap_or((1, 1));
        let line_span = nlc
            .line_span(src, position)
            .unwrap_or_else(|| Span::empty_at(0));
        let source_line = line_span.slice(src).unwrap_or("").to_owned();
        let indent = src
            .get(line_span.start()..position.min(line_span.end()))
            .map_or(0, UnicodeWidthStr::width);
        ParseError {
            kind,
            position,
            line,
            column,
            source_line,
            expected,
            stack,
            indent,
        }
    }

    /// The source line with a caret underneath the error position.
    pub fn highlighted_line(&self) -> String {
        let prefix = format!("{}| ", self.line);
        format!(
            "{}{}\n{}^",
            prefix,
            self.source_line,
            " ".repeat(prefix.len() + self.indent)
        )
    }
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            ParseErrorKind::UnexpectedInput(c) => format!("Unexpected '{}'", c),
            ParseErrorKind::UnexpectedEof => "Unexpected end of input".to_owned(),
            ParseErrorKind::TrailingInput => {
                "Parsing succeeded, but not all input was consumed".to_owned()
            }
            ParseErrorKind::DepthExceeded(d) => {
                format!("Maximum rule nesting depth ({}) exceeded", d)
            }
        };
        write!(
            f,
            "{} at line {} column {}:\n{}",
            s,
            self.line,
            self.column,
            self.highlighted_line()
        )?;
        if let Some((last, init)) = self.expected.split_last() {
            if init.is_empty() {
                write!(f, "\nExpected: {}", last)?;
            } else {
                write!(f, "\nExpected: {} or {}", init.join(", "), last)?;
            }
        }
        if let Some(ref stack) = self.stack {
            write!(f, "\nRule stack:")?;
            for (rule, alt) in stack.iter().rev() {
                write!(f, "\n  {} (alternative {})", rule, alt)?;
            }
        }
        Ok(())
    }
}
