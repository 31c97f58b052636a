use lazy_static::lazy_static;
use owo_colors::{AnsiColors, OwoColorize};
use regex::Regex;
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow::{self, Borrowed, Owned};

lazy_static! {
    // Order matters: earlier rules claim their spans first, so a keyword
    // inside a string stays string-colored.
    static ref STRING_RE: Regex = Regex::new(r#""([^"\\]|\\.)*""#).unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"//.*").unwrap();
    static ref KEYWORD_RE: Regex =
        Regex::new(r"\b(var|func|if|else|while|return|print|and|or)\b").unwrap();
    static ref LITERAL_RE: Regex = Regex::new(r"\b(true|false|nil)\b").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"\b\d+(\.\d+)?\b").unwrap();
}

#[derive(Default)]
pub struct SourceHighlighter {
    matching_bracket_highlighter: MatchingBracketHighlighter,
}

impl SourceHighlighter {
    fn rules() -> [(&'static Regex, AnsiColors); 5] {
        [
            (&*STRING_RE, AnsiColors::Green),
            (&*COMMENT_RE, AnsiColors::BrightBlack),
            (&*KEYWORD_RE, AnsiColors::Cyan),
            (&*LITERAL_RE, AnsiColors::Yellow),
            (&*NUMBER_RE, AnsiColors::Magenta),
        ]
    }
}

impl Highlighter for SourceHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        // Collect non-overlapping styled spans, first rule wins.
        let mut spans: Vec<(usize, usize, AnsiColors)> = Vec::new();
        for (regex, color) in Self::rules() {
            for m in regex.find_iter(line) {
                let free = spans
                    .iter()
                    .all(|(start, end, _)| m.end() <= *start || m.start() >= *end);
                if free {
                    spans.push((m.start(), m.end(), color));
                }
            }
        }
        if spans.is_empty() {
            return Borrowed(line);
        }
        spans.sort_by_key(|(start, _, _)| *start);

        let mut styled = String::with_capacity(line.len() + spans.len() * 10);
        let mut last = 0;
        for (start, end, color) in spans {
            styled.push_str(&line[last..start]);
            styled.push_str(&(&line[start..end]).color(color).to_string());
            last = end;
        }
        styled.push_str(&line[last..]);
        Owned(styled)
    }

    fn highlight_char(&self, line: &str, pos: usize, forced: bool) -> bool {
        // Bracket matching decides on its own; otherwise re-highlight any
        // non-empty line.
        self.matching_bracket_highlighter
            .highlight_char(line, pos, forced)
            || !line.is_empty()
    }
}

/// The rustyline helper: default (no-op) completion, hinting, and
/// validation, with highlighting delegated to [`SourceHighlighter`].
#[derive(Completer, Helper, Hinter, Validator)]
pub struct ReplHelper {
    highlighter: SourceHighlighter,
}

impl ReplHelper {
    pub fn new() -> Self {
        Self {
            highlighter: SourceHighlighter::default(),
        }
    }
}

impl Default for ReplHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_char(&self, line: &str, pos: usize, forced: bool) -> bool {
        self.highlighter.highlight_char(line, pos, forced)
    }
}
