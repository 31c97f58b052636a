use crate::error::ScanError;
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::{instrument, trace};

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    HashMap::from([
        ("and", TokenKind::And),
        ("or", TokenKind::Or),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
        ("while", TokenKind::While),
        ("return", TokenKind::Return),
        ("print", TokenKind::Print),
        ("var", TokenKind::Var),
        ("func", TokenKind::Func),
        ("true", TokenKind::True),
        ("false", TokenKind::False),
        ("nil", TokenKind::Nil),
    ])
});

/// Scans a whole source string into a token sequence, ending with `Eof`.
/// Fails on the first character it cannot tokenize.
#[instrument(skip(source), fields(len = source.len()), err)]
pub fn scan(source: &str) -> Result<Vec<Token>, ScanError> {
    Scanner::new(source).scan_tokens()
}

struct Scanner {
    chars: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn scan_tokens(mut self) -> Result<Vec<Token>, ScanError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", self.line));
        trace!(count = self.tokens.len(), "Scanned token stream");
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), ScanError> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Star),
            '/' => {
                if self.matches('/') {
                    // Line comment: discard up to (not including) the newline.
                    while self.peek() != Some('\n') && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            '!' => {
                let kind = if self.matches('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.matches('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.matches('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.matches('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            c => {
                return Err(ScanError {
                    line: self.line,
                    message: format!("unexpected character '{}'", c),
                });
            }
        }
        Ok(())
    }

    fn string(&mut self) -> Result<(), ScanError> {
        let opening_line = self.line;
        while self.peek() != Some('"') && !self.is_at_end() {
            if self.peek() == Some('\n') {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return Err(ScanError {
                line: opening_line,
                message: "unterminated string".to_string(),
            });
        }
        self.advance(); // closing quote

        // The literal value excludes the surrounding quotes.
        let value: String = self.chars[self.start + 1..self.current - 1]
            .iter()
            .collect();
        self.add_token(TokenKind::Str(value));
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        // Fractional part only when a digit follows the dot.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        // A lexeme of digits and at most one interior dot always parses.
        let value: f64 = lexeme.parse().unwrap_or_default();
        self.add_token(TokenKind::Number(value));
    }

    fn identifier(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        let kind = KEYWORDS
            .get(lexeme.as_str())
            .cloned()
            .unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source)
            .expect("scan should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_operators_and_delimiters() {
        init_test_logging();
        assert_eq!(
            kinds("( ) { } , ; + - * /"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_two_character_operators() {
        init_test_logging();
        assert_eq!(
            kinds("! != = == < <= > >="),
            vec![
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_number_literals() {
        init_test_logging();
        assert_eq!(
            kinds("12 3.5"),
            vec![
                TokenKind::Number(12.0),
                TokenKind::Number(3.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn dot_without_fraction_is_not_consumed() {
        init_test_logging();
        // "7." scans as the number 7 followed by an unexpected '.'.
        let result = scan("7.");
        assert!(result.is_err());
    }

    #[test]
    fn scans_string_literal_without_quotes() {
        init_test_logging();
        let tokens = scan("\"hello\"").expect("scan should succeed");
        assert_eq!(tokens[0].kind, TokenKind::Str("hello".to_string()));
        assert_eq!(tokens[0].lexeme, "\"hello\"");
    }

    #[test]
    fn unterminated_string_reports_opening_line() {
        init_test_logging();
        let err = scan("\n\"abc").expect_err("should fail");
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "unterminated string");
    }

    #[test]
    fn keywords_are_distinguished_from_identifiers() {
        init_test_logging();
        assert_eq!(
            kinds("var variable func function"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Func,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        init_test_logging();
        assert_eq!(
            kinds("1 // ignored + 2\n3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(3.0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lines_are_attributed_one_based() {
        init_test_logging();
        let tokens = scan("var x;\nx = 1;").expect("scan should succeed");
        assert_eq!(tokens[0].line, 1); // var
        assert_eq!(tokens[3].line, 2); // x
    }

    #[test]
    fn unexpected_character_is_an_error() {
        init_test_logging();
        let err = scan("var x = @;").expect_err("should fail");
        assert_eq!(err.line, 1);
        assert!(err.message.contains('@'));
    }
}
