//! SQL tokenizer implementation.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL input.
pub struct Lexer<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the character after the current one without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            // -- line comment
            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            // /* block comment */
            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Scans a bare identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];
        if let Some(keyword) = Keyword::from_str(text) {
            self.make_token(TokenKind::Keyword(keyword))
        } else {
            self.make_token(TokenKind::Identifier(String::from(text)))
        }
    }

    /// Scans a quoted identifier (`"name"` or `` `name` ``), with the quote
    /// doubled to escape itself.
    fn scan_quoted_identifier(&mut self, quote: char) -> Token {
        self.advance(); // opening quote
        let content_start = self.pos;

        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    if self.peek_next() == Some(quote) {
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return self.make_token(TokenKind::Error(String::from(
                        "unterminated quoted identifier",
                    )));
                }
            }
        }

        let content = &self.input[content_start..self.pos];
        self.advance(); // closing quote

        let unescaped = content.replace(&format!("{quote}{quote}"), &quote.to_string());
        self.make_token(TokenKind::Identifier(unescaped))
    }

    /// Scans a single-quoted string literal with `''` escaping.
    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote
        let content_start = self.pos;

        loop {
            match self.peek() {
                Some('\'') => {
                    if self.peek_next() == Some('\'') {
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return self
                        .make_token(TokenKind::Error(String::from("unterminated string literal")));
                }
            }
        }

        let content = &self.input[content_start..self.pos];
        self.advance(); // closing quote

        let unescaped = content.replace("''", "'");
        self.make_token(TokenKind::String(unescaped))
    }

    /// Scans an integer or float literal.
    fn scan_number(&mut self) -> Token {
        let mut is_float = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            is_float = true;
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[self.start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => self.make_token(TokenKind::Float(f)),
                Err(_) => self.make_token(TokenKind::Error(format!("invalid float literal: {text}"))),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => self.make_token(TokenKind::Integer(i)),
                Err(_) => {
                    self.make_token(TokenKind::Error(format!("invalid integer literal: {text}")))
                }
            }
        }
    }

    /// Scans a `:name` placeholder.
    fn scan_named_param(&mut self) -> Token {
        self.advance(); // :
        let name_start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        if self.pos == name_start {
            return self.make_token(TokenKind::Error(String::from(
                "expected parameter name after ':'",
            )));
        }
        let name = String::from(&self.input[name_start..self.pos]);
        self.make_token(TokenKind::NamedParam(name))
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '\'' => self.scan_string(),
            '"' | '`' => self.scan_quoted_identifier(c),
            '0'..='9' => self.scan_number(),
            ':' => self.scan_named_param(),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
            _ => self.scan_operator(),
        }
    }

    /// Scans a single- or multi-character operator or delimiter.
    fn scan_operator(&mut self) -> Token {
        let c = self.advance().expect("caller checked non-empty input");
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Eq,
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Error(String::from("unexpected character '!'"))
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::NotEq
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::Concat
                } else {
                    TokenKind::Error(String::from("unexpected character '|'"))
                }
            }
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            other => TokenKind::Error(format!("unexpected character '{other}'")),
        };
        self.make_token(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut kinds = vec![];
        loop {
            let token = lexer.next_token();
            if token.is_eof() {
                break;
            }
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex_kinds("SELECT name FROM users"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier(String::from("name")),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier(String::from("users")),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex_kinds("= <> != < <= > >= + - * ** / % ||"),
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::StarStar,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Concat,
            ]
        );
    }

    #[test]
    fn test_string_escape() {
        assert_eq!(
            lex_kinds("'it''s'"),
            vec![TokenKind::String(String::from("it's"))]
        );
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(
            lex_kinds("\"order\" `from`"),
            vec![
                TokenKind::Identifier(String::from("order")),
                TokenKind::Identifier(String::from("from")),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex_kinds("42 3.14 1e3"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.14),
                TokenKind::Float(1000.0),
            ]
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            lex_kinds("? :age"),
            vec![
                TokenKind::Question,
                TokenKind::NamedParam(String::from("age")),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex_kinds("SELECT -- trailing\n/* block */ 1"),
            vec![TokenKind::Keyword(Keyword::Select), TokenKind::Integer(1)]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let kinds = lex_kinds("'oops");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }
}
