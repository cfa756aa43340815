use std::str::Chars;

use peekmore::{PeekMore, PeekMoreIterator};

use crate::token::{Token, Type, Location};
use crate::literal::Literal;
use crate::error::{Report, ScanError};

pub struct Scanner<'a> {
    source: PeekMoreIterator<Chars<'a>>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column_offset: usize,
    next_id: u64,
    out: Vec<u8>,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner.
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            source: source.chars().peekmore(),
            tokens: vec!(),
            start: 0,
            current: 0,
            line: 1,
            column_offset: 0,
            next_id: 0,
            out: Vec::new(),
        }
    }

    /// Scans the source code and returns the tokens along with any error
    /// text produced along the way (written in `line <N>: <message>` form).
    pub fn scan_tokens(mut self) -> (Vec<Token>, String) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        let id = self.mint_id();
        self.tokens.push(
            Token::new(
                Type::EOF,
                String::from(""),
                None,
                Location::new(self.line, 0),
                id,
            )
        );

        (self.tokens, String::from_utf8(self.out).unwrap_or_default())
    }

    fn mint_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn report(&mut self, err: ScanError) {
        let _ = err.report(&mut self.out);
    }

    /// Returns the next character.
    fn advance(&mut self) -> char {
        match self.source.next() {
            Some(char) => {
                self.current += 1;
                char
            },
            None => panic!("tried to advance past end of the file."),
        }
    }

    /// Returns the next character without consuming it, or the `'\0'`
    /// sentinel once the source is exhausted (mirrors
    /// `original_source/pylox/scanner.py`'s `peek`, which returns the same
    /// sentinel rather than raising at end of input).
    fn peek(&mut self) -> char {
        match self.source.peek_nth(0) {
            Some(char) => *char,
            None => '\0',
        }
    }

    /// Returns the next next character without consuming it, or the `'\0'`
    /// sentinel once there is no such character.
    fn peek_next(&mut self) -> char {
        match self.source.peek_nth(1) {
            Some(char) => *char,
            None => '\0',
        }
    }

    /// Returns if the character one past the current one is the expected
    /// character, without consuming anything.
    fn match_next(&mut self, expected: char) -> bool {
        match self.source.peek_nth(1) {
            Some(char) if *char == expected => true,
            Some(_) => false,
            None => false,
        }
    }

    /// Adds a new token to the list of tokens.
    fn add_token(&mut self, r#type: Type, lexeme: String, literal: Option<Literal>) {
        let id = self.mint_id();
        self.tokens.push(
            Token::new(
                r#type,
                lexeme,
                literal,
                Location::new(self.line, self.start - self.column_offset),
                id,
            )
        );
    }

    /// Adds a new single char token to the list of tokens.
    fn add_single_char_token(&mut self, r#type: Type) {
        let c = self.advance();
        self.add_token(r#type, c.to_string(), None);
    }

    /// Adds a new double char token to the list of tokens.
    fn add_double_char_token(&mut self, r#type: Type) {
        let first = self.advance();
        let second = self.advance();

        self.add_token(r#type, format!("{first}{second}"), None);
    }

    /// Returns if the scanner has reached the end of the file.
    fn is_at_end(&mut self) -> bool {
        self.source.peek().is_none()
    }

    /// Handles a string literal.
    fn string(&mut self) {
        self.advance(); // Move past the starting double quotes.
        let start = (self.line, self.start - self.column_offset);

        let mut value = Vec::new();
        while !self.is_at_end() {
            match self.source.next_if(|&x| x != '"') {
                Some(c) => {
                    self.current += 1;
                    value.push(c);

                    if c == '\n' {
                        self.line += 1;
                        self.column_offset = self.current;
                    }
                },
                None => { break; },
            }
        }

        if self.is_at_end() {
            self.report(ScanError {
                line: start.0,
                message: String::from("Unterminated string."),
            });
            return;
        }

        self.advance();  // Move to the closing double quotes.

        let value: String = value.into_iter().collect();

        // Literal does not include the double quotes unlike the lexeme.
        self.add_token(Type::String, value.clone(), Some(Literal::String(value)));
    }

    /// Handles a number literal.
    fn number(&mut self) {
        let mut value = Vec::new();

        while self.peek().is_ascii_digit() {
            value.push(self.advance());
        }

        // A `.` is only part of the number if at least one digit follows it;
        // `123.` scans as the number `123` followed by a separate `.` token
        // (e.g. for a trailing method call like `123.toString()`), not as an
        // error and not as a truncated float.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            value.push(self.advance()); // Consume the dot.

            while self.peek().is_ascii_digit() {
                value.push(self.advance());
            }
        }

        let value: String = value.into_iter().collect();
        let value_num: f64 = value.parse().unwrap();

        self.add_token(Type::Number, value, Some(Literal::Number(value_num)));
    }

    /// Handles an identifier or a keyword.
    fn identifier(&mut self) {
        let mut value = Vec::new();

        // is_alphanumeric does not include underscores.
        while matches!(self.peek(), c if c.is_alphanumeric() || c == '_') {
            value.push(self.advance());
        }

        let value = String::from_iter(value);
        let token_type = match value.as_str() {
            "and"      => Type::And,
            "class"    => Type::Class,
            "else"     => Type::Else,
            "false"    => Type::False,
            "for"      => Type::For,
            "fun"      => Type::Fun,
            "if"       => Type::If,
            "nil"      => Type::Nil,
            "or"       => Type::Or,
            "print"    => Type::Print,
            "return"   => Type::Return,
            "break"    => Type::Break,
            "super"    => Type::Super,
            "this"     => Type::This,
            "true"     => Type::True,
            "var"      => Type::Var,
            "while"    => Type::While,
            _          => Type::Identifier,
        };

        self.add_token(token_type, value, None);
    }

    /// Consumes a `/* ... */` comment, allowing nested `/* */` pairs inside.
    /// `depth` starts at 1 for the opening pair already consumed by the
    /// caller. Reports an error if the source ends before every nested pair
    /// has closed — `/* /* */ //` is an error even though a `*/` appears,
    /// because it only closes the inner comment.
    fn block_comment(&mut self, start_line: usize) {
        let mut depth: u32 = 1;

        while depth > 0 {
            if self.is_at_end() {
                self.report(ScanError {
                    line: start_line,
                    message: String::from("Unterminated block comment."),
                });
                return;
            }

            let c = self.advance();
            match c {
                '\n' => {
                    self.line += 1;
                    self.column_offset = self.current;
                }
                '/' if !self.is_at_end() && self.peek() == '*' => {
                    self.advance();
                    depth += 1;
                }
                '*' if !self.is_at_end() && self.peek() == '/' => {
                    self.advance();
                    depth -= 1;
                }
                _ => {}
            }
        }
    }

    /// Scans the next token.
    fn scan_token(&mut self) {
        let c = self.peek();
        match c {
            // One character tokens
            '(' => self.add_single_char_token(Type::LeftParen),
            ')' => self.add_single_char_token(Type::RightParen),
            '{' => self.add_single_char_token(Type::LeftBrace),
            '}' => self.add_single_char_token(Type::RightBrace),
            ',' => self.add_single_char_token(Type::Comma),
            '.' => self.add_single_char_token(Type::Dot),
            '-' => self.add_single_char_token(Type::Minus),
            '+' => self.add_single_char_token(Type::Plus),
            ';' => self.add_single_char_token(Type::Semicolon),
            '*' => self.add_single_char_token(Type::Star),

            // Two character tokens
            '!' => {
                if self.match_next('=') {
                    self.add_double_char_token(Type::BangEqual);
                } else {
                    self.add_single_char_token(Type::Bang)
                };
            },
            '=' => {
                if self.match_next('=') {
                    self.add_double_char_token(Type::EqualEqual);
                } else {
                    self.add_single_char_token(Type::Equal)
                };
            },
            '<' => {
                if self.match_next('=') {
                    self.add_double_char_token(Type::LessEqual);
                } else {
                    self.add_single_char_token(Type::Less)
                };
            },
            '>' => {
                if self.match_next('=') {
                    self.add_double_char_token(Type::GreaterEqual);
                } else {
                    self.add_single_char_token(Type::Greater)
                };
            },
            '/' => {
                if self.match_next('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_next('*') {
                    let start_line = self.line;
                    self.advance(); // consume '/'
                    self.advance(); // consume '*'
                    self.block_comment(start_line);
                } else {
                    self.add_single_char_token(Type::Slash);
                }
            },

            // Ignore whitespace
            ' ' | '\r' | '\t' => {
                self.advance();
            },

            // Update line counter
            '\n' => {
                self.advance();

                self.line += 1;
                self.column_offset = self.current;
            },

            // String
            '"' => self.string(),

            // Numbers
            c if c.is_ascii_digit() => self.number(),

            // Identifiers
            c if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                self.advance();

                self.report(ScanError {
                    line: self.line,
                    message: format!("Unexpected character '{c}'."),
                });
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> (Vec<Token>, String) {
        Scanner::new(src).scan_tokens()
    }

    #[test]
    fn scans_single_and_double_char_tokens() {
        let (tokens, errors) = scan("!= == <= >=");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            types,
            vec![Type::BangEqual, Type::EqualEqual, Type::LessEqual, Type::GreaterEqual, Type::EOF]
        );
    }

    #[test]
    fn every_token_has_a_distinct_id() {
        let (tokens, _) = scan("this this this");
        let ids: Vec<_> = tokens.iter().map(|t| t.id).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn nil_keyword_scans_as_nil_not_null() {
        let (tokens, _) = scan("nil");
        assert_eq!(tokens[0].r#type, Type::Nil);
    }

    #[test]
    fn break_is_a_keyword() {
        let (tokens, _) = scan("break");
        assert_eq!(tokens[0].r#type, Type::Break);
    }

    #[test]
    fn block_comment_starting_with_a_star_is_recognized_not_a_stray_slash() {
        // Regression: match_next used to read through peekmore's
        // cursor-advancing peek_next(), so the '/' branch's first
        // match_next('/') call (which fails here) left the cursor one
        // position ahead, and the second match_next('*') call then checked
        // the wrong character and fell through to a bare Slash token.
        let (tokens, errors) = scan("/* comment */ 1;");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Semicolon, Type::EOF]);
    }

    #[test]
    fn first_token_is_reported_on_line_one() {
        let (tokens, _) = scan("1;");
        assert_eq!(tokens[0].location.line, 1);
    }

    #[test]
    fn nested_block_comments_close_correctly() {
        let (tokens, errors) = scan("/* /* nested */ still a comment */ 1");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].r#type, Type::Number);
    }

    #[test]
    fn block_comment_closed_once_but_opened_twice_is_unterminated() {
        let (_, errors) = scan("/* /* */ //");
        assert!(errors.contains("Unterminated block comment."));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_, errors) = scan("\"abc");
        assert!(errors.contains("Unterminated string."));
    }

    #[test]
    fn trailing_dot_scans_as_number_then_separate_dot() {
        let (tokens, errors) = scan("123.");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Dot, Type::EOF]);
        assert_eq!(tokens[0].lexeme, "123");
    }

    #[test]
    fn leading_dot_is_never_part_of_a_number() {
        let (tokens, errors) = scan(".5");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Dot, Type::Number, Type::EOF]);
    }

    #[test]
    fn number_with_no_trailing_character_does_not_panic() {
        let (tokens, errors) = scan("42");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::EOF]);
    }

    #[test]
    fn identifier_with_no_trailing_character_does_not_panic() {
        let (tokens, errors) = scan("x");
        assert!(errors.is_empty());
        let types: Vec<_> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Identifier, Type::EOF]);
    }
}
