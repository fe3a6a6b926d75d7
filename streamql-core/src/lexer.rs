//! Lexer for the streamql pipe-oriented query language.

use crate::error::{QueryError, QueryResult, SyntaxError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Pipeline / flow keywords
    Create,
    Flow,
    Ttl,
    As,

    // Operator keywords
    Where,
    Select,
    Scan,
    Step,
    Summarize,
    InsertInto,
    Collect,

    // Clause keywords
    By,
    Over,
    Iff,
    Emit,
    Every,
    When,
    On,
    Change,
    Of,
    Group,
    Update,
    Using,

    // Window function keywords
    HoppingWindow,
    TumblingWindow,
    SlidingWindow,
    CountWindow,
    SessionWindow,
    HoppingWindowBy,
    TumblingWindowBy,
    SlidingWindowBy,

    // Literals / identifiers
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    True,
    False,
    Null,

    // Operators
    OrOr,          // ||
    AndAnd,        // &&
    Equal,         // ==
    NotEqual,      // !=
    LessThanEq,    // <=
    GreaterThanEq, // >=
    LessThan,      // <
    GreaterThan,   // >
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    FatArrow,      // =>
    Assign,        // =
    Pipe,          // |
    Spread,        // ...

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    Eof,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();
        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('/') if self.peek(1) == Some('/') => {
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_number(&mut self) -> QueryResult<Token> {
        let start = self.position;
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| SyntaxError::new(format!("invalid float: {num_str}"), start).into())
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| SyntaxError::new(format!("invalid integer: {num_str}"), start).into())
        }
    }

    fn read_string(&mut self) -> QueryResult<Token> {
        let start = self.position;
        let quote = self.current_char.unwrap();
        self.advance();

        let mut string = String::new();
        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance();
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    string.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => other,
                    });
                    self.advance();
                }
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(SyntaxError::new("unterminated string literal", start).into())
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.to_lowercase().as_str() {
            "create" => Token::Create,
            "flow" => Token::Flow,
            "ttl" => Token::Ttl,
            "as" => Token::As,
            "where" => Token::Where,
            "select" => Token::Select,
            "scan" => Token::Scan,
            "step" => Token::Step,
            "summarize" => Token::Summarize,
            "insert_into" => Token::InsertInto,
            "collect" => Token::Collect,
            "by" => Token::By,
            "over" => Token::Over,
            "iff" => Token::Iff,
            "emit" => Token::Emit,
            "every" => Token::Every,
            "when" => Token::When,
            "on" => Token::On,
            "change" => Token::Change,
            "of" => Token::Of,
            "group" => Token::Group,
            "update" => Token::Update,
            "using" => Token::Using,
            "hopping_window" => Token::HoppingWindow,
            "tumbling_window" => Token::TumblingWindow,
            "sliding_window" => Token::SlidingWindow,
            "count_window" => Token::CountWindow,
            "session_window" => Token::SessionWindow,
            "hopping_window_by" => Token::HoppingWindowBy,
            "tumbling_window_by" => Token::TumblingWindowBy,
            "sliding_window_by" => Token::SlidingWindowBy,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Identifier(ident),
        }
    }

    pub fn next_token(&mut self) -> QueryResult<Token> {
        self.skip_whitespace_and_comments();

        let start = self.position;
        let token = match self.current_char {
            None => Token::Eof,

            Some(ch) if ch.is_ascii_digit() => return self.read_number(),
            Some('"') | Some('\'') => return self.read_string(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => return Ok(self.read_identifier()),

            Some('|') => {
                self.advance();
                if self.current_char == Some('|') {
                    self.advance();
                    Token::OrOr
                } else {
                    Token::Pipe
                }
            }
            Some('&') => {
                self.advance();
                if self.current_char == Some('&') {
                    self.advance();
                    Token::AndAnd
                } else {
                    return Err(SyntaxError::new("expected '&&'", start).into());
                }
            }
            Some('=') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::Equal
                } else if self.current_char == Some('>') {
                    self.advance();
                    Token::FatArrow
                } else {
                    Token::Assign
                }
            }
            Some('!') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    return Err(SyntaxError::new("unexpected character: !", start).into());
                }
            }
            Some('<') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessThanEq
                } else {
                    Token::LessThan
                }
            }
            Some('>') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterThanEq
                } else {
                    Token::GreaterThan
                }
            }
            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('/') => {
                self.advance();
                Token::Slash
            }
            Some('.') => {
                self.advance();
                if self.current_char == Some('.') && self.peek(1) == Some('.') {
                    self.advance();
                    self.advance();
                    Token::Spread
                } else {
                    Token::Dot
                }
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some(':') => {
                self.advance();
                Token::Colon
            }
            Some('(') => {
                self.advance();
                Token::LeftParen
            }
            Some(')') => {
                self.advance();
                Token::RightParen
            }
            Some('{') => {
                self.advance();
                Token::LeftBrace
            }
            Some('}') => {
                self.advance();
                Token::RightBrace
            }
            Some('[') => {
                self.advance();
                Token::LeftBracket
            }
            Some(']') => {
                self.advance();
                Token::RightBracket
            }

            Some(ch) => {
                return Err(QueryError::from(SyntaxError::new(
                    format!("unexpected character: {ch}"),
                    start,
                )))
            }
        };

        Ok(token)
    }

    pub fn tokenize(&mut self) -> QueryResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("where select scan step summarize insert_into collect");
        assert_eq!(
            tokens,
            vec![
                Token::Where,
                Token::Select,
                Token::Scan,
                Token::Step,
                Token::Summarize,
                Token::InsertInto,
                Token::Collect,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(tokenize("WHERE")[0], Token::Where);
        assert_eq!(tokenize("Where")[0], Token::Where);
    }

    #[test]
    fn test_window_keywords() {
        assert_eq!(tokenize("tumbling_window")[0], Token::TumblingWindow);
        assert_eq!(tokenize("hopping_window_by")[0], Token::HoppingWindowBy);
        assert_eq!(tokenize("session_window")[0], Token::SessionWindow);
    }

    #[test]
    fn test_identifiers_and_numbers() {
        let tokens = tokenize("age 21 3.5");
        assert_eq!(tokens[0], Token::Identifier("age".to_string()));
        assert_eq!(tokens[1], Token::Integer(21));
        assert_eq!(tokens[2], Token::Float(3.5));
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            tokenize("\"hello\\nworld\"")[0],
            Token::String("hello\nworld".to_string())
        );
        assert_eq!(tokenize("'single'")[0], Token::String("single".to_string()));
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("|| && == != <= >= < > + - * / => = | ...");
        assert_eq!(
            tokens,
            vec![
                Token::OrOr,
                Token::AndAnd,
                Token::Equal,
                Token::NotEqual,
                Token::LessThanEq,
                Token::GreaterThanEq,
                Token::LessThan,
                Token::GreaterThan,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::FatArrow,
                Token::Assign,
                Token::Pipe,
                Token::Spread,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_skipped() {
        let tokens = tokenize("where age > 1 // trailing comment\n| select { age }");
        assert!(tokens.contains(&Token::Select));
    }

    #[test]
    fn test_number_vs_dot_access() {
        // `a.b` must not be swallowed into a float
        let tokens = tokenize("a.b");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".to_string()),
                Token::Dot,
                Token::Identifier("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_error_unterminated_string() {
        assert!(Lexer::new("\"oops").tokenize().is_err());
    }

    #[test]
    fn test_error_unexpected_char() {
        assert!(Lexer::new("$").tokenize().is_err());
    }
}
