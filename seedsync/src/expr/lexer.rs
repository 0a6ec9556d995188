//! Tokenizer for arithmetic formulas.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Caret => "'^'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, buf: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            buf.push(c);
            self.bump();
        }
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut cursor = Cursor {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    loop {
        while cursor.peek().is_some_and(char::is_whitespace) {
            cursor.bump();
        }

        let (line, column) = (cursor.line, cursor.column);
        let Some(c) = cursor.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
            return Ok(tokens);
        };

        let kind = if c.is_ascii_digit() || c == '.' {
            lex_number(&mut cursor, line, column)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut name = String::new();
            cursor.take_while(&mut name, |c| c.is_ascii_alphanumeric() || c == '_');
            TokenKind::Ident(name)
        } else {
            cursor.bump();
            match c {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '^' => TokenKind::Caret,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                other => {
                    return Err(ExpressionError::parse(
                        format!("unexpected character '{}'", other),
                        line,
                        column,
                    ))
                }
            }
        };

        tokens.push(Token { kind, line, column });
    }
}

fn lex_number(cursor: &mut Cursor<'_>, line: usize, column: usize) -> Result<TokenKind, ExpressionError> {
    let mut text = String::new();
    cursor.take_while(&mut text, |c| c.is_ascii_digit());
    if cursor.peek() == Some('.') {
        text.push('.');
        cursor.bump();
        cursor.take_while(&mut text, |c| c.is_ascii_digit());
    }

    if matches!(cursor.peek(), Some('e' | 'E')) {
        // Only an exponent when digits follow; otherwise `e` starts an identifier.
        let mut lookahead = cursor.chars.clone();
        lookahead.next();
        let next = lookahead.next();
        let after_sign = lookahead.next();
        let is_exponent = match next {
            Some(d) if d.is_ascii_digit() => true,
            Some('+' | '-') => after_sign.is_some_and(|d| d.is_ascii_digit()),
            _ => false,
        };
        if is_exponent {
            text.push('e');
            cursor.bump();
            if let Some(sign @ ('+' | '-')) = cursor.peek() {
                text.push(sign);
                cursor.bump();
            }
            cursor.take_while(&mut text, |c| c.is_ascii_digit());
        }
    }

    text.parse::<f64>()
        .map(TokenKind::Number)
        .map_err(|_| ExpressionError::parse(format!("invalid number '{}'", text), line, column))
}
