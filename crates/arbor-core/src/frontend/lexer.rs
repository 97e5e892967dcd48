// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tokenizer for frontend expressions.

use super::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Ellipsis,
    Semicolon,
    Colon,
    Question,
    QuestionQuestion,
    Arrow,
    Equals,
    EqualEqual,
    EqualEqualEqual,
    Bang,
    BangEqual,
    BangEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AmpAmp,
    PipePipe,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub(crate) fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer {
        chars: source.char_indices().collect(),
        pos: 0,
        len: source.len(),
    }
    .lex()
}

struct Lexer {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Lexer {
    fn lex(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some((offset, ch)) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    offset: self.len,
                });
                return Ok(tokens);
            };
            let kind = if is_ident_start(ch) {
                self.ident()
            } else if ch.is_ascii_digit()
                || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                self.number(offset)?
            } else if ch == '"' || ch == '\'' {
                self.string(offset, ch)?
            } else {
                self.punct(offset, ch)?
            };
            tokens.push(Token { kind, offset });
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek().map(|(_, c)| c);
        self.pos += 1;
        ch
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        while let Some((offset, ch)) = self.peek() {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|(_, c)| c != '\n') {
                    self.pos += 1;
                }
            } else if ch == '/' && self.peek_at(1) == Some('*') {
                self.pos += 2;
                loop {
                    match self.bump() {
                        Some('*') if self.peek_at(0) == Some('/') => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => {}
                        None => return Err(CompileError::new(offset, "unterminated comment")),
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some((_, ch)) = self.peek() {
            if !is_ident_continue(ch) {
                break;
            }
            name.push(ch);
            self.pos += 1;
        }
        TokenKind::Ident(name)
    }

    fn number(&mut self, offset: usize) -> Result<TokenKind, CompileError> {
        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some((_, ch)) = self.peek() {
            match ch {
                '0'..='9' | '_' => {}
                '.' if !seen_dot && !seen_exp => seen_dot = true,
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    if matches!(self.peek_at(1), Some('+' | '-')) {
                        text.push(ch);
                        self.pos += 1;
                        let sign = self.bump().unwrap_or('+');
                        text.push(sign);
                        continue;
                    }
                }
                _ => break,
            }
            if ch != '_' {
                text.push(ch);
            }
            self.pos += 1;
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| CompileError::new(offset, format!("invalid number literal `{text}`")))
    }

    fn string(&mut self, offset: usize, quote: char) -> Result<TokenKind, CompileError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(CompileError::new(offset, "unterminated string literal"))
                }
                Some(c) if c == quote => return Ok(TokenKind::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(other) => out.push(other),
                    None => return Err(CompileError::new(offset, "unterminated string literal")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn punct(&mut self, offset: usize, ch: char) -> Result<TokenKind, CompileError> {
        let next = self.peek_at(1);
        let third = self.peek_at(2);
        let (kind, width) = match (ch, next, third) {
            ('.', Some('.'), Some('.')) => (TokenKind::Ellipsis, 3),
            ('=', Some('='), Some('=')) => (TokenKind::EqualEqualEqual, 3),
            ('!', Some('='), Some('=')) => (TokenKind::BangEqualEqual, 3),
            ('=', Some('='), _) => (TokenKind::EqualEqual, 2),
            ('=', Some('>'), _) => (TokenKind::Arrow, 2),
            ('!', Some('='), _) => (TokenKind::BangEqual, 2),
            ('<', Some('='), _) => (TokenKind::LessEqual, 2),
            ('>', Some('='), _) => (TokenKind::GreaterEqual, 2),
            ('&', Some('&'), _) => (TokenKind::AmpAmp, 2),
            ('|', Some('|'), _) => (TokenKind::PipePipe, 2),
            ('?', Some('?'), _) => (TokenKind::QuestionQuestion, 2),
            ('(', ..) => (TokenKind::LeftParen, 1),
            (')', ..) => (TokenKind::RightParen, 1),
            ('[', ..) => (TokenKind::LeftBracket, 1),
            (']', ..) => (TokenKind::RightBracket, 1),
            ('{', ..) => (TokenKind::LeftBrace, 1),
            ('}', ..) => (TokenKind::RightBrace, 1),
            (',', ..) => (TokenKind::Comma, 1),
            ('.', ..) => (TokenKind::Dot, 1),
            (';', ..) => (TokenKind::Semicolon, 1),
            (':', ..) => (TokenKind::Colon, 1),
            ('?', ..) => (TokenKind::Question, 1),
            ('=', ..) => (TokenKind::Equals, 1),
            ('!', ..) => (TokenKind::Bang, 1),
            ('<', ..) => (TokenKind::Less, 1),
            ('>', ..) => (TokenKind::Greater, 1),
            ('+', ..) => (TokenKind::Plus, 1),
            ('-', ..) => (TokenKind::Minus, 1),
            ('*', ..) => (TokenKind::Star, 1),
            ('/', ..) => (TokenKind::Slash, 1),
            ('%', ..) => (TokenKind::Percent, 1),
            _ => {
                return Err(CompileError::new(
                    offset,
                    format!("unexpected character `{ch}`"),
                ))
            }
        };
        self.pos += width;
        Ok(kind)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
