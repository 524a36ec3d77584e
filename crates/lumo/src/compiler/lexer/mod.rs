//! Tokenizer. Produces a token sequence ending in `Eof`; every token
//! carries the position of its first byte and the raw lexeme length.

mod reader;
mod token;

pub use reader::Reader;
pub use token::{Token, TokenKind};

use smol_str::SmolStr;

use crate::compiler::span::Span;
use crate::vm::error::{ErrorKind, LexErrorKind, LuaError, LuaResult};

pub struct Lexer<'a> {
    reader: Reader<'a>,
    chunk_name: SmolStr,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, chunk_name: &str) -> Self {
        Lexer {
            reader: Reader::new(source),
            chunk_name: SmolStr::new(chunk_name),
        }
    }

    pub fn tokenize(mut self) -> LuaResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            self.reader.reset_buff();
            if self.reader.is_eof() {
                let pos = self.reader.position();
                tokens.push(Token::new(TokenKind::Eof, Span::at(pos), 0));
                return Ok(tokens);
            }
            let kind = self.lex()?;
            let span = Span::new(self.reader.token_start_position(), self.reader.position());
            tokens.push(Token::new(kind, span, self.reader.token_len()));
        }
    }

    /// Skip whitespace and comments; comments are never emitted as tokens.
    fn skip_trivia(&mut self) -> LuaResult<()> {
        loop {
            match self.reader.current_char() {
                ' ' | '\t' | '\r' | '\n' | '\x0B' | '\x0C' => self.reader.bump(),
                '-' if self.reader.next_char() == '-' => {
                    self.reader.reset_buff();
                    self.reader.bump();
                    self.reader.bump();
                    if self.reader.current_char() == '[' {
                        // `--[` opens a long comment only with a matching
                        // long-bracket opener; otherwise it is a line
                        // comment.
                        let save = self.reader.clone_probe();
                        self.reader.bump();
                        let level = self.reader.eat_when('=');
                        if self.reader.current_char() == '[' {
                            self.reader.bump();
                            self.read_long_bracket_body(level, LexErrorKind::UnclosedComment)?;
                            continue;
                        }
                        self.reader.restore_probe(save);
                    }
                    self.reader
                        .eat_while(|ch| ch != '\n' && ch != '\r');
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex(&mut self) -> LuaResult<TokenKind> {
        let ch = self.reader.current_char();
        match ch {
            'A'..='Z' | 'a'..='z' | '_' => {
                self.reader.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
                let name = self.reader.current_text();
                Ok(TokenKind::keyword_from_name(name)
                    .unwrap_or_else(|| TokenKind::Name(SmolStr::new(name))))
            }
            '0'..='9' => self.lex_number(),
            '"' | '\'' => {
                self.reader.bump();
                self.lex_short_string(ch)
            }
            '[' => {
                if matches!(self.reader.next_char(), '[' | '=') {
                    let save = self.reader.clone_probe();
                    self.reader.bump();
                    let level = self.reader.eat_when('=');
                    if self.reader.current_char() == '[' {
                        self.reader.bump();
                        return self.lex_long_string(level);
                    }
                    self.reader.restore_probe(save);
                }
                self.reader.bump();
                Ok(TokenKind::LeftBracket)
            }
            '.' => {
                if self.reader.next_char().is_ascii_digit() {
                    return self.lex_number();
                }
                self.reader.bump();
                if self.reader.current_char() != '.' {
                    return Ok(TokenKind::Dot);
                }
                self.reader.bump();
                if self.reader.current_char() != '.' {
                    return Ok(TokenKind::Concat);
                }
                self.reader.bump();
                Ok(TokenKind::Dots)
            }
            '=' => {
                self.reader.bump();
                if self.reader.current_char() == '=' {
                    self.reader.bump();
                    Ok(TokenKind::Eq)
                } else {
                    Ok(TokenKind::Assign)
                }
            }
            '~' => {
                self.reader.bump();
                if self.reader.current_char() == '=' {
                    self.reader.bump();
                    Ok(TokenKind::Ne)
                } else {
                    Ok(TokenKind::Tilde)
                }
            }
            '<' => {
                self.reader.bump();
                match self.reader.current_char() {
                    '=' => {
                        self.reader.bump();
                        Ok(TokenKind::Le)
                    }
                    '<' => {
                        self.reader.bump();
                        Ok(TokenKind::Shl)
                    }
                    _ => Ok(TokenKind::Lt),
                }
            }
            '>' => {
                self.reader.bump();
                match self.reader.current_char() {
                    '=' => {
                        self.reader.bump();
                        Ok(TokenKind::Ge)
                    }
                    '>' => {
                        self.reader.bump();
                        Ok(TokenKind::Shr)
                    }
                    _ => Ok(TokenKind::Gt),
                }
            }
            '/' => {
                self.reader.bump();
                if self.reader.current_char() == '/' {
                    self.reader.bump();
                    Ok(TokenKind::DoubleSlash)
                } else {
                    Ok(TokenKind::Slash)
                }
            }
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '%' => self.single(TokenKind::Percent),
            '^' => self.single(TokenKind::Caret),
            '#' => self.single(TokenKind::Hash),
            '&' => self.single(TokenKind::Ampersand),
            '|' => self.single(TokenKind::Pipe),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            ']' => self.single(TokenKind::RightBracket),
            ';' => self.single(TokenKind::Semicolon),
            ':' => self.single(TokenKind::Colon),
            ',' => self.single(TokenKind::Comma),
            other => Err(self.error(LexErrorKind::UnexpectedCharacter(other))),
        }
    }

    fn single(&mut self, kind: TokenKind) -> LuaResult<TokenKind> {
        self.reader.bump();
        Ok(kind)
    }

    fn lex_short_string(&mut self, quote: char) -> LuaResult<TokenKind> {
        let mut bytes = Vec::new();
        loop {
            let ch = self.reader.current_char();
            if self.reader.is_eof() || ch == '\n' || ch == '\r' {
                return Err(self.error(LexErrorKind::UnclosedString));
            }
            if ch == quote {
                self.reader.bump();
                return Ok(TokenKind::Str(bytes));
            }
            if ch != '\\' {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                self.reader.bump();
                continue;
            }
            self.reader.bump();
            let esc = self.reader.current_char();
            if self.reader.is_eof() {
                return Err(self.error(LexErrorKind::UnclosedString));
            }
            match esc {
                'a' => bytes.push(0x07),
                'b' => bytes.push(0x08),
                'f' => bytes.push(0x0C),
                'n' => bytes.push(b'\n'),
                'r' => bytes.push(b'\r'),
                't' => bytes.push(b'\t'),
                'v' => bytes.push(0x0B),
                '\\' => bytes.push(b'\\'),
                '\'' => bytes.push(b'\''),
                '"' => bytes.push(b'"'),
                other => {
                    // Unknown escapes are preserved literally.
                    bytes.push(b'\\');
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                }
            }
            self.reader.bump();
        }
    }

    fn lex_long_string(&mut self, level: usize) -> LuaResult<TokenKind> {
        let body = self.read_long_bracket_body(level, LexErrorKind::UnclosedLongString)?;
        Ok(TokenKind::Str(body))
    }

    /// Body of a `[=*[ ... ]=*]` bracket, open bracket already consumed.
    /// The first newline immediately after the opener is discarded; the
    /// close must carry the same `=` level.
    fn read_long_bracket_body(
        &mut self,
        level: usize,
        unclosed: LexErrorKind,
    ) -> LuaResult<Vec<u8>> {
        let mut bytes = Vec::new();
        match self.reader.current_char() {
            '\n' => {
                self.reader.bump();
            }
            '\r' => {
                self.reader.bump();
                if self.reader.current_char() == '\n' {
                    self.reader.bump();
                }
            }
            _ => {}
        }
        loop {
            if self.reader.is_eof() {
                return Err(self.error(unclosed));
            }
            let ch = self.reader.current_char();
            if ch == ']' {
                let save = self.reader.clone_probe();
                self.reader.bump();
                let count = self.reader.eat_when('=');
                if count == level && self.reader.current_char() == ']' {
                    self.reader.bump();
                    return Ok(bytes);
                }
                // A closer with the wrong level is ordinary content.
                self.reader.restore_probe(save);
                bytes.push(b']');
                self.reader.bump();
                continue;
            }
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            self.reader.bump();
        }
    }

    fn lex_number(&mut self) -> LuaResult<TokenKind> {
        let first = self.reader.current_char();
        if first == '0' && matches!(self.reader.next_char(), 'x' | 'X') {
            self.reader.bump();
            self.reader.bump();
            let mut digits = String::new();
            while self.reader.current_char().is_ascii_hexdigit() {
                digits.push(self.reader.current_char());
                self.reader.bump();
            }
            if digits.is_empty() {
                return Err(self.error(LexErrorKind::InvalidHexNumber));
            }
            // Hex literals wrap around i64, as in Lua 5.3.
            let mut value: i64 = 0;
            for d in digits.bytes() {
                let digit = (d as char).to_digit(16).unwrap_or(0) as i64;
                value = value.wrapping_mul(16).wrapping_add(digit);
            }
            return Ok(TokenKind::Int(value));
        }

        let mut is_float = false;
        let mut text = String::new();
        if first == '.' {
            // `.5` reads as `0.5`; the loop consumes the dot itself.
            text.push('0');
        }
        loop {
            let ch = self.reader.current_char();
            match ch {
                '0'..='9' => {
                    text.push(ch);
                    self.reader.bump();
                }
                '.' => {
                    if is_float {
                        break;
                    }
                    // A trailing dot belongs to the number only when a
                    // digit follows; otherwise it is the dot delimiter.
                    if !self.reader.next_char().is_ascii_digit() {
                        break;
                    }
                    is_float = true;
                    text.push('.');
                    self.reader.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push('e');
                    self.reader.bump();
                    let sign = self.reader.current_char();
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.reader.bump();
                    }
                    if !self.reader.current_char().is_ascii_digit() {
                        return Err(self.error(LexErrorKind::InvalidNumber));
                    }
                    while self.reader.current_char().is_ascii_digit() {
                        text.push(self.reader.current_char());
                        self.reader.bump();
                    }
                    break;
                }
                _ => break,
            }
        }
        if self.reader.current_char().is_ascii_alphanumeric()
            || self.reader.current_char() == '_'
        {
            return Err(self.error(LexErrorKind::InvalidNumber));
        }
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => Ok(TokenKind::Float(f)),
                Err(_) => Err(self.error(LexErrorKind::InvalidNumber)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(TokenKind::Int(i)),
                // Decimal integers that overflow become floats.
                Err(_) => match text.parse::<f64>() {
                    Ok(f) => Ok(TokenKind::Float(f)),
                    Err(_) => Err(self.error(LexErrorKind::InvalidNumber)),
                },
            }
        }
    }

    fn error(&self, kind: LexErrorKind) -> LuaError {
        LuaError::new(
            ErrorKind::Lex(kind),
            self.reader.token_start_position(),
            self.chunk_name.clone(),
        )
    }
}
