//! Character reader over a source string with byte-accurate positions.

use crate::compiler::span::Position;

pub const EOF_CHAR: char = '\0';

/// Cursor over source text. Tracks the byte offset, line and column of the
/// current character, plus the start of the token being accumulated.
pub struct Reader<'a> {
    text: &'a str,
    offset: usize,
    line: u32,
    column: u32,
    token_start: usize,
    token_start_pos: Position,
}

impl<'a> Reader<'a> {
    pub fn new(text: &'a str) -> Self {
        Reader {
            text,
            offset: 0,
            line: 1,
            column: 1,
            token_start: 0,
            token_start_pos: Position::new(1, 1, 0),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.text.len()
    }

    /// The character under the cursor, or `EOF_CHAR` past the end.
    pub fn current_char(&self) -> char {
        self.text[self.offset..].chars().next().unwrap_or(EOF_CHAR)
    }

    /// The character after the current one.
    pub fn next_char(&self) -> char {
        let mut chars = self.text[self.offset..].chars();
        chars.next();
        chars.next().unwrap_or(EOF_CHAR)
    }

    /// Advance past the current character, updating line/column.
    pub fn bump(&mut self) {
        let ch = self.current_char();
        if ch == EOF_CHAR && self.is_eof() {
            return;
        }
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    pub fn eat_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while !self.is_eof() && pred(self.current_char()) {
            self.bump();
        }
    }

    /// Consume a run of `ch`, returning how many were eaten.
    pub fn eat_when(&mut self, ch: char) -> usize {
        let mut count = 0;
        while !self.is_eof() && self.current_char() == ch {
            self.bump();
            count += 1;
        }
        count
    }

    /// Mark the start of a new token at the cursor.
    pub fn reset_buff(&mut self) {
        self.token_start = self.offset;
        self.token_start_pos = self.position();
    }

    /// Text accumulated since the last `reset_buff`.
    pub fn current_text(&self) -> &'a str {
        &self.text[self.token_start..self.offset]
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset as u32)
    }

    /// Position of the first byte of the token being accumulated.
    pub fn token_start_position(&self) -> Position {
        self.token_start_pos
    }

    pub fn token_len(&self) -> u32 {
        (self.offset - self.token_start) as u32
    }

    /// Snapshot the cursor for speculative lookahead (long-bracket probes).
    pub fn clone_probe(&self) -> ReaderProbe {
        ReaderProbe {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    pub fn restore_probe(&mut self, probe: ReaderProbe) {
        self.offset = probe.offset;
        self.line = probe.line;
        self.column = probe.column;
    }
}

#[derive(Clone, Copy)]
pub struct ReaderProbe {
    offset: usize,
    line: u32,
    column: u32,
}
