//! Source positions and spans carried by every token, AST node and frame.

/// A point in the source: 1-based line and column, 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Position {
            line,
            column,
            offset,
        }
    }

    pub const ZERO: Position = Position {
        line: 1,
        column: 1,
        offset: 0,
    };
}

/// A source region. `start` is the first byte, `end` is one past the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn at(pos: Position) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    pub const ZERO: Span = Span {
        start: Position::ZERO,
        end: Position::ZERO,
    };

    /// Earliest start, latest end.
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn covers(&self, other: &Span) -> bool {
        self.start.offset <= other.start.offset && self.end.offset >= other.end.offset
    }

    /// Stable key for scope-map lookups. A span uniquely names an
    /// occurrence in the source.
    pub fn key(&self) -> (u32, u32) {
        (self.start.offset, self.end.offset)
    }
}
