//! Shared error report renderer: header, location, message, source snippet
//! with a caret, stack traceback and a suggestion for recognized kinds.
//! ANSI colors are emitted only when the caller asks for them.

use crate::vm::error::{ErrorKind, LuaError, ParseErrorKind};

const RESET: &str = "\x1b[0m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const YELLOW: &str = "\x1b[33m";

struct Palette {
    header: &'static str,
    location: &'static str,
    gutter: &'static str,
    caret: &'static str,
    reset: &'static str,
}

const COLORED: Palette = Palette {
    header: BOLD_RED,
    location: BOLD,
    gutter: DIM,
    caret: YELLOW,
    reset: RESET,
};

const PLAIN: Palette = Palette {
    header: "",
    location: "",
    gutter: "",
    caret: "",
    reset: "",
};

/// Render the full report. `source_text` enables the two-line context
/// snippet; without it only header, message and traceback appear.
pub fn render(error: &LuaError, source_text: Option<&str>, color: bool) -> String {
    let p = if color { COLORED } else { PLAIN };
    let mut out = String::new();

    out.push_str(&format!(
        "{}{}{}: {}{}:{}:{} {}\n",
        p.header,
        error.header(),
        p.reset,
        p.location,
        error.source,
        error.position.line,
        p.reset,
        error.message()
    ));

    if let Some(text) = source_text {
        render_snippet(&mut out, text, error, &p);
    }

    render_traceback(&mut out, error, &p);

    if let Some(suggestion) = suggest(error) {
        out.push_str(&format!("{}hint:{} {}\n", p.caret, p.reset, suggestion));
    }

    out
}

/// Two lines of context ending at the error line, with a caret under the
/// offending column.
fn render_snippet(out: &mut String, text: &str, error: &LuaError, p: &Palette) {
    let line = error.position.line as usize;
    if line == 0 {
        return;
    }
    let lines: Vec<&str> = text.lines().collect();
    if line > lines.len() {
        return;
    }
    let first = line.saturating_sub(2).max(1);
    let width = digits(line);
    for n in first..=line {
        out.push_str(&format!(
            "{}{:>width$} |{} {}\n",
            p.gutter,
            n,
            p.reset,
            lines[n - 1],
            width = width
        ));
    }
    let column = (error.position.column.max(1) as usize) - 1;
    out.push_str(&format!(
        "{}{:>width$} |{} {}{}^{}\n",
        p.gutter,
        "",
        p.reset,
        " ".repeat(column),
        p.caret,
        p.reset,
        width = width
    ));
}

/// One frame per line, innermost first. Trace frames record call sites;
/// each site is attributed to the function enclosing it, so names shift by
/// one frame, with the outermost landing in the main chunk.
fn render_traceback(out: &mut String, error: &LuaError, p: &Palette) {
    if error.traceback.is_empty() {
        return;
    }
    out.push_str("stack traceback:\n");
    let frames = &error.traceback;
    let innermost_name = frames.last().and_then(|f| f.name.clone());
    out.push_str(&format!(
        "{}\t{}:{}:{} {}\n",
        p.gutter,
        error.source,
        error.position.line,
        p.reset,
        describe_function(innermost_name.as_deref())
    ));
    for i in (0..frames.len()).rev() {
        let frame = &frames[i];
        let enclosing = if i == 0 {
            None
        } else {
            frames[i - 1].name.clone()
        };
        out.push_str(&format!(
            "{}\t{}:{}:{} {}\n",
            p.gutter,
            frame.source,
            frame.line,
            p.reset,
            describe_function(enclosing.as_deref())
        ));
    }
}

fn describe_function(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("in function '{}'", name),
        None => "in main chunk".to_string(),
    }
}

fn digits(n: usize) -> usize {
    let mut n = n;
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// One-line advice for the kinds a reader hits most.
fn suggest(error: &LuaError) -> Option<String> {
    match &error.kind {
        ErrorKind::Parse(detail) => {
            if let ParseErrorKind::MissingKeyword(k) = &detail.kind {
                return Some(format!(
                    "insert '{}' before this point; the construct above is still open",
                    k
                ));
            }
            if detail.expected.len() <= 3 && !detail.expected.is_empty() {
                return Some(format!("expected {}", detail.expected.join(" or ")));
            }
            None
        }
        ErrorKind::Type(message) => {
            if message.contains("attempt to call a nil value") {
                Some(
                    "The value you're trying to call as a function is nil; check the \
                     spelling and that it was assigned before this call."
                        .to_string(),
                )
            } else if message.contains("attempt to index a nil value") {
                Some(
                    "The value being indexed is nil; make sure the table was created \
                     before reading fields from it."
                        .to_string(),
                )
            } else if message.contains("attempt to perform arithmetic") {
                Some(
                    "One operand is not a number; use tonumber() or check the value's \
                     origin."
                        .to_string(),
                )
            } else {
                None
            }
        }
        ErrorKind::Runtime(_) => {
            let message = error.message();
            if message.contains("divide by zero") || message.contains("modulo by zero") {
                Some("guard the divisor before dividing; zero is an error here".to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}
