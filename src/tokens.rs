//! Placeholder encoding for expression parsing.
//!
//! Keyword splitting (`or`, `and`, `not`) must never fire inside a quoted
//! string or inside a nested group. Before any splitting, quoted literals
//! and balanced spans are replaced with opaque placeholder tokens and
//! recorded in a side table; the rewritten text then contains no quote,
//! bracket, or keyword characters that could misfire. Tokens decode back to
//! the original text when building diagnostics.
//!
//! A token is `STX index ETX` (`\u{2}`/`\u{3}` never appear in a SCIM
//! expression, and the digits between them sit against non-word sentinels,
//! so word-boundary keyword matching stays inert).

use crate::issues::{IssueCode, Issues, Location};

pub(crate) const TOKEN_START: char = '\u{2}';
pub(crate) const TOKEN_END: char = '\u{3}';

/// What a placeholder token stands for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// A `"`-delimited string literal. `content` is the unescaped text;
    /// `closed` is false when the closing quote was missing.
    Literal { content: String, closed: bool },
    /// A parenthesized group; `interior` is the encoded span between the
    /// parentheses, parsed lazily by the caller.
    Group { interior: String },
    /// An `attr[...]` complex-attribute span. `attr` is the attribute-name
    /// prefix, `interior` the encoded span between the brackets.
    Complex { attr: String, interior: String },
    /// A structurally defective span (bracket imbalance or nesting).
    /// Carried as a placeholder so sibling operands still parse; resolving
    /// it reports `code` at the operand position the span lands in.
    Invalid { code: IssueCode },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TokenEntry {
    /// Original (still-encoded) text of the replaced span, for decoding.
    pub raw: String,
    pub kind: TokenKind,
}

/// Side table mapping placeholder tokens back to what they replaced.
#[derive(Debug, Default)]
pub(crate) struct TokenTable {
    entries: Vec<TokenEntry>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry and return its placeholder token.
    pub fn intern(&mut self, entry: TokenEntry) -> String {
        let index = self.entries.len();
        self.entries.push(entry);
        format!("{TOKEN_START}{index}{TOKEN_END}")
    }

    /// Resolve `text` if it is exactly one placeholder token.
    pub fn resolve_single(&self, text: &str) -> Option<&TokenEntry> {
        let (index, len) = parse_token(text)?;
        if len == text.len() {
            self.entries.get(index)
        } else {
            None
        }
    }

    /// Expand every placeholder in `text` back to the original source,
    /// recursively, for human-readable diagnostics.
    pub fn decode(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find(TOKEN_START) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            match parse_token(rest) {
                Some((index, len)) => {
                    match self.entries.get(index) {
                        Some(entry) => out.push_str(&self.decode(&entry.raw)),
                        None => out.push_str(&rest[..len]),
                    }
                    rest = &rest[len..];
                }
                None => {
                    out.push(TOKEN_START);
                    rest = &rest[TOKEN_START.len_utf8()..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Parse a leading `STX digits ETX` token; returns (index, byte length).
fn parse_token(text: &str) -> Option<(usize, usize)> {
    let rest = text.strip_prefix(TOKEN_START)?;
    let end = rest.find(TOKEN_END)?;
    let index: usize = rest[..end].parse().ok()?;
    Some((index, TOKEN_START.len_utf8() + end + TOKEN_END.len_utf8()))
}

/// Replace every `"`-delimited run with a placeholder token.
///
/// Backslash escapes (`\"` `\\` `\n` `\t` `\r`) are unescaped into the
/// recorded content; an unterminated literal runs to end of input and is
/// recorded with `closed: false` so the value parser can report it.
pub(crate) fn encode_strings(expr: &str, table: &mut TokenTable) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }

        let mut raw = String::from('"');
        let mut content = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            raw.push(c);
            match c {
                '"' => {
                    closed = true;
                    break;
                }
                '\\' => match chars.next() {
                    Some(esc) => {
                        raw.push(esc);
                        match esc {
                            '"' => content.push('"'),
                            '\\' => content.push('\\'),
                            'n' => content.push('\n'),
                            't' => content.push('\t'),
                            'r' => content.push('\r'),
                            other => {
                                content.push('\\');
                                content.push(other);
                            }
                        }
                    }
                    None => content.push('\\'),
                },
                other => content.push(other),
            }
        }

        out.push_str(&table.intern(TokenEntry {
            raw,
            kind: TokenKind::Literal { content, closed },
        }));
    }

    out
}

/// Where a balanced span sits in the encoded text (byte offsets of the
/// opening and closing delimiter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub open: usize,
    pub close: usize,
}

/// Outcome of scanning for the first balanced `(...)` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParenScan {
    /// No parenthesis in the text.
    None,
    /// The first fully balanced span.
    Found(Span),
    /// A `(` with no matching `)`; the defective region runs from the
    /// opener to the end of the text.
    UnmatchedOpen(usize),
    /// A `)` with no opener; the defective region is everything up to and
    /// including it.
    UnmatchedClose(usize),
}

/// Find the first fully balanced `(...)` span.
pub(crate) fn find_paren_group(expr: &str) -> ParenScan {
    let mut depth = 0usize;
    let mut open = None;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            ')' => match depth {
                0 => return ParenScan::UnmatchedClose(i),
                1 => {
                    return ParenScan::Found(Span {
                        open: open.unwrap_or(0),
                        close: i,
                    });
                }
                _ => depth -= 1,
            },
            _ => {}
        }
    }
    match open {
        Some(open) if depth > 0 => ParenScan::UnmatchedOpen(open),
        _ => ParenScan::None,
    }
}

/// Outcome of scanning for the first `attr[...]` complex-attribute span.
///
/// Defective outcomes name the region the caller should swallow into an
/// [`TokenKind::Invalid`] placeholder, so sibling operands still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BracketScan {
    /// No square bracket in the text.
    None,
    /// A balanced span; `attr_start` is where the attribute-name prefix
    /// begins (so `attr_start..=span.close` covers the whole `attr[...]`).
    Found { attr_start: usize, span: Span },
    /// `[` with no matching `]`; the defective region runs from
    /// `attr_start` to the end of the text.
    UnmatchedOpen { attr_start: usize },
    /// `]` with no `[` before it; the defective region is everything up
    /// to and including `close`.
    UnmatchedClose { close: usize },
    /// A nested `[` inside the span, or a bracket group attached directly
    /// to a placeholder (a second bracket on the same expression);
    /// `start..=end` covers the defective region.
    Inner { start: usize, end: usize },
}

/// Scan for the first complex-attribute span in string-encoded text.
///
/// SCIM forbids nesting complex-attribute groups; a nested `[` is still
/// walked to its matching `]` so the whole defective region is one span.
pub(crate) fn find_complex_span(expr: &str) -> BracketScan {
    let Some(open) = expr.find('[') else {
        return match expr.find(']') {
            Some(close) => BracketScan::UnmatchedClose { close },
            None => BracketScan::None,
        };
    };
    // A `]` before the first `[` can never be balanced.
    if let Some(close) = expr[..open].find(']') {
        return BracketScan::UnmatchedClose { close };
    }

    // Back up over the attribute-name prefix.
    let attr_start = expr[..open]
        .rfind(|c: char| !is_attr_char(c))
        .map(|i| i + expr[..open][i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);

    // Walk to the matching close, noting nested opens.
    let mut depth = 0usize;
    let mut close = None;
    let mut nested = false;
    for (i, c) in expr[open..].char_indices() {
        match c {
            '[' => {
                depth += 1;
                if depth > 1 {
                    nested = true;
                }
            }
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return BracketScan::UnmatchedOpen { attr_start };
    };

    if nested {
        return BracketScan::Inner {
            start: attr_start,
            end: close,
        };
    }
    // `tok[...]` means a bracket group chained onto an already-encoded
    // span, e.g. `emails[a eq 1][b eq 2]`.
    if expr[..attr_start].ends_with(TOKEN_END) {
        let start = expr[..attr_start].rfind(TOKEN_START).unwrap_or(attr_start);
        return BracketScan::Inner { start, end: close };
    }

    BracketScan::Found {
        attr_start,
        span: Span { open, close },
    }
}

fn is_attr_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | ':' | '-')
}

/// Whether raw input contains the reserved placeholder sentinels. Such
/// input must be rejected before encoding, or a forged `STX digits ETX`
/// sequence could alias a real table entry.
pub(crate) fn contains_reserved(text: &str) -> bool {
    text.contains([TOKEN_START, TOKEN_END])
}

/// Convenience for error reporting: decoded text of a span's context.
pub(crate) fn decoded_context(table: &TokenTable, text: &str) -> String {
    table.decode(text).trim().to_string()
}

/// Shared helper: record an error with decoded context.
pub(crate) fn report(
    issues: &mut Issues,
    code: IssueCode,
    location: &Location,
    table: &TokenTable,
    text: &str,
) {
    issues.add_error(code, location.clone(), decoded_context(table, text));
}

// =============================================================================
// Tests
// =============================================================================
