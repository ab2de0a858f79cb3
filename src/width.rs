//! Terminal display width helpers.
//!
//! Process output arrives with colour escapes, tabs and carriage returns that
//! would throw off column arithmetic, so everything headed for a panel goes
//! through [`sanitize_line`] first. Column arithmetic uses display cells, not
//! `char`s: East Asian wide glyphs take two cells, combining marks none.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TAB_STOP: usize = 8;

/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);
    UnicodeWidthStr::width(&*clean_str)
}

/// Cells taken by one glyph; control characters count as zero.
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Split on every line boundary a text-mode reader recognises: `\n`, `\r\n`,
/// a lone `\r`, and the vertical-tab, form-feed, separator and Unicode line
/// and paragraph separators. Terminators are not kept.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if !is_line_break(ch) {
            continue;
        }
        lines.push(&text[start..idx]);
        let mut end = idx + ch.len_utf8();
        if ch == '\r' {
            if let Some((next, '\n')) = chars.peek().copied() {
                chars.next();
                end = next + 1;
            }
        }
        start = end;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}'
            | '\u{2028}' | '\u{2029}'
    )
}

/// Strip escapes, expand tabs, drop control characters and trailing whitespace.
pub fn sanitize_line(raw: &str) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    let text = String::from_utf8_lossy(&stripped);

    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let pad = TAB_STOP - (column % TAB_STOP);
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' => {
                out.push('\n');
                column = 0;
            }
            c if c.is_control() => {}
            c => {
                out.push(c);
                column += char_width(c);
            }
        }
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

/// Longest prefix of `text` that fits in `width` cells, and its width.
pub fn truncate_to_width(text: &str, width: usize) -> (&str, usize) {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let w = char_width(ch);
        if used + w > width {
            return (&text[..idx], used);
        }
        used += w;
    }
    (text, used)
}

/// Centre `text` within `width` cells, truncating when it does not fit.
pub fn center(text: &str, width: usize) -> String {
    let len = display_width(text);
    if len >= width {
        return truncate_to_width(text, width).0.to_string();
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    let mut out = String::with_capacity(text.len() + width - len);
    out.extend(std::iter::repeat_n(' ', left));
    out.push_str(text);
    out.extend(std::iter::repeat_n(' ', right));
    out
}
