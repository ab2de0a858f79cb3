//! Bounded, column-wrapping line store backing each command panel.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::rules::RuleSet;
use crate::style::CellStyle;
use crate::width::{char_width, split_lines};

/// One wrapped row of output with the style it was classified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledLine {
    pub text: String,
    pub style: CellStyle,
}

impl StyledLine {
    pub fn new(text: impl Into<String>, style: CellStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Sliding window over the most recent `rows` wrapped lines.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    rows: usize,
    cols: usize,
    lines: VecDeque<StyledLine>,
    rules: Arc<RuleSet>,
}

impl LineBuffer {
    pub fn new(rows: usize, cols: usize, rules: Arc<RuleSet>) -> Self {
        Self {
            rows,
            cols,
            lines: VecDeque::with_capacity(rows),
            rules,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Classify `raw` once, then append every `cols`-cell chunk of every line
    /// it contains. Lines break on `\n`, `\r\n` and a lone `\r`; chunks are
    /// measured in display cells, so a wide glyph is never split across rows.
    /// Returns the number of entries appended.
    pub fn push(&mut self, raw: &str) -> usize {
        if self.rows == 0 || self.cols == 0 {
            return 0;
        }

        let style = self.rules.classify(raw);
        let mut appended = 0;
        for line in split_lines(raw) {
            for chunk in chunks(line, self.cols) {
                self.append(StyledLine::new(chunk, style));
                appended += 1;
            }
        }
        appended
    }

    /// Change the bounds. Existing entries keep their wrapping; only the
    /// oldest entries beyond a reduced capacity are dropped.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        while self.lines.len() > rows {
            self.lines.pop_front();
        }
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &StyledLine> + '_ {
        self.lines.iter()
    }

    fn append(&mut self, line: StyledLine) {
        if self.lines.len() == self.rows {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

/// Cut `line` into pieces at most `cols` cells wide. A glyph wider than
/// `cols` gets a piece of its own.
fn chunks(line: &str, cols: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for (idx, ch) in line.char_indices() {
        let width = char_width(ch);
        if used + width > cols && idx > start {
            out.push(&line[start..idx]);
            start = idx;
            used = 0;
        }
        used += width;
    }
    if start < line.len() {
        out.push(&line[start..]);
    }
    out
}
