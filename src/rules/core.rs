use std::hash::{Hash, Hasher};

use regex::bytes::{Regex, RegexBuilder};
use thiserror::Error;

use crate::style::CellStyle;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile-time switches for regex rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexFlags {
    /// Restrict `\w`, `\d`, `\s` and case folding to ASCII.
    pub ascii: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// Whitespace and `#` comments in the pattern are ignored.
    pub verbose: bool,
    /// Accepted for configuration compatibility; has no effect.
    pub locale: bool,
}

/// A single literal or regex matcher.
///
/// Equality and hashing only consider the configuration (pattern and flags),
/// never the compiled program.
#[derive(Debug, Clone)]
pub enum Rule {
    Literal {
        pattern: String,
        ignore_case: bool,
        folded: String,
    },
    Regex {
        pattern: String,
        flags: RegexFlags,
        compiled: Regex,
    },
}

impl Rule {
    pub fn literal(pattern: impl Into<String>, ignore_case: bool) -> Self {
        let pattern = pattern.into();
        let folded = if ignore_case {
            pattern.to_lowercase()
        } else {
            String::new()
        };
        Rule::Literal {
            pattern,
            ignore_case,
            folded,
        }
    }

    pub fn regex(pattern: impl Into<String>, flags: RegexFlags) -> Result<Self, RuleError> {
        let pattern = pattern.into();
        let compiled = RegexBuilder::new(&pattern)
            .unicode(!flags.ascii)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multiline)
            .dot_matches_new_line(flags.dot_all)
            .ignore_whitespace(flags.verbose)
            .build()
            .map_err(|source| RuleError::InvalidRegex {
                pattern: pattern.clone(),
                source,
            })?;
        Ok(Rule::Regex {
            pattern,
            flags,
            compiled,
        })
    }

    /// Substring semantics: the rule only has to match somewhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Rule::Literal {
                pattern,
                ignore_case: false,
                ..
            } => text.contains(pattern.as_str()),
            Rule::Literal {
                ignore_case: true,
                folded,
                ..
            } => text.to_lowercase().contains(folded.as_str()),
            Rule::Regex { compiled, .. } => compiled.is_match(text.as_bytes()),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Rule::Literal {
                    pattern: a,
                    ignore_case: ai,
                    ..
                },
                Rule::Literal {
                    pattern: b,
                    ignore_case: bi,
                    ..
                },
            ) => a == b && ai == bi,
            (
                Rule::Regex {
                    pattern: a,
                    flags: af,
                    ..
                },
                Rule::Regex {
                    pattern: b,
                    flags: bf,
                    ..
                },
            ) => a == b && af == bf,
            _ => false,
        }
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Rule::Literal {
                pattern,
                ignore_case,
                ..
            } => {
                0u8.hash(state);
                pattern.hash(state);
                ignore_case.hash(state);
            }
            Rule::Regex { pattern, flags, .. } => {
                1u8.hash(state);
                pattern.hash(state);
                flags.hash(state);
            }
        }
    }
}

/// Ordered rule list with the style to apply when nothing matches.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: Vec<(Rule, CellStyle)>,
    default_style: CellStyle,
}

impl RuleSet {
    pub fn new(default_style: CellStyle) -> Self {
        Self {
            entries: Vec::new(),
            default_style,
        }
    }

    /// Append a rule. A rule equal to one already present replaces that
    /// entry's style but keeps its original position.
    pub fn push(&mut self, rule: Rule, style: CellStyle) {
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == rule) {
            entry.1 = style;
            return;
        }
        self.entries.push((rule, style));
    }

    pub fn with_rule(mut self, rule: Rule, style: CellStyle) -> Self {
        self.push(rule, style);
        self
    }

    pub fn default_style(&self) -> CellStyle {
        self.default_style
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Style of the first matching rule in declaration order.
    pub fn classify(&self, text: &str) -> CellStyle {
        self.entries
            .iter()
            .find(|(rule, _)| rule.matches(text))
            .map(|(_, style)| *style)
            .unwrap_or(self.default_style)
    }
}
