//! Style descriptors and their resolution to terminal attributes.
//!
//! A [`StyleSpec`] is what configuration produces: every field optional so
//! that panels, commands and rules can layer overrides on top of their
//! ancestors. [`StyleSpec::resolve`] collapses a spec into the [`CellStyle`]
//! stored on every surface cell.

mod color;

pub use color::{StyleError, parse_color};

use crossterm::style::{Attribute, Attributes, Color};

/// Declarative, partially specified style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleSpec {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub blink: Option<bool>,
    pub bold: Option<bool>,
    pub dim: Option<bool>,
    pub reverse: Option<bool>,
    pub standout: Option<bool>,
    pub underline: Option<bool>,
}

impl StyleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn with_underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    /// Layer `over` on top of `self`; fields set in `over` win.
    pub fn merge(&self, over: &StyleSpec) -> StyleSpec {
        StyleSpec {
            fg: over.fg.or(self.fg),
            bg: over.bg.or(self.bg),
            blink: over.blink.or(self.blink),
            bold: over.bold.or(self.bold),
            dim: over.dim.or(self.dim),
            reverse: over.reverse.or(self.reverse),
            standout: over.standout.or(self.standout),
            underline: over.underline.or(self.underline),
        }
    }

    pub fn resolve(&self) -> CellStyle {
        let mut attrs = Attributes::default();
        let flags = [
            (self.blink, Attribute::SlowBlink),
            (self.bold, Attribute::Bold),
            (self.dim, Attribute::Dim),
            (self.reverse, Attribute::Reverse),
            (self.underline, Attribute::Underlined),
        ];
        for (flag, attribute) in flags {
            if flag.unwrap_or(false) {
                attrs.set(attribute);
            }
        }
        // Terminals without a dedicated standout mode render it as bold reverse.
        if self.standout.unwrap_or(false) {
            attrs.set(Attribute::Reverse);
            attrs.set(Attribute::Bold);
        }

        CellStyle {
            fg: self.fg,
            bg: self.bg,
            attrs,
        }
    }
}

/// Fully resolved style carried by every drawn cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attributes,
}

impl CellStyle {
    pub fn has(&self, attribute: Attribute) -> bool {
        self.attrs.has(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_override_fields() {
        let base = StyleSpec::new().with_fg(Color::Red).with_bold(true);
        let over = StyleSpec::new().with_fg(Color::Blue).with_underline(true);
        let merged = base.merge(&over);

        assert_eq!(merged.fg, Some(Color::Blue));
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.underline, Some(true));
        assert_eq!(merged.bg, None);
    }

    #[test]
    fn explicit_false_overrides_inherited_true() {
        let base = StyleSpec::new().with_bold(true);
        let over = StyleSpec::new().with_bold(false);
        assert!(!base.merge(&over).resolve().has(Attribute::Bold));
    }

    #[test]
    fn resolve_sets_attributes() {
        let spec = StyleSpec {
            underline: Some(true),
            standout: Some(true),
            ..StyleSpec::default()
        };
        let style = spec.resolve();
        assert!(style.has(Attribute::Underlined));
        assert!(style.has(Attribute::Reverse));
        assert!(style.has(Attribute::Bold));
        assert!(!style.has(Attribute::Dim));
    }

    #[test]
    fn empty_spec_resolves_to_default() {
        assert_eq!(StyleSpec::new().resolve(), CellStyle::default());
    }
}
