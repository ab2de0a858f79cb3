use crate::render::Surface;
use crate::style::CellStyle;

const UP: u8 = 0b0001;
const RIGHT: u8 = 0b0010;
const DOWN: u8 = 0b0100;
const LEFT: u8 = 0b1000;
const VERTICAL: u8 = UP | DOWN;
const HORIZONTAL: u8 = LEFT | RIGHT;

/// Box-drawing glyph for every combination of strokes, indexed by mask.
const GLYPHS: [char; 16] = [
    ' ', '╵', '╶', '└', '╷', '│', '┌', '├', '╴', '┘', '─', '┴', '┐', '┤', '┬', '┼',
];

fn strokes(ch: char) -> u8 {
    GLYPHS
        .iter()
        .position(|glyph| *glyph == ch && ch != ' ')
        .map(|mask| mask as u8)
        .unwrap_or(0)
}

fn glyph(mask: u8) -> char {
    GLYPHS[(mask & 0b1111) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight separator run starting at `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separator {
    pub orientation: Orientation,
    pub row: u16,
    pub col: u16,
    pub len: u16,
}

impl Separator {
    pub fn horizontal(row: u16, col: u16, len: u16) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            row,
            col,
            len,
        }
    }

    pub fn vertical(row: u16, col: u16, len: u16) -> Self {
        Self {
            orientation: Orientation::Vertical,
            row,
            col,
            len,
        }
    }

    /// Draw the run, joining perpendicular separators already on the surface
    /// into tees and crosses.
    pub fn paint(&self, surface: &mut Surface, style: CellStyle) {
        match self.orientation {
            Orientation::Horizontal => self.paint_horizontal(surface, style),
            Orientation::Vertical => self.paint_vertical(surface, style),
        }
    }

    fn paint_horizontal(&self, surface: &mut Surface, style: CellStyle) {
        let (row, mut col, mut len) = (self.row, self.col, self.len);
        if col > 0 && bears(surface, row, col - 1, VERTICAL) {
            col -= 1;
            len = len.saturating_add(1);
        }

        for i in 0..len {
            let Some(at) = col.checked_add(i) else { break };
            let existing = surface.glyph_at(row, at).map(strokes).unwrap_or(0);
            let ch = if existing & VERTICAL == VERTICAL {
                glyph(existing | run_strokes(i, len, RIGHT, LEFT))
            } else {
                glyph(HORIZONTAL)
            };
            surface.put_glyph(row, at, ch, style);
        }
    }

    fn paint_vertical(&self, surface: &mut Surface, style: CellStyle) {
        let (mut row, col, mut len) = (self.row, self.col, self.len);
        if row > 0 && bears(surface, row - 1, col, HORIZONTAL) {
            row -= 1;
            len = len.saturating_add(1);
        }

        for i in 0..len {
            let Some(at) = row.checked_add(i) else { break };
            let existing = surface.glyph_at(at, col).map(strokes).unwrap_or(0);
            let ch = if existing & HORIZONTAL == HORIZONTAL {
                glyph(existing | run_strokes(i, len, DOWN, UP))
            } else {
                glyph(VERTICAL)
            };
            surface.put_glyph(at, col, ch, style);
        }
    }
}

fn bears(surface: &Surface, row: u16, col: u16, stroke: u8) -> bool {
    surface
        .glyph_at(row, col)
        .is_some_and(|ch| strokes(ch) & stroke == stroke)
}

/// Strokes a run contributes at position `i`: only forward at the start, only
/// backward at the end, both in between.
fn run_strokes(i: u16, len: u16, forward: u8, backward: u8) -> u8 {
    if i == 0 {
        forward
    } else if i + 1 == len {
        backward
    } else {
        forward | backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn surface(rows: u16, cols: u16) -> Surface {
        Surface::headless(Size::new(rows, cols))
    }

    #[test]
    fn glyph_table_round_trips() {
        for mask in 1..16u8 {
            assert_eq!(strokes(glyph(mask)), mask);
        }
        assert_eq!(strokes(' '), 0);
        assert_eq!(strokes('x'), 0);
    }

    #[test]
    fn plain_runs() {
        let mut s = surface(3, 5);
        Separator::horizontal(1, 0, 5).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(1), "─────");

        let mut s = surface(3, 3);
        Separator::vertical(0, 1, 3).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(0), " │ ");
        assert_eq!(s.row_text(2), " │ ");
    }

    #[test]
    fn horizontal_run_right_of_vertical_forms_tee() {
        let mut s = surface(5, 6);
        Separator::vertical(0, 2, 5).paint(&mut s, CellStyle::default());
        Separator::horizontal(2, 3, 3).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(2), "  ├───");
        assert_eq!(s.glyph_at(1, 2), Some('│'));
    }

    #[test]
    fn vertical_run_below_horizontal_forms_tee() {
        let mut s = surface(4, 5);
        Separator::horizontal(1, 0, 5).paint(&mut s, CellStyle::default());
        Separator::vertical(2, 2, 2).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(1), "──┬──");
        assert_eq!(s.glyph_at(3, 2), Some('│'));
    }

    #[test]
    fn crossing_runs_form_cross_and_end_tees() {
        let mut s = surface(5, 5);
        Separator::vertical(0, 2, 5).paint(&mut s, CellStyle::default());
        Separator::horizontal(2, 0, 5).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(2), "──┼──");

        let mut s = surface(3, 3);
        Separator::vertical(0, 0, 3).paint(&mut s, CellStyle::default());
        Separator::vertical(0, 2, 3).paint(&mut s, CellStyle::default());
        Separator::horizontal(1, 0, 3).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(1), "├─┤");
    }

    #[test]
    fn repainting_is_idempotent() {
        let mut s = surface(6, 8);
        let runs = [
            Separator::vertical(0, 3, 6),
            Separator::horizontal(3, 4, 4),
            Separator::vertical(4, 6, 2),
        ];
        for run in &runs {
            run.paint(&mut s, CellStyle::default());
        }
        let first: Vec<String> = (0..6).map(|row| s.row_text(row)).collect();
        for run in &runs {
            run.paint(&mut s, CellStyle::default());
        }
        let second: Vec<String> = (0..6).map(|row| s.row_text(row)).collect();
        assert_eq!(first, second);
        assert_eq!(first[3], "   ├──┬─");
    }

    #[test]
    fn runs_are_clipped_to_the_surface() {
        let mut s = surface(2, 3);
        Separator::horizontal(1, 1, 10).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(1), " ──");
        Separator::vertical(5, 0, 2).paint(&mut s, CellStyle::default());
        assert_eq!(s.row_text(0), "   ");
    }
}
