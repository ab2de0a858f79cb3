use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use blake3::Hash;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, SetAttribute, SetAttributes, SetBackgroundColor, SetForegroundColor,
};

use crate::error::{MuxError, Result};
use crate::geometry::{Region, Size};
use crate::style::CellStyle;
use crate::width::char_width;

/// Placeholder stored in the cell covered by the right half of a wide glyph.
const WIDE_TAIL: char = '\0';

/// One drawn cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: CellStyle::default(),
        }
    }
}

/// In-memory terminal grid with read-back and batched output.
pub struct Surface {
    size: Size,
    cells: Vec<Cell>,
    flushed: Vec<Option<Hash>>,
    dirty: bool,
    writer: Box<dyn Write + Send>,
}

impl Surface {
    pub fn new(size: Size, writer: Box<dyn Write + Send>) -> Self {
        let area = size.rows as usize * size.cols as usize;
        Self {
            size,
            cells: vec![Cell::default(); area],
            flushed: vec![None; size.rows as usize],
            dirty: true,
            writer,
        }
    }

    /// Surface writing to a sink that discards everything.
    pub fn headless(size: Size) -> Self {
        Self::new(size, Box::new(io::sink()))
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Reallocate for a new terminal size. Everything is blank afterwards and
    /// the next flush repaints every row.
    pub fn resize(&mut self, size: Size) {
        self.size = size;
        self.cells = vec![Cell::default(); size.rows as usize * size.cols as usize];
        self.flushed = vec![None; size.rows as usize];
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.dirty = true;
    }

    /// Blank every cell of `region` using `style` as the background.
    pub fn fill(&mut self, region: Region, style: CellStyle) {
        let blank = Cell { ch: ' ', style };
        for row in region.top..region.bottom().min(self.size.rows) {
            for col in region.left..region.right().min(self.size.cols) {
                self.overwrite(row, col, blank);
            }
        }
        self.dirty = true;
    }

    /// Write `text` starting at `(row, col)`, clipped at the right edge.
    /// Returns the number of cells written.
    pub fn put_str(&mut self, row: u16, col: u16, text: &str, style: CellStyle) -> usize {
        self.put_clipped(row, col, usize::MAX, text, style)
    }

    /// Like [`Surface::put_str`] but fills at most `max_cols` cells. A wide
    /// glyph that would straddle the limit is not drawn; zero-width
    /// characters are dropped.
    pub fn put_clipped(
        &mut self,
        row: u16,
        col: u16,
        max_cols: usize,
        text: &str,
        style: CellStyle,
    ) -> usize {
        let mut used = 0usize;
        for ch in text.chars() {
            let width = char_width(ch);
            if width == 0 {
                continue;
            }
            if used + width > max_cols {
                break;
            }
            let Some(at) = u16::try_from(used).ok().and_then(|n| col.checked_add(n)) else {
                break;
            };
            if !self.put_glyph(row, at, ch, style) {
                break;
            }
            used += width;
        }
        used
    }

    /// Draw one glyph. Wide glyphs also claim the next cell and are refused
    /// when that cell is off the grid.
    pub fn put_glyph(&mut self, row: u16, col: u16, ch: char, style: CellStyle) -> bool {
        let wide = char_width(ch) > 1;
        if self.index(row, col).is_none() {
            return false;
        }
        if wide && self.index(row, col.saturating_add(1)).is_none() {
            return false;
        }
        self.overwrite(row, col, Cell { ch, style });
        if wide {
            self.overwrite(row, col + 1, Cell { ch: WIDE_TAIL, style });
        }
        self.dirty = true;
        true
    }

    /// Glyph currently drawn at `(row, col)`, `None` outside the grid.
    pub fn glyph_at(&self, row: u16, col: u16) -> Option<char> {
        self.cell(row, col).map(|cell| cell.ch)
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.index(row, col).map(|idx| &self.cells[idx])
    }

    /// Text of one row, mostly useful for assertions. The second half of a
    /// wide glyph contributes nothing.
    pub fn row_text(&self, row: u16) -> String {
        (0..self.size.cols)
            .filter_map(|col| self.glyph_at(row, col))
            .filter(|ch| *ch != WIDE_TAIL)
            .collect()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Emit every row whose content changed since the last flush.
    pub fn flush(&mut self) -> Result<usize> {
        if !self.dirty {
            return Ok(0);
        }

        let mut emitted = 0;
        for row in 0..self.size.rows {
            let hash = self.row_hash(row);
            if self.flushed[row as usize] == Some(hash) {
                continue;
            }
            self.write_row(row)?;
            self.flushed[row as usize] = Some(hash);
            emitted += 1;
        }

        queue!(self.writer, SetAttribute(Attribute::Reset))?;
        self.writer.flush()?;
        self.dirty = false;
        Ok(emitted)
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        if row < self.size.rows && col < self.size.cols {
            Some(row as usize * self.size.cols as usize + col as usize)
        } else {
            None
        }
    }

    /// Replace one cell, blanking the other half of any wide glyph the write
    /// cuts through so every row keeps exactly `cols` display cells.
    fn overwrite(&mut self, row: u16, col: u16, cell: Cell) {
        let Some(idx) = self.index(row, col) else {
            return;
        };
        let current = self.cells[idx];
        if current.ch == WIDE_TAIL && col > 0 {
            let head = idx - 1;
            self.cells[head].ch = ' ';
        } else if char_width(current.ch) > 1 {
            if let Some(tail) = self.index(row, col.saturating_add(1)) {
                if self.cells[tail].ch == WIDE_TAIL {
                    self.cells[tail].ch = ' ';
                }
            }
        }
        self.cells[idx] = cell;
    }

    fn row_slice(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.size.cols as usize;
        &self.cells[start..start + self.size.cols as usize]
    }

    fn row_hash(&self, row: u16) -> Hash {
        let mut hasher = blake3::Hasher::new();
        let mut current: Option<CellStyle> = None;
        let mut utf8 = [0u8; 4];
        for cell in self.row_slice(row) {
            if current != Some(cell.style) {
                hasher.update(format!("\0{:?}\0", cell.style).as_bytes());
                current = Some(cell.style);
            }
            hasher.update(cell.ch.encode_utf8(&mut utf8).as_bytes());
        }
        hasher.finalize()
    }

    fn write_row(&mut self, row: u16) -> Result<()> {
        let cols = self.size.cols as usize;
        let start = row as usize * cols;
        queue!(self.writer, MoveTo(0, row))?;

        let mut run = String::with_capacity(cols);
        let mut run_style: Option<CellStyle> = None;
        for idx in start..start + cols {
            let cell = self.cells[idx];
            if cell.ch == WIDE_TAIL {
                continue;
            }
            if run_style != Some(cell.style) {
                if let Some(style) = run_style {
                    write_run(&mut self.writer, &run, style)?;
                    run.clear();
                }
                run_style = Some(cell.style);
            }
            run.push(cell.ch);
        }
        if let Some(style) = run_style {
            write_run(&mut self.writer, &run, style)?;
        }
        Ok(())
    }
}

fn write_run(writer: &mut impl Write, text: &str, style: CellStyle) -> Result<()> {
    queue!(
        writer,
        SetAttribute(Attribute::Reset),
        SetForegroundColor(style.fg.unwrap_or(Color::Reset)),
        SetBackgroundColor(style.bg.unwrap_or(Color::Reset)),
        SetAttributes(style.attrs),
        Print(text)
    )?;
    Ok(())
}

/// The single lock-guarded handle to the terminal surface.
#[derive(Clone)]
pub struct SharedSurface {
    inner: Arc<Mutex<Surface>>,
}

impl SharedSurface {
    pub fn new(surface: Surface) -> Self {
        Self {
            inner: Arc::new(Mutex::new(surface)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Surface>> {
        self.inner
            .lock()
            .map_err(|_| MuxError::LockPoisoned("surface"))
    }

    /// Run `f` with exclusive access to the surface.
    pub fn with<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> Result<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }
}

/// Cloneable in-memory writer for headless runs and assertions.
#[derive(Clone, Default)]
pub struct MemorySink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.bytes
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .bytes
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_str_clips_at_right_edge() {
        let mut surface = Surface::headless(Size::new(2, 5));
        let written = surface.put_str(1, 3, "hello", CellStyle::default());
        assert_eq!(written, 2);
        assert_eq!(surface.row_text(1), "   he");
        assert_eq!(surface.glyph_at(2, 0), None);
    }

    #[test]
    fn put_clipped_respects_limit() {
        let mut surface = Surface::headless(Size::new(1, 8));
        assert_eq!(surface.put_clipped(0, 1, 3, "abcdef", CellStyle::default()), 3);
        assert_eq!(surface.row_text(0), " abc    ");
    }

    #[test]
    fn fill_is_clipped_to_region() {
        let mut surface = Surface::headless(Size::new(3, 4));
        surface.put_str(0, 0, "abcd", CellStyle::default());
        surface.put_str(1, 0, "efgh", CellStyle::default());
        surface.fill(Region::new(5, 2, 1, 1), CellStyle::default());
        assert_eq!(surface.row_text(0), "abcd");
        assert_eq!(surface.row_text(1), "e  h");
    }

    #[test]
    fn flush_writes_positioned_rows() {
        let sink = MemorySink::new();
        let mut surface = Surface::new(Size::new(3, 4), Box::new(sink.clone()));
        surface.put_str(1, 0, "hi", CellStyle::default());
        assert_eq!(surface.flush().unwrap(), 3);

        let rendered = sink.contents();
        assert!(rendered.contains("\u{1b}[2;1H"));
        assert!(rendered.contains("hi  "));
    }

    #[test]
    fn flush_skips_unchanged_rows() {
        let sink = MemorySink::new();
        let mut surface = Surface::new(Size::new(3, 4), Box::new(sink.clone()));
        surface.flush().unwrap();

        surface.put_str(2, 0, "x", CellStyle::default());
        assert_eq!(surface.flush().unwrap(), 1);

        surface.put_str(2, 0, "x", CellStyle::default());
        assert_eq!(surface.flush().unwrap(), 0);
    }

    #[test]
    fn wide_glyphs_are_clipped_by_display_cells() {
        let sink = MemorySink::new();
        let mut surface = Surface::new(Size::new(1, 9), Box::new(sink.clone()));
        surface.put_glyph(0, 4, '│', CellStyle::default());

        let used = surface.put_clipped(0, 0, 4, "日本語字", CellStyle::default());
        assert_eq!(used, 4);
        assert_eq!(surface.row_text(0), "日本│    ");
        assert_eq!(crate::width::display_width(&surface.row_text(0)), 9);
        assert_eq!(surface.glyph_at(0, 4), Some('│'));

        surface.flush().unwrap();
        let rendered = sink.contents();
        assert!(rendered.contains("日本│    "));
        assert!(!rendered.contains('\0'));
    }

    #[test]
    fn wide_glyph_never_straddles_a_limit_or_the_edge() {
        let mut surface = Surface::headless(Size::new(1, 3));
        assert_eq!(surface.put_clipped(0, 0, 3, "日本", CellStyle::default()), 2);
        assert_eq!(surface.row_text(0), "日 ");

        let mut edge = Surface::headless(Size::new(1, 3));
        assert_eq!(edge.put_str(0, 0, "ab日", CellStyle::default()), 2);
        assert_eq!(edge.row_text(0), "ab ");
    }

    #[test]
    fn overwriting_half_a_wide_glyph_blanks_the_other_half() {
        let mut surface = Surface::headless(Size::new(2, 4));
        surface.put_str(0, 0, "日本", CellStyle::default());
        surface.put_glyph(0, 1, 'x', CellStyle::default());
        assert_eq!(surface.row_text(0), " x本");

        surface.put_str(1, 0, "日本", CellStyle::default());
        surface.fill(Region::new(1, 1, 1, 2), CellStyle::default());
        assert_eq!(surface.row_text(1), "日  ");
        assert_eq!(crate::width::display_width(&surface.row_text(1)), 4);
    }

    #[test]
    fn resize_blanks_the_grid() {
        let mut surface = Surface::headless(Size::new(2, 2));
        surface.put_str(0, 0, "ab", CellStyle::default());
        surface.resize(Size::new(3, 3));
        assert_eq!(surface.size(), Size::new(3, 3));
        assert_eq!(surface.row_text(0), "   ");
    }
}
