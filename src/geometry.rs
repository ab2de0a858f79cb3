/// Integer size measured in terminal character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

impl Size {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// Rectangle of cells anchored within the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub rows: u16,
    pub cols: u16,
    pub top: u16,
    pub left: u16,
}

impl Region {
    pub const fn new(rows: u16, cols: u16, top: u16, left: u16) -> Self {
        Self {
            rows,
            cols,
            top,
            left,
        }
    }

    /// Region covering a whole surface of the given size.
    pub const fn full(size: Size) -> Self {
        Self::new(size.rows, size.cols, 0, 0)
    }

    pub fn bottom(&self) -> u16 {
        self.top.saturating_add(self.rows)
    }

    pub fn right(&self) -> u16 {
        self.left.saturating_add(self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.rows, self.cols)
    }

    /// Drop `n` rows from the top of the region.
    pub fn shrink_top(&self, n: u16) -> Self {
        let n = n.min(self.rows);
        Self::new(self.rows - n, self.cols, self.top.saturating_add(n), self.left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_top_never_underflows() {
        let region = Region::new(1, 10, 4, 2);
        let shrunk = region.shrink_top(3);
        assert_eq!(shrunk, Region::new(0, 10, 5, 2));
        assert!(shrunk.is_empty());
    }

    #[test]
    fn edges() {
        let region = Region::new(3, 7, 2, 5);
        assert_eq!(region.bottom(), 5);
        assert_eq!(region.right(), 12);
    }
}
