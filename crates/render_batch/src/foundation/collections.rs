//! Specialized collection types

pub use slotmap::{new_key_type, SecondaryMap, SlotMap};

/// Row-major dense 2-D array.
///
/// The batcher keeps one row per physical sub-layer and one column per
/// context-local mesh index. Rows can be inserted in the middle when a
/// logical layer grows, columns are fixed once a context has been numbered.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseGrid<T> {
    cells: Vec<T>,
    rows: usize,
    columns: usize,
}

impl<T> DenseGrid<T> {
    /// Create a grid filled by calling `fill(row, column)` for every cell
    pub fn from_fn(rows: usize, columns: usize, mut fill: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(rows * columns);
        for row in 0..rows {
            for column in 0..columns {
                cells.push(fill(row, column));
            }
        }
        Self { cells, rows, columns }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Get a cell
    pub fn get(&self, row: usize, column: usize) -> Option<&T> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: usize, column: usize) -> Option<&mut T> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get_mut(row * self.columns + column)
    }

    /// Overwrite a cell, ignoring out-of-range coordinates
    pub fn set(&mut self, row: usize, column: usize, value: T) {
        if let Some(cell) = self.get_mut(row, column) {
            *cell = value;
        }
    }

    /// Borrow a whole row
    pub fn row(&self, row: usize) -> &[T] {
        if row >= self.rows {
            return &[];
        }
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    /// Insert `count` rows before row `at`, filled by `fill(new_row_offset, column)`
    pub fn insert_rows_with(
        &mut self,
        at: usize,
        count: usize,
        mut fill: impl FnMut(usize, usize) -> T,
    ) {
        let at = at.min(self.rows);
        let start = at * self.columns;
        let mut inserted = Vec::with_capacity(count * self.columns);
        for offset in 0..count {
            for column in 0..self.columns {
                inserted.push(fill(offset, column));
            }
        }
        self.cells.splice(start..start, inserted);
        self.rows += count;
    }
}

impl<T: Clone> DenseGrid<T> {
    /// Create a grid with every cell set to `value`
    pub fn filled(rows: usize, columns: usize, value: T) -> Self {
        Self {
            cells: vec![value; rows * columns],
            rows,
            columns,
        }
    }

    /// Insert `count` copies of row `source` before row `at`.
    ///
    /// `source` indexes the grid before the insertion.
    pub fn duplicate_rows(&mut self, source: usize, at: usize, count: usize) {
        if source >= self.rows {
            return;
        }
        let template = self.row(source).to_vec();
        self.insert_rows_with(at, count, |_, column| template[column].clone());
    }
}

impl<T> Default for DenseGrid<T> {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            rows: 0,
            columns: 0,
        }
    }
}
