use crate::error::RustyIntakeError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::reference::is_within_grid;
use crate::spreadsheet::SpreadsheetError;

/// One worksheet's decoded cells together with the range they span.
pub(crate) struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Non-empty cells, ordered by (row, col) once finished
    pub(crate) cells: Vec<Cell>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, widening the data range to include it.
    /// Cells outside the worksheet grid are rejected.
    pub(super) fn push(&mut self, cell: Cell) -> Result<(), RustyIntakeError> {
        if !is_within_grid(cell.row, cell.col) {
            Err(SpreadsheetError::CellPositionError(cell.row.saturating_add(1), cell.col.saturating_add(1)))?
        }
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
        Ok(())
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|row_lower_bound| row < row_lower_bound).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Orders cells by position. Writers usually emit cells in order already, but nothing
    /// in either file format requires it. A repeated position keeps its first cell.
    pub(super) fn finish(&mut self) {
        self.cells.sort_by_key(|cell| (cell.row, cell.col));
        self.cells.dedup_by_key(|cell| (cell.row, cell.col));
    }

    /// Groups the cells into rows, in row order. Only cells present in the sheet are
    /// returned; rows without any cell are left out.
    pub(crate) fn rows(&self) -> impl Iterator<Item = (usize, &[Cell])> + '_ {
        self.cells
            .chunk_by(|previous, next| previous.row == next.row)
            .map(|cells| (cells[0].row, cells))
    }
}
