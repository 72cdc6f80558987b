//! In-memory string table: the common shape every CSV is read into before the
//! accessors turn rows into typed records.
//!
//! Cells are `Option<String>`; an empty or whitespace-only field is `None`.

/// A header row plus data rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

/// Borrowed view of one row, addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    cells: &'a [Option<String>],
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Table with the given columns and no rows.
    pub fn empty(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |cells| RowRef {
            table: self,
            cells,
        })
    }

    /// Exact (trimmed, case-insensitive) column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row, padding with nulls or truncating to the table width.
    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut row: Vec<Option<String>> = cells.into_iter().take(self.width()).collect();
        row.resize(self.width(), None);
        self.rows.push(row);
    }

    /// Append a row of raw field text, mapping blank fields to `None`.
    pub fn push_text_row<'s, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = &'s str>,
    {
        self.push_row(fields.into_iter().map(cell_from_text));
    }

    pub fn rename_column(&mut self, index: usize, name: &str) {
        if let Some(h) = self.headers.get_mut(index) {
            *h = name.to_string();
        }
    }

    /// Reorder/slice to exactly `columns`; any missing column becomes a null column.
    pub fn select_columns(&self, columns: &[&str]) -> Table {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut out = Table::empty(columns);
        for cells in &self.rows {
            out.rows.push(
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| cells.get(i).cloned().flatten()))
                    .collect(),
            );
        }
        out
    }

    /// Keep the rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&RowRef<'_>) -> bool,
    {
        let mut out = Table::new(self.headers.clone());
        for row in self.rows() {
            if keep(&row) {
                out.rows.push(row.cells.to_vec());
            }
        }
        out
    }
}

impl<'a> RowRef<'a> {
    /// Cell text for `column`, `None` if the column is absent or the cell is null.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.table.column_index(column)?;
        self.at(idx)
    }

    pub fn at(&self, index: usize) -> Option<&'a str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }

    /// Owned, trimmed copy of a cell.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(|s| s.trim().to_string())
    }

    pub fn cells(&self) -> &'a [Option<String>] {
        self.cells
    }
}

pub(crate) fn cell_from_text(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
