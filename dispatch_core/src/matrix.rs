// dispatch_core/src/matrix.rs

//! Dense row-major `f32` matrix with growable rows and columns.
//! Rows are time slots, columns are generator indices.

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(cols: usize) -> Self {
        Matrix { rows: 0, cols, data: Vec::new() }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Checks that the backing buffer matches the declared shape.
    pub fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.rows.checked_mul(self.cols) != Some(self.data.len()) {
            anyhow::bail!(
                "Matrix '{}' is inconsistent: {} x {} with {} cells",
                name,
                self.rows,
                self.cols,
                self.data.len(),
            );
        }
        anyhow::Ok(())
    }

    /// Grows the matrix with zero rows until it holds at least `rows` rows.
    pub fn ensure_rows(&mut self, rows: usize) {
        if rows > self.rows {
            self.data.resize(rows * self.cols, 0.0);
            self.rows = rows;
        }
    }

    /// Appends a zero-filled column, keeping every existing row rectangular.
    pub fn push_column(&mut self) {
        let new_cols = self.cols + 1;
        let mut data = Vec::with_capacity(self.rows * new_cols);
        for r in 0..self.rows {
            data.extend_from_slice(&self.data[r * self.cols..(r + 1) * self.cols]);
            data.push(0.0);
        }
        self.data = data;
        self.cols = new_cols;
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        Some(&self.data[row * self.cols..(row + 1) * self.cols])
    }

    /// Mutable access to a row, growing the matrix if needed.
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        self.ensure_rows(row + 1);
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if col >= self.cols {
            return None;
        }
        self.row(row).map(|r| r[col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        debug_assert!(col < self.cols);
        self.row_mut(row)[col] = value;
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_column_keeps_existing_values() {
        let mut m = Matrix::new(2);
        m.set(0, 0, 1.0);
        m.set(0, 1, 2.0);
        m.set(2, 1, 5.0);
        m.push_column();

        assert_eq!(m.cols(), 3);
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row(0), Some(&[1.0, 2.0, 0.0][..]));
        assert_eq!(m.row(1), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(m.row(2), Some(&[0.0, 5.0, 0.0][..]));
        m.validate("m").unwrap();
    }

    #[test]
    fn columns_added_to_empty_matrix_cover_existing_rows() {
        let mut m = Matrix::new(0);
        m.ensure_rows(4);
        m.push_column();
        m.push_column();
        assert_eq!(m.rows(), 4);
        assert_eq!(m.get(3, 1), Some(0.0));
        m.validate("m").unwrap();
    }

    #[test]
    fn out_of_range_reads_are_none() {
        let m = Matrix::new(3);
        assert_eq!(m.row(0), None);
        assert_eq!(m.get(0, 5), None);
    }
}
