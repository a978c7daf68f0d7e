use crate::TermId;
use serde::{Deserialize, Serialize};

/// Row-major sparse matrix (CSR). Row `i` holds the weights of record `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMatrix {
    pub num_rows: usize,
    pub num_cols: usize,
    /// `indptr[i]..indptr[i + 1]` spans row `i` in `indices`/`data`.
    pub indptr: Vec<usize>,
    pub indices: Vec<TermId>,
    pub data: Vec<f32>,
}

impl TermMatrix {
    pub fn new(num_cols: usize) -> Self {
        Self { num_rows: 0, num_cols, indptr: vec![0], indices: Vec::new(), data: Vec::new() }
    }

    /// Append a row given as (column, weight) pairs sorted by column.
    pub fn push_row(&mut self, row: &[(TermId, f32)]) {
        for (col, w) in row {
            self.indices.push(*col);
            self.data.push(*w);
        }
        self.indptr.push(self.indices.len());
        self.num_rows += 1;
    }

    pub fn row(&self, i: usize) -> impl Iterator<Item = (TermId, f32)> + '_ {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        self.indices[start..end].iter().copied().zip(self.data[start..end].iter().copied())
    }

    pub fn row_norm(&self, i: usize) -> f32 {
        self.row(i).map(|(_, w)| w * w).sum::<f32>().sqrt()
    }

    /// Dot product of every row with a dense vector of length `num_cols`.
    pub fn dot_rows(&self, dense: &[f32]) -> Vec<f32> {
        (0..self.num_rows)
            .map(|i| self.row(i).map(|(col, w)| w * dense[col as usize]).sum())
            .collect()
    }

    /// Checks the CSR arrays describe a well formed `num_rows x num_cols` matrix.
    pub fn validate(&self) -> Result<(), String> {
        if self.indptr.len() != self.num_rows + 1 {
            return Err(format!("indptr has {} entries for {} rows", self.indptr.len(), self.num_rows));
        }
        if self.indices.len() != self.data.len() {
            return Err("indices and data lengths differ".into());
        }
        if self.indptr.first() != Some(&0) || self.indptr.last() != Some(&self.indices.len()) {
            return Err("indptr does not span the stored entries".into());
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err("indptr is not monotonic".into());
        }
        if let Some(col) = self.indices.iter().find(|c| **c as usize >= self.num_cols) {
            return Err(format!("column {col} out of range for {} columns", self.num_cols));
        }
        Ok(())
    }
}
