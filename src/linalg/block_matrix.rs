//! Column-blocked dense matrix.
//!
//! A `VerticalBlockMatrix` owns a single column-major `DMatrix<f64>` and an offset
//! table `[0, d₀, d₀+d₁, ...]`. Block `i` is the column range
//! `offset(i)..offset(i + 1)`. Because the storage is column-major, every block is a
//! contiguous slice of the buffer, which lets [`VerticalBlockMatrix::split_blocks_mut`]
//! hand out all blocks as disjoint mutable views at once.

use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut};

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalBlockMatrix {
    matrix: DMatrix<f64>,
    offsets: Vec<usize>,
}

impl VerticalBlockMatrix {
    /// Allocate a zeroed matrix with the given block widths and row count.
    ///
    /// With `append_one_dimension` an extra single-column block is added at the end,
    /// the usual place for the right-hand side.
    pub fn new(dims: &[usize], rows: usize, append_one_dimension: bool) -> Self {
        let mut offsets = Vec::with_capacity(dims.len() + 2);
        offsets.push(0);
        let widths = dims
            .iter()
            .copied()
            .chain(append_one_dimension.then_some(1));
        for width in widths {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + width);
        }
        let cols = offsets[offsets.len() - 1];

        VerticalBlockMatrix {
            matrix: DMatrix::zeros(rows, cols),
            offsets,
        }
    }

    /// Number of column blocks.
    pub fn n_blocks(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// First column of block `i`; `offset(n_blocks())` is the total column count.
    pub fn offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    /// Width of block `i`.
    pub fn block_width(&self, block: usize) -> usize {
        self.offsets[block + 1] - self.offsets[block]
    }

    /// Read-only view of block `i`.
    ///
    /// # Panics
    /// Panics if `block >= n_blocks()`.
    pub fn block(&self, block: usize) -> DMatrixView<'_, f64> {
        assert!(block < self.n_blocks(), "Block index {block} out of range");
        self.matrix
            .columns(self.offsets[block], self.block_width(block))
    }

    /// Mutable view of block `i`.
    ///
    /// # Panics
    /// Panics if `block >= n_blocks()`.
    pub fn block_mut(&mut self, block: usize) -> DMatrixViewMut<'_, f64> {
        assert!(block < self.n_blocks(), "Block index {block} out of range");
        let width = self.block_width(block);
        self.matrix.columns_mut(self.offsets[block], width)
    }

    /// All blocks as disjoint mutable views, in block order.
    pub fn split_blocks_mut(&mut self) -> Vec<DMatrixViewMut<'_, f64>> {
        let rows = self.matrix.nrows();
        let mut remaining = self.matrix.as_mut_slice();
        let mut blocks = Vec::with_capacity(self.offsets.len() - 1);

        for window in self.offsets.windows(2) {
            let width = window[1] - window[0];
            let (head, tail) = std::mem::take(&mut remaining).split_at_mut(rows * width);
            blocks.push(DMatrixViewMut::from_slice(head, rows, width));
            remaining = tail;
        }

        blocks
    }

    /// The whole underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn set_zero(&mut self) {
        self.matrix.fill(0.0);
    }
}
