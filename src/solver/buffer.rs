//! Column-growable path storage.
//!
//! Dendrograms are the common case, so a run over `n` observations is
//! expected to record O(n) columns. Buffers start at ⌈1.5·n⌉ columns and
//! double on overflow, which keeps growth amortized O(1); at termination
//! they are compacted to the exact number of recorded columns.

use ndarray::{s, Array2, ArrayView1};

/// Append-only store of fixed-height columns.
#[derive(Debug, Clone)]
pub(crate) struct PathBuffer<T> {
    data: Array2<T>,
    cols: usize,
}

impl<T: Copy + Default> PathBuffer<T> {
    /// Create a buffer for `rows`-high columns, sized for roughly
    /// `expected_events` recorded columns.
    pub(crate) fn new(rows: usize, expected_events: usize) -> Self {
        let capacity = ((expected_events * 3).div_ceil(2)).max(1);
        Self {
            data: Array2::from_elem((rows, capacity), T::default()),
            cols: 0,
        }
    }

    /// Number of recorded columns.
    pub(crate) fn len(&self) -> usize {
        self.cols
    }

    /// Append one column, doubling capacity if full.
    pub(crate) fn push(&mut self, column: &[T]) {
        debug_assert_eq!(column.len(), self.data.nrows());
        if self.cols == self.data.ncols() {
            self.grow();
        }
        self.data
            .column_mut(self.cols)
            .assign(&ArrayView1::from(column));
        self.cols += 1;
    }

    fn grow(&mut self) {
        let rows = self.data.nrows();
        let capacity = (self.data.ncols() * 2).max(1);
        let mut bigger = Array2::from_elem((rows, capacity), T::default());
        bigger
            .slice_mut(s![.., ..self.cols])
            .assign(&self.data.slice(s![.., ..self.cols]));
        self.data = bigger;
    }

    /// Drop unused capacity and return the exact `rows × len` matrix.
    pub(crate) fn into_compact(self) -> Array2<T> {
        let cols = self.cols;
        self.data.slice_move(s![.., ..cols])
    }
}
