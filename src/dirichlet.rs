//! Classification of dofs into fixed (Dirichlet) and free sets.
use crate::{Real, RomError};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, DVectorView};

/// A partition of the full dof range into fixed (Dirichlet) and free indices,
/// together with the fixed-dof offset vector.
///
/// The offset vector has the length of the full dof vector, holds the Dirichlet value in every fixed
/// slot and zero in every free slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletPartition<T: Real> {
    fixed: Vec<usize>,
    free: Vec<usize>,
    is_fixed: Vec<bool>,
    offset: DVector<T>,
}

impl<T: Real> DirichletPartition<T> {
    /// Infers the fixed dofs by comparing two full vectors obtained from independent truth solves.
    ///
    /// Only the first `boundary_len` entries are candidates: an entry is fixed exactly when both probes
    /// hold the same floating-point value. Pressure and interior dofs are always free. The fixed values
    /// are taken from `first`.
    ///
    /// Exact equality is the sole criterion, so a free dof that coincidentally takes the same value in
    /// both probes is misclassified as fixed.
    pub fn from_probes(first: DVectorView<T>, second: DVectorView<T>, boundary_len: usize) -> Result<Self, RomError> {
        if first.len() != second.len() {
            return Err(RomError::LayoutMismatch {
                context: "Dirichlet probe vectors",
                expected: first.len(),
                actual: second.len(),
            });
        }
        if boundary_len > first.len() {
            return Err(RomError::IndexOutOfBounds {
                index: boundary_len,
                len: first.len(),
            });
        }

        let is_fixed: Vec<bool> = (0..first.len())
            .map(|i| i < boundary_len && first[i] == second[i])
            .collect();
        let partition = Self::from_mask(is_fixed, first);

        if boundary_len > 0 && (partition.num_fixed() == 0 || partition.num_fixed() == boundary_len) {
            warn!(
                "Dirichlet detection classified {} of {} boundary dofs as fixed. Are the probes independent?",
                partition.num_fixed(),
                boundary_len
            );
        }
        Ok(partition)
    }

    /// Builds the partition from known boundary-condition metadata.
    ///
    /// Duplicate indices are ignored. Fixed values are taken from `values`.
    pub fn from_indices(fixed: &[usize], values: DVectorView<T>) -> Result<Self, RomError> {
        let len = values.len();
        let mut is_fixed = vec![false; len];
        for &index in fixed {
            if index >= len {
                return Err(RomError::IndexOutOfBounds { index, len });
            }
            is_fixed[index] = true;
        }
        Ok(Self::from_mask(is_fixed, values))
    }

    fn from_mask(is_fixed: Vec<bool>, values: DVectorView<T>) -> Self {
        let (fixed, free): (Vec<usize>, Vec<usize>) = (0..is_fixed.len()).partition(|&i| is_fixed[i]);
        let offset = DVector::from_iterator(
            values.len(),
            values
                .iter()
                .zip(&is_fixed)
                .map(|(&v, &fixed)| if fixed { v } else { T::zero() }),
        );
        debug!("Dirichlet partition: {} fixed, {} free dofs", fixed.len(), free.len());
        Self {
            fixed,
            free,
            is_fixed,
            offset,
        }
    }

    /// Length of the full dof vector.
    pub fn len(&self) -> usize {
        self.is_fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_fixed.is_empty()
    }

    pub fn num_fixed(&self) -> usize {
        self.fixed.len()
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    pub fn fixed_indices(&self) -> &[usize] {
        &self.fixed
    }

    pub fn free_indices(&self) -> &[usize] {
        &self.free
    }

    pub fn is_fixed(&self, index: usize) -> Result<bool, RomError> {
        self.is_fixed
            .get(index)
            .copied()
            .ok_or(RomError::IndexOutOfBounds {
                index,
                len: self.is_fixed.len(),
            })
    }

    /// The fixed-dof offset vector.
    pub fn offset(&self) -> &DVector<T> {
        &self.offset
    }

    /// The values of the fixed dofs, in index order.
    pub fn fixed_values(&self) -> DVector<T> {
        self.offset.select_rows(&self.fixed)
    }

    fn check_len(&self, len: usize, context: &'static str) -> Result<(), RomError> {
        if len == self.len() {
            Ok(())
        } else {
            Err(RomError::LayoutMismatch {
                context,
                expected: self.len(),
                actual: len,
            })
        }
    }

    /// Removes the fixed rows of a full vector.
    pub fn strip_rows(&self, full: DVectorView<T>) -> Result<DVector<T>, RomError> {
        self.check_len(full.len(), "strip_rows")?;
        Ok(full.select_rows(&self.free))
    }

    /// Removes the fixed rows (but not columns) of a matrix with full-length columns.
    pub fn strip_matrix_rows(&self, matrix: &DMatrix<T>) -> Result<DMatrix<T>, RomError> {
        self.check_len(matrix.nrows(), "strip_matrix_rows")?;
        Ok(matrix.select_rows(&self.free))
    }

    /// Removes the fixed rows and columns of a full square matrix.
    pub fn strip_rows_and_cols(&self, matrix: &DMatrix<T>) -> Result<DMatrix<T>, RomError> {
        self.check_len(matrix.nrows(), "strip_rows_and_cols (rows)")?;
        self.check_len(matrix.ncols(), "strip_rows_and_cols (columns)")?;
        Ok(matrix.select_rows(&self.free).select_columns(&self.free))
    }

    /// The columns of a full square matrix belonging to fixed dofs, with fixed rows removed.
    pub fn free_fixed_block(&self, matrix: &DMatrix<T>) -> Result<DMatrix<T>, RomError> {
        self.check_len(matrix.nrows(), "free_fixed_block (rows)")?;
        self.check_len(matrix.ncols(), "free_fixed_block (columns)")?;
        Ok(matrix.select_rows(&self.free).select_columns(&self.fixed))
    }

    /// Inserts free values into a full vector whose fixed slots hold the stored offset values.
    pub fn lift(&self, free_values: DVectorView<T>) -> Result<DVector<T>, RomError> {
        self.lift_with(free_values, DVectorView::from(&self.offset))
    }

    /// Inserts free values into a full vector whose fixed slots are copied from `fixed_source`.
    pub fn lift_with(&self, free_values: DVectorView<T>, fixed_source: DVectorView<T>) -> Result<DVector<T>, RomError> {
        if free_values.len() != self.num_free() {
            return Err(RomError::LayoutMismatch {
                context: "lift (free values)",
                expected: self.num_free(),
                actual: free_values.len(),
            });
        }
        self.check_len(fixed_source.len(), "lift (fixed source)")?;
        let mut full = DVector::zeros(self.len());
        for &i in &self.fixed {
            full[i] = fixed_source[i];
        }
        for (&i, &v) in self.free.iter().zip(free_values.iter()) {
            full[i] = v;
        }
        Ok(full)
    }
}
