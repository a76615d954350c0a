//! Partitioning of full dof vectors into boundary, pressure and interior blocks.
use crate::{Real, RomError};
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};

/// Sizes of the three contiguous blocks of a full dof vector `[boundary | pressure | interior]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofLayout {
    pub boundary: usize,
    pub pressure: usize,
    pub interior: usize,
}

impl DofLayout {
    pub fn new(boundary: usize, pressure: usize, interior: usize) -> Self {
        Self {
            boundary,
            pressure,
            interior,
        }
    }

    pub fn total(&self) -> usize {
        self.boundary + self.pressure + self.interior
    }

    pub fn pressure_offset(&self) -> usize {
        self.boundary
    }

    pub fn interior_offset(&self) -> usize {
        self.boundary + self.pressure
    }

    /// The same layout with a different number of boundary dofs.
    pub fn with_boundary(&self, boundary: usize) -> Self {
        Self { boundary, ..*self }
    }

    pub fn check_len(&self, len: usize, context: &'static str) -> Result<(), RomError> {
        if len == self.total() {
            Ok(())
        } else {
            Err(RomError::LayoutMismatch {
                context,
                expected: self.total(),
                actual: len,
            })
        }
    }

    pub fn boundary_block<'a, T: Real>(&self, full: &'a DVector<T>) -> DVectorView<'a, T> {
        full.rows(0, self.boundary)
    }

    pub fn pressure_block<'a, T: Real>(&self, full: &'a DVector<T>) -> DVectorView<'a, T> {
        full.rows(self.pressure_offset(), self.pressure)
    }

    pub fn interior_block<'a, T: Real>(&self, full: &'a DVector<T>) -> DVectorView<'a, T> {
        full.rows(self.interior_offset(), self.interior)
    }

    /// Concatenates the three blocks into a full vector.
    pub fn join<T: Real>(&self, boundary: &DVector<T>, pressure: &DVector<T>, interior: &DVector<T>) -> DVector<T> {
        assert_eq!(boundary.len(), self.boundary);
        assert_eq!(pressure.len(), self.pressure);
        assert_eq!(interior.len(), self.interior);
        let mut full = DVector::zeros(self.total());
        full.rows_mut(0, self.boundary).copy_from(boundary);
        full.rows_mut(self.pressure_offset(), self.pressure)
            .copy_from(pressure);
        full.rows_mut(self.interior_offset(), self.interior)
            .copy_from(interior);
        full
    }
}

/// Map from element-local boundary dofs to globally numbered boundary dofs.
///
/// Each local boundary dof is either unmapped or maps to a global dof with a sign (`±1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryMap {
    local_to_global: Vec<Option<(usize, f64)>>,
    num_global: usize,
}

impl BoundaryMap {
    pub fn new(local_to_global: Vec<Option<(usize, f64)>>, num_global: usize) -> Result<Self, RomError> {
        for &(global, _) in local_to_global.iter().flatten() {
            if global >= num_global {
                return Err(RomError::IndexOutOfBounds {
                    index: global,
                    len: num_global,
                });
            }
        }
        Ok(Self {
            local_to_global,
            num_global,
        })
    }

    /// Every local dof is its own global dof.
    pub fn identity(n: usize) -> Self {
        Self {
            local_to_global: (0..n).map(|i| Some((i, 1.0))).collect(),
            num_global: n,
        }
    }

    pub fn num_local(&self) -> usize {
        self.local_to_global.len()
    }

    pub fn num_global(&self) -> usize {
        self.num_global
    }

    pub fn global_index(&self, local: usize) -> Option<(usize, f64)> {
        self.local_to_global[local]
    }

    /// The scatter matrix `M` (local × global) with `M[l, g] = sign` for every mapped local dof.
    pub fn scatter_matrix<T: Real>(&self) -> DMatrix<T> {
        let mut m = DMatrix::zeros(self.num_local(), self.num_global);
        for (local, entry) in self.local_to_global.iter().enumerate() {
            if let Some((global, sign)) = entry {
                m[(local, *global)] = T::from_f64(*sign).unwrap();
            }
        }
        m
    }

    /// Copies global boundary values to every local copy. Unmapped local dofs are zero.
    pub fn scatter<T: Real>(&self, global: DVectorView<T>) -> DVector<T> {
        assert_eq!(global.len(), self.num_global);
        DVector::from_iterator(
            self.num_local(),
            self.local_to_global.iter().map(|entry| match entry {
                Some((g, sign)) => T::from_f64(*sign).unwrap() * global[*g],
                None => T::zero(),
            }),
        )
    }

    /// Gathers local boundary values into global values by sign-corrected averaging over local copies.
    ///
    /// Global dofs without any local copy are zero.
    pub fn gather<T: Real>(&self, local: DVectorView<T>) -> DVector<T> {
        assert_eq!(local.len(), self.num_local());
        let mut global = DVector::zeros(self.num_global);
        let mut multiplicity = vec![0usize; self.num_global];
        for (l, entry) in self.local_to_global.iter().enumerate() {
            if let Some((g, sign)) = entry {
                global[*g] += T::from_f64(*sign).unwrap() * local[l];
                multiplicity[*g] += 1;
            }
        }
        for (value, count) in global.iter_mut().zip(multiplicity) {
            if count > 1 {
                *value /= T::from_usize(count).unwrap();
            }
        }
        global
    }
}
