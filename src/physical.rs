//! Orthonormal physical-space basis used to express advecting fields in reduced coordinates.
use crate::pod::{orthonormal_columns, PodBasis};
use crate::projection::Direction;
use crate::provider::{TruthOperatorProvider, VelocityField};
use crate::{Real, RomError};
use eyre::WrapErr;
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};

/// Coordinates of a velocity field with respect to a [`PhysicalBasis`], one per direction and mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedCoordinates<T: Real> {
    pub x: DVector<T>,
    pub y: DVector<T>,
}

impl<T: Real> ReducedCoordinates<T> {
    pub fn zeros(size: usize) -> Self {
        Self {
            x: DVector::zeros(size),
            y: DVector::zeros(size),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn get(&self, direction: Direction) -> &DVector<T> {
        match direction {
            Direction::X => &self.x,
            Direction::Y => &self.y,
        }
    }
}

/// Separately orthonormalized x and y components of the POD modes in physical space.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalBasis<T: Real> {
    x: DMatrix<T>,
    y: DMatrix<T>,
}

impl<T: Real> PhysicalBasis<T> {
    /// Maps every POD mode to physical space and orthonormalizes each velocity component.
    ///
    /// `to_local` converts a mode from the numbering of the snapshot matrix to the provider's local
    /// numbering.
    pub fn from_modes<P>(
        provider: &P,
        pod: &PodBasis<T>,
        to_local: impl Fn(DVectorView<T>) -> DVector<T>,
    ) -> eyre::Result<Self>
    where
        P: ?Sized + TruthOperatorProvider<T>,
    {
        let n = provider.num_physical_points();
        let size = pod.size();
        let mut x = DMatrix::zeros(n, size);
        let mut y = DMatrix::zeros(n, size);
        for (k, mode) in pod.modes().column_iter().enumerate() {
            let local = to_local(mode);
            let field = provider
                .to_physical(DVectorView::from(&local))
                .wrap_err_with(|| format!("failed to map POD mode {} to physical space", k))?;
            x.set_column(k, &field.x);
            y.set_column(k, &field.y);
        }
        Ok(Self::orthonormalize(x, y)?)
    }

    /// Orthonormalizes the columns of the given component matrices in column order.
    pub fn orthonormalize(x: DMatrix<T>, y: DMatrix<T>) -> Result<Self, RomError> {
        if x.nrows() != y.nrows() || x.ncols() != y.ncols() {
            let (expected, actual) = if x.nrows() != y.nrows() {
                (x.nrows(), y.nrows())
            } else {
                (x.ncols(), y.ncols())
            };
            return Err(RomError::LayoutMismatch {
                context: "physical basis components",
                expected,
                actual,
            });
        }
        let orthonormalize = |matrix: DMatrix<T>, direction: Direction| {
            orthonormal_columns(matrix).map_err(|mode| RomError::DegeneratePhysicalBasis { direction, mode })
        };
        Ok(Self {
            x: orthonormalize(x, Direction::X)?,
            y: orthonormalize(y, Direction::Y)?,
        })
    }

    pub fn size(&self) -> usize {
        self.x.ncols()
    }

    pub fn num_points(&self) -> usize {
        self.x.nrows()
    }

    pub fn component(&self, direction: Direction) -> &DMatrix<T> {
        match direction {
            Direction::X => &self.x,
            Direction::Y => &self.y,
        }
    }

    /// The velocity field that is the `mode`-th basis vector in `direction` and zero in the other direction.
    pub fn unit_field(&self, direction: Direction, mode: usize) -> VelocityField<T> {
        let column = self.component(direction).column(mode).into_owned();
        let zero = DVector::zeros(self.num_points());
        match direction {
            Direction::X => VelocityField::new(column, zero),
            Direction::Y => VelocityField::new(zero, column),
        }
    }

    pub fn project(&self, field: &VelocityField<T>) -> Result<ReducedCoordinates<T>, RomError> {
        if field.num_points() != self.num_points() {
            return Err(RomError::LayoutMismatch {
                context: "advecting field",
                expected: self.num_points(),
                actual: field.num_points(),
            });
        }
        Ok(ReducedCoordinates {
            x: self.x.tr_mul(&field.x),
            y: self.y.tr_mul(&field.y),
        })
    }

    /// The largest Frobenius norm of `QᵀQ - I` over both components.
    pub fn orthonormality_error(&self) -> T {
        let identity = DMatrix::identity(self.size(), self.size());
        let error_x = (self.x.tr_mul(&self.x) - &identity).norm();
        let error_y = (self.y.tr_mul(&self.y) - &identity).norm();
        error_x.max(error_y)
    }

    /// The field `Σ_k x_k Q_x[:, k]`, `Σ_k y_k Q_y[:, k]` represented by the coordinates.
    pub fn reconstruct(&self, coordinates: &ReducedCoordinates<T>) -> VelocityField<T> {
        VelocityField::new(&self.x * &coordinates.x, &self.y * &coordinates.y)
    }
}
