//! Projection of affine operator terms onto the reduced basis.
use crate::dirichlet::DirichletPartition;
use crate::physical::ReducedCoordinates;
use crate::pod::ReducedBasis;
use crate::{Real, RomError};
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical advection direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    X,
    Y,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::X, Direction::Y];
}

/// Name of a structurally distinct operator term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TermKey {
    /// Pressure coupling, independent of the parameter.
    Constant,
    /// Diffusive term with unit coefficient, weighted by the parameter online.
    Diffusive,
    /// Advection with the `mode`-th physical basis vector in `direction`.
    Advection { direction: Direction, mode: usize },
}

/// A projected operator term: `Bᵀ K_ff B` and the projected fixed-dof contribution `Bᵀ (K g)_f`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTerm<T: Real> {
    pub matrix: DMatrix<T>,
    pub rhs: DVector<T>,
}

impl<T: Real> ProjectedTerm<T> {
    pub fn scaled(&self, factor: T) -> Self {
        Self {
            matrix: &self.matrix * factor,
            rhs: &self.rhs * factor,
        }
    }
}

/// Projects a full operator onto the reduced basis.
///
/// 1. `K g` is the operator's action on the fixed-dof offset vector `g`.
/// 2. Fixed rows and columns are removed from `K`, fixed rows from `K g`.
/// 3. `matrix = Bᵀ K_ff B`, `rhs = Bᵀ (K g)_f`.
pub fn project_term<T: Real>(
    operator: &DMatrix<T>,
    partition: &DirichletPartition<T>,
    basis: &ReducedBasis<T>,
) -> Result<ProjectedTerm<T>, RomError> {
    let correction = operator * partition.offset();
    let stripped = partition.strip_rows_and_cols(operator)?;
    let correction = partition.strip_rows(DVectorView::from(&correction))?;
    if stripped.nrows() != basis.num_free() {
        return Err(RomError::LayoutMismatch {
            context: "projected operator",
            expected: basis.num_free(),
            actual: stripped.nrows(),
        });
    }
    let rhs = basis.project(DVectorView::from(&correction))?;
    Ok(ProjectedTerm {
        matrix: basis.project_matrix(&stripped),
        rhs,
    })
}

/// The immutable collection of projected affine terms.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTerms<T: Real> {
    dim: usize,
    num_modes: usize,
    terms: BTreeMap<TermKey, ProjectedTerm<T>>,
}

impl<T: Real> AffineTerms<T> {
    /// Collects the terms. Every term must be `dim × dim`, and the constant, diffusive and all
    /// `2 × num_modes` advection terms must be present.
    pub fn new(dim: usize, num_modes: usize, terms: BTreeMap<TermKey, ProjectedTerm<T>>) -> Result<Self, RomError> {
        for term in terms.values() {
            if term.matrix.shape() != (dim, dim) || term.rhs.len() != dim {
                return Err(RomError::LayoutMismatch {
                    context: "projected term",
                    expected: dim,
                    actual: term.matrix.nrows(),
                });
            }
        }
        let expected = 2 + 2 * num_modes;
        if terms.len() != expected || !Self::keys(num_modes).all(|key| terms.contains_key(&key)) {
            return Err(RomError::LayoutMismatch {
                context: "number of affine terms",
                expected,
                actual: terms.len(),
            });
        }
        Ok(Self { dim, num_modes, terms })
    }

    /// All keys expected for the given number of physical modes.
    pub fn keys(num_modes: usize) -> impl Iterator<Item = TermKey> {
        [TermKey::Constant, TermKey::Diffusive].into_iter().chain(
            Direction::ALL
                .into_iter()
                .flat_map(move |direction| (0..num_modes).map(move |mode| TermKey::Advection { direction, mode })),
        )
    }

    /// Dimension of the reduced system.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of physical modes per direction.
    pub fn num_modes(&self) -> usize {
        self.num_modes
    }

    pub fn get(&self, key: TermKey) -> Option<&ProjectedTerm<T>> {
        self.terms.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TermKey, &ProjectedTerm<T>)> {
        self.terms.iter()
    }

    /// `Constant + ν Diffusive + Σ_k (x_k AdvX_k + y_k AdvY_k)`, for the matrix and for the offset contribution.
    pub fn combine(&self, viscosity: T, coordinates: &ReducedCoordinates<T>) -> Result<ProjectedTerm<T>, RomError> {
        if coordinates.len() != self.num_modes {
            return Err(RomError::LayoutMismatch {
                context: "reduced coordinates",
                expected: self.num_modes,
                actual: coordinates.len(),
            });
        }
        let mut matrix = DMatrix::zeros(self.dim, self.dim);
        let mut rhs = DVector::zeros(self.dim);
        for (key, term) in &self.terms {
            let weight = match *key {
                TermKey::Constant => T::one(),
                TermKey::Diffusive => viscosity,
                TermKey::Advection { direction, mode } => coordinates.get(direction)[mode],
            };
            matrix += &term.matrix * weight;
            rhs.axpy(weight, &term.rhs, T::one());
        }
        Ok(ProjectedTerm { matrix, rhs })
    }
}

/// Rank-3 tensor of projected bilinear advection terms for Newton linearization.
///
/// Slice `(direction, mode)` holds, in column `j`, the projected action `Bᵀ (N φ_j)_f` of the advection
/// operator `N` for that physical basis vector on the `j`-th full POD mode `φ_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonTensor<T: Real> {
    dim: usize,
    num_modes: usize,
    // One `dim x num_modes` slice per (direction, mode), X slices first
    slices: Vec<DMatrix<T>>,
}

impl<T: Real> NewtonTensor<T> {
    pub fn new(dim: usize, num_modes: usize, x: Vec<DMatrix<T>>, y: Vec<DMatrix<T>>) -> Result<Self, RomError> {
        if x.len() != num_modes || y.len() != num_modes {
            return Err(RomError::LayoutMismatch {
                context: "Newton tensor slices",
                expected: num_modes,
                actual: x.len().min(y.len()),
            });
        }
        let slices: Vec<_> = x.into_iter().chain(y).collect();
        if let Some(bad) = slices.iter().find(|s| s.shape() != (dim, num_modes)) {
            return Err(RomError::LayoutMismatch {
                context: "Newton tensor slice",
                expected: dim,
                actual: bad.nrows(),
            });
        }
        Ok(Self { dim, num_modes, slices })
    }

    pub fn slice(&self, direction: Direction, mode: usize) -> &DMatrix<T> {
        let offset = match direction {
            Direction::X => 0,
            Direction::Y => self.num_modes,
        };
        &self.slices[offset + mode]
    }

    /// `Σ_{d,k} c_{d,k} T_{d,k} a`, contracting the advection and solution indices.
    pub fn contract(&self, coordinates: &ReducedCoordinates<T>, solution: DVectorView<T>) -> Result<DVector<T>, RomError> {
        if coordinates.len() != self.num_modes || solution.len() != self.num_modes {
            return Err(RomError::LayoutMismatch {
                context: "Newton contraction",
                expected: self.num_modes,
                actual: if coordinates.len() != self.num_modes {
                    coordinates.len()
                } else {
                    solution.len()
                },
            });
        }
        let mut combined = DMatrix::zeros(self.dim, self.num_modes);
        for direction in Direction::ALL {
            for (mode, &weight) in coordinates.get(direction).iter().enumerate() {
                combined += self.slice(direction, mode) * weight;
            }
        }
        Ok(combined * solution)
    }
}
