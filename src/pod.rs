//! Proper orthogonal decomposition of snapshot matrices and the reduced basis built from it.
use crate::dirichlet::DirichletPartition;
use crate::{Real, RomError};
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, DVectorView, SVD};
use numeric_literals::replace_float_literals;

/// Chooses the number of POD modes from the singular values (sorted in decreasing order).
///
/// The size starts at one. For every index `i` at which the cumulative relative energy
/// `(σ_0 + ... + σ_i) / Σσ` is still below `tolerance`, the size becomes `i + 2`, so the mode at which the
/// energy first reaches the tolerance is kept. The result is capped at the number of singular values,
/// which is reported when it happens. Zero total energy gives a single mode.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn select_basis_size<T: Real>(singular_values: &[T], tolerance: T) -> usize {
    let n = singular_values.len();
    let total = singular_values
        .iter()
        .fold(T::zero(), |acc, &s| acc + s);
    if n == 0 {
        return 0;
    }
    if total <= 0.0 {
        return 1;
    }

    let mut size = 1;
    let mut cumulative = T::zero();
    for (i, &sigma) in singular_values.iter().enumerate() {
        cumulative += sigma;
        if cumulative / total < tolerance {
            size = i + 2;
        }
    }

    if size > n {
        warn!(
            "POD tolerance {} not reached by {} modes, capping basis size at {}",
            tolerance, n, n
        );
        size = n;
    }
    size
}

/// Cumulative relative energies `(σ_0 + ... + σ_i) / Σσ`.
pub fn cumulative_energy<T: Real>(singular_values: &[T]) -> DVector<T> {
    let total = singular_values
        .iter()
        .fold(T::zero(), |acc, &s| acc + s);
    let mut cumulative = T::zero();
    DVector::from_iterator(
        singular_values.len(),
        singular_values.iter().map(|&s| {
            cumulative += s;
            if total > T::zero() {
                cumulative / total
            } else {
                T::one()
            }
        }),
    )
}

/// Truncated left singular vectors of a snapshot matrix, over all rows of the full dof vector.
#[derive(Debug, Clone, PartialEq)]
pub struct PodBasis<T: Real> {
    modes: DMatrix<T>,
    singular_values: DVector<T>,
}

impl<T: Real> PodBasis<T> {
    /// Computes the thin SVD of `snapshots` (one column per snapshot) and truncates it.
    ///
    /// If `requested_size` is given it overrides the tolerance-based choice. A request larger than the
    /// number of available modes is capped and reported.
    pub fn compute(snapshots: &DMatrix<T>, tolerance: T, requested_size: Option<usize>) -> Result<Self, RomError> {
        if snapshots.ncols() == 0 || snapshots.nrows() == 0 {
            return Err(RomError::EmptySnapshotSet);
        }

        let svd = SVD::try_new(snapshots.clone(), true, false, T::default_epsilon(), 0)
            .ok_or(RomError::SvdNotConverged)?;
        let u = svd.u.ok_or(RomError::SvdNotConverged)?;

        // Sort in decreasing order regardless of what the decomposition guarantees
        let order: Vec<usize> = (0..svd.singular_values.len())
            .sorted_by(|&i, &j| {
                svd.singular_values[j]
                    .partial_cmp(&svd.singular_values[i])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .collect();
        let singular_values = svd.singular_values.select_rows(&order);
        let u = u.select_columns(&order);

        debug!("Snapshot singular values: {}", singular_values.transpose());
        debug!(
            "Cumulative relative energies: {}",
            cumulative_energy(singular_values.as_slice()).transpose()
        );

        let available = singular_values.len();
        let size = match requested_size {
            Some(requested) if requested > available => {
                warn!(
                    "Requested basis size {} exceeds the {} available modes, capping to {}",
                    requested, available, available
                );
                available
            }
            Some(requested) => requested.max(1),
            None => select_basis_size(singular_values.as_slice(), tolerance),
        };
        info!("POD basis size: {} of {} modes", size, available);

        Ok(Self {
            modes: u.columns(0, size).into_owned(),
            singular_values,
        })
    }

    /// Number of retained modes.
    pub fn size(&self) -> usize {
        self.modes.ncols()
    }

    /// Retained modes over all rows of the full dof vector (one column per mode).
    pub fn modes(&self) -> &DMatrix<T> {
        &self.modes
    }

    /// All singular values of the snapshot matrix, in decreasing order.
    pub fn singular_values(&self) -> &DVector<T> {
        &self.singular_values
    }

    pub fn cumulative_energy(&self) -> DVector<T> {
        cumulative_energy(self.singular_values.as_slice())
    }

    /// Coordinates `Φᵀ v` of a full vector with respect to the retained modes.
    pub fn coordinates(&self, full: DVectorView<T>) -> Result<DVector<T>, RomError> {
        if full.len() != self.modes.nrows() {
            return Err(RomError::LayoutMismatch {
                context: "POD coordinates",
                expected: self.modes.nrows(),
                actual: full.len(),
            });
        }
        Ok(self.modes.tr_mul(&full))
    }
}

/// Orthonormal basis of the free dofs spanned by the restricted POD modes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedBasis<T: Real> {
    matrix: DMatrix<T>,
}

impl<T: Real> ReducedBasis<T> {
    /// Removes the fixed rows of the POD modes and re-orthonormalizes the result.
    ///
    /// The span is unchanged, so Galerkin projections onto the basis are too.
    pub fn restrict(pod: &PodBasis<T>, partition: &DirichletPartition<T>) -> Result<Self, RomError> {
        let restricted = partition.strip_matrix_rows(pod.modes())?;
        let matrix = orthonormal_columns(restricted).map_err(|mode| RomError::DegenerateBasis { mode })?;
        Ok(Self { matrix })
    }

    /// Wraps a matrix whose columns are already orthonormal.
    pub fn from_orthonormal_columns(matrix: DMatrix<T>) -> Self {
        Self { matrix }
    }

    /// Number of basis vectors.
    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn num_free(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// `Bᵀ v` for a vector over the free dofs.
    pub fn project(&self, free: DVectorView<T>) -> Result<DVector<T>, RomError> {
        if free.len() != self.num_free() {
            return Err(RomError::LayoutMismatch {
                context: "free-dof vector",
                expected: self.num_free(),
                actual: free.len(),
            });
        }
        Ok(self.matrix.tr_mul(&free))
    }

    /// `Bᵀ K B` for a matrix over the free dofs.
    pub fn project_matrix(&self, matrix: &DMatrix<T>) -> DMatrix<T> {
        self.matrix.tr_mul(&(matrix * &self.matrix))
    }

    /// `B c` for reduced coefficients `c`.
    pub fn expand(&self, coefficients: DVectorView<T>) -> Result<DVector<T>, RomError> {
        if coefficients.len() != self.dim() {
            return Err(RomError::LayoutMismatch {
                context: "reduced coefficients",
                expected: self.dim(),
                actual: coefficients.len(),
            });
        }
        Ok(&self.matrix * coefficients)
    }

    /// Frobenius norm of `BᵀB - I`.
    pub fn orthonormality_error(&self) -> T {
        let gram = self.matrix.tr_mul(&self.matrix);
        (gram - DMatrix::identity(self.dim(), self.dim())).norm()
    }
}

/// Orthonormal columns spanning the same leading subspaces as the columns of `matrix`, from a thin QR
/// factorization. Each column keeps the orientation of the column it came from.
///
/// On failure, returns the index of the first column that is numerically dependent on the previous ones.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub(crate) fn orthonormal_columns<T: Real>(matrix: DMatrix<T>) -> Result<DMatrix<T>, usize> {
    let (m, n) = matrix.shape();
    if m < n {
        return Err(m);
    }

    let qr = matrix.qr();
    let r = qr.r();
    let mut q = qr.q().columns(0, n).into_owned();
    let max_diag = r
        .diagonal()
        .iter()
        .fold(T::zero(), |acc, x| acc.max(x.abs()));

    for k in 0..n {
        let r_kk = r[(k, k)];
        if max_diag == 0.0 || r_kk.abs() <= 1e-12 * max_diag {
            return Err(k);
        }
        if r_kk < 0.0 {
            q.column_mut(k).neg_mut();
        }
    }
    Ok(q)
}
