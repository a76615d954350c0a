//! Online phase: assembly and solution of the reduced system for a single query.
use crate::assembly::BoundaryCoupling;
use crate::dirichlet::DirichletPartition;
use crate::layout::{BoundaryMap, DofLayout};
use crate::physical::{PhysicalBasis, ReducedCoordinates};
use crate::pod::{PodBasis, ReducedBasis};
use crate::projection::{AffineTerms, NewtonTensor};
use crate::provider::VelocityField;
use crate::settings::RomSettings;
use crate::{Real, RomError};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, DVectorView};

/// The advecting field of a query, either in physical space or already in reduced coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvectingField<T: Real> {
    Physical(VelocityField<T>),
    Reduced(ReducedCoordinates<T>),
}

/// A reduced solve request.
///
/// A query carries no geometry parameter. The affine terms of a model are projected at the geometry of
/// its reference snapshot, see [`ReducedModel::geometry`], and every query is solved at that geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineQuery<T: Real> {
    pub viscosity: T,
    pub advection: AdvectingField<T>,
    /// Full vector (coupled numbering) whose POD coordinates enter the Newton correction.
    pub newton_reference: Option<DVector<T>>,
}

impl<T: Real> OnlineQuery<T> {
    pub fn new(viscosity: T, field: VelocityField<T>) -> Self {
        Self {
            viscosity,
            advection: AdvectingField::Physical(field),
            newton_reference: None,
        }
    }

    pub fn with_coordinates(viscosity: T, coordinates: ReducedCoordinates<T>) -> Self {
        Self {
            viscosity,
            advection: AdvectingField::Reduced(coordinates),
            newton_reference: None,
        }
    }

    pub fn with_newton_reference(self, reference: DVector<T>) -> Self {
        Self {
            newton_reference: Some(reference),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnlineSolution<T: Real> {
    /// Reduced coefficients `c` of the solution.
    pub coefficients: DVector<T>,
    /// The lifted full vector in the coupled numbering: `B c` in the free slots, the offset in the fixed slots.
    pub lifted: DVector<T>,
}

/// The product of the offline phase. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedModel<T: Real> {
    pub(crate) settings: RomSettings,
    pub(crate) geometry: Option<T>,
    pub(crate) local_layout: DofLayout,
    pub(crate) boundary_map: BoundaryMap,
    pub(crate) partition: DirichletPartition<T>,
    pub(crate) pod: PodBasis<T>,
    pub(crate) basis: ReducedBasis<T>,
    pub(crate) physical: PhysicalBasis<T>,
    pub(crate) terms: AffineTerms<T>,
    pub(crate) newton: Option<NewtonTensor<T>>,
}

impl<T: Real> ReducedModel<T> {
    pub fn settings(&self) -> &RomSettings {
        &self.settings
    }

    pub fn coupling(&self) -> BoundaryCoupling {
        self.settings.coupling
    }

    /// The geometry parameter of the reference snapshot, at which all affine terms were projected.
    pub fn geometry(&self) -> Option<T> {
        self.geometry
    }

    /// Dimension of the reduced system.
    pub fn dim(&self) -> usize {
        self.basis.dim()
    }

    pub fn partition(&self) -> &DirichletPartition<T> {
        &self.partition
    }

    pub fn pod(&self) -> &PodBasis<T> {
        &self.pod
    }

    pub fn basis(&self) -> &ReducedBasis<T> {
        &self.basis
    }

    pub fn physical_basis(&self) -> &PhysicalBasis<T> {
        &self.physical
    }

    pub fn terms(&self) -> &AffineTerms<T> {
        &self.terms
    }

    pub fn newton_tensor(&self) -> Option<&NewtonTensor<T>> {
        self.newton.as_ref()
    }

    /// Layout of full vectors in the provider's local numbering.
    pub fn local_layout(&self) -> DofLayout {
        self.local_layout
    }

    /// Layout of lifted vectors.
    pub fn coupled_layout(&self) -> DofLayout {
        self.coupling()
            .layout(self.local_layout, &self.boundary_map)
    }

    /// Converts a full vector from the provider's local numbering to the numbering of lifted vectors.
    pub fn to_coupled(&self, local_full: DVectorView<T>) -> Result<DVector<T>, RomError> {
        self.local_layout
            .check_len(local_full.len(), "local full vector")?;
        Ok(self
            .coupling()
            .to_coupled(local_full, self.local_layout, &self.boundary_map))
    }

    /// Converts a lifted vector to the provider's local numbering.
    pub fn to_local(&self, coupled_full: DVectorView<T>) -> Result<DVector<T>, RomError> {
        self.coupled_layout()
            .check_len(coupled_full.len(), "lifted vector")?;
        Ok(self
            .coupling()
            .to_local(coupled_full, self.local_layout, &self.boundary_map))
    }

    /// Reduced coordinates of the query's advecting field.
    pub fn coordinates(&self, query: &OnlineQuery<T>) -> Result<ReducedCoordinates<T>, RomError> {
        match &query.advection {
            AdvectingField::Physical(field) => self.physical.project(field),
            AdvectingField::Reduced(coordinates) => Ok(coordinates.clone()),
        }
    }

    /// Assembles the reduced matrix and right-hand side for a query.
    ///
    /// The matrix is `Constant + ν Diffusive + Σ_k (x_k AdvX_k + y_k AdvY_k)` and the right-hand side the
    /// negated combination of the projected offset contributions. With a Newton tensor and a reference
    /// vector, `w Σ_{d,k} c_{d,k} T_{d,k} a` is added to the right-hand side, where `a` are the POD
    /// coordinates of the reference and `w` is the configured correction weight. A reference is ignored
    /// when the model carries no Newton tensor.
    pub fn assemble(&self, query: &OnlineQuery<T>) -> Result<(DMatrix<T>, DVector<T>), RomError> {
        let coordinates = self.coordinates(query)?;
        let combined = self.terms.combine(query.viscosity, &coordinates)?;
        let matrix = combined.matrix;
        let mut rhs = -combined.rhs;

        if let (Some(tensor), Some(reference)) = (&self.newton, &query.newton_reference) {
            let reference_coordinates = self.pod.coordinates(DVectorView::from(reference))?;
            let correction = tensor.contract(&coordinates, DVectorView::from(&reference_coordinates))?;
            let weight = T::from_f64(self.settings.newton_correction_weight).unwrap();
            rhs.axpy(weight, &correction, T::one());
        }

        Ok((matrix, rhs))
    }

    /// Solves the reduced system for a query and lifts the solution to full size.
    ///
    /// A singular or rank-deficient reduced matrix is reported as [`RomError::SingularReducedSystem`],
    /// never regularized.
    pub fn solve(&self, query: &OnlineQuery<T>) -> Result<OnlineSolution<T>, RomError> {
        let (matrix, rhs) = self.assemble(query)?;
        let coefficients = solve_dense(matrix, &rhs)?;
        let free = self.basis.expand(DVectorView::from(&coefficients))?;
        let lifted = self.partition.lift(DVectorView::from(&free))?;
        debug!("Reduced solve at viscosity {}: coefficients {}", query.viscosity, coefficients.transpose());
        Ok(OnlineSolution { coefficients, lifted })
    }

    /// Solves every query independently. A failed query does not affect the others.
    pub fn sweep(&self, queries: &[OnlineQuery<T>]) -> Vec<Result<OnlineSolution<T>, RomError>> {
        queries
            .iter()
            .enumerate()
            .map(|(index, query)| {
                let result = self.solve(query);
                if let Err(err) = &result {
                    warn!("Query {} (viscosity {}) failed: {}", index, query.viscosity, err);
                }
                result
            })
            .collect()
    }
}

/// Column-pivoted QR solve that refuses rank-deficient systems.
fn solve_dense<T: Real>(matrix: DMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>, RomError> {
    let n = matrix.nrows();
    let singular = RomError::SingularReducedSystem { size: n };
    if n == 0 {
        return Err(singular);
    }

    let qr = matrix.col_piv_qr();
    let r = qr.r();
    let largest = r[(0, 0)].abs();
    let threshold = T::from_usize(n).unwrap() * T::default_epsilon() * largest;
    let rank_deficient = !largest.is_finite()
        || largest == T::zero()
        || r.diagonal()
            .iter()
            .any(|r_kk| !r_kk.is_finite() || r_kk.abs() <= threshold);
    if rank_deficient {
        return Err(singular);
    }

    let solution = qr.solve(rhs).ok_or(singular.clone())?;
    if solution.iter().all(|x| x.is_finite()) {
        Ok(solution)
    } else {
        Err(singular)
    }
}
