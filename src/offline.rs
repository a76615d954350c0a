//! Offline phase: from snapshots to an immutable [`ReducedModel`].
use crate::assembly::{assemble_from_provider, OperatorParts};
use crate::dirichlet::DirichletPartition;
use crate::online::ReducedModel;
use crate::physical::PhysicalBasis;
use crate::pod::{PodBasis, ReducedBasis};
use crate::projection::{project_term, AffineTerms, Direction, NewtonTensor, ProjectedTerm, TermKey};
use crate::provider::{ParameterPoint, TruthOperatorProvider, VelocityField};
use crate::settings::{DirichletDetection, Linearization, RomSettings};
use crate::snapshot::{coupled_indices, FullOrderSolver, SnapshotSet, SnapshotSource};
use crate::{Real, RomError};
use eyre::{eyre, WrapErr};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use std::collections::BTreeMap;

/// Runs the offline pipeline against a truth operator provider.
///
/// The stages are, in order: snapshot acquisition, Dirichlet partitioning, POD basis construction,
/// restriction to the free dofs, construction of the physical basis and projection of the affine terms.
#[derive(Debug)]
pub struct OfflineBuilder<'a, P: ?Sized> {
    provider: &'a P,
    settings: RomSettings,
    parallel: bool,
}

impl<'a, P: ?Sized> OfflineBuilder<'a, P> {
    pub fn new(provider: &'a P, settings: RomSettings) -> Self {
        Self {
            provider,
            settings,
            parallel: false,
        }
    }

    /// Acquire snapshots in parallel with rayon.
    pub fn parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    pub fn settings(&self) -> &RomSettings {
        &self.settings
    }

    /// A full-order solver configured from the settings.
    ///
    /// Newton linearization only concerns the reduced model, so truth solves use Picard iteration for it.
    pub fn full_order_solver(&self) -> FullOrderSolver<&'a P> {
        let linearization = match self.settings.linearization {
            Linearization::Stokes => Linearization::Stokes,
            Linearization::Oseen | Linearization::Newton => Linearization::Oseen,
        };
        FullOrderSolver::new(self.provider)
            .with_coupling(self.settings.coupling)
            .with_linearization(linearization)
            .with_picard_settings(self.settings.picard)
    }

    pub fn acquire_snapshots<T, S>(&self, source: &S, points: &[ParameterPoint<T>]) -> eyre::Result<SnapshotSet<T>>
    where
        T: Real,
        S: ?Sized + SnapshotSource<T> + Sync,
        P: TruthOperatorProvider<T> + Sync,
    {
        self.check_snapshot_count(points.len())?;
        if self.parallel {
            SnapshotSet::acquire_par(source, self.provider, points)
        } else {
            SnapshotSet::acquire(source, self.provider, points)
        }
    }

    /// Acquires the snapshots and builds the reduced model from them.
    pub fn run<T, S>(&self, source: &S, points: &[ParameterPoint<T>]) -> eyre::Result<(SnapshotSet<T>, ReducedModel<T>)>
    where
        T: Real,
        S: ?Sized + SnapshotSource<T> + Sync,
        P: TruthOperatorProvider<T> + Sync,
    {
        self.settings.validate()?;
        let snapshots = self.acquire_snapshots(source, points)?;
        let model = self.build(&snapshots)?;
        Ok((snapshots, model))
    }

    fn check_snapshot_count(&self, count: usize) -> Result<(), RomError> {
        if count == self.settings.number_of_snapshots {
            Ok(())
        } else {
            Err(RomError::LayoutMismatch {
                context: "number of snapshots",
                expected: self.settings.number_of_snapshots,
                actual: count,
            })
        }
    }

    /// Builds the reduced model from already acquired snapshots.
    pub fn build<T>(&self, snapshots: &SnapshotSet<T>) -> eyre::Result<ReducedModel<T>>
    where
        T: Real,
        P: TruthOperatorProvider<T>,
    {
        let settings = &self.settings;
        settings.validate()?;
        self.check_snapshot_count(snapshots.len())?;

        let provider = self.provider;
        let local = provider.layout();
        if snapshots.layout() != local {
            return Err(RomError::LayoutMismatch {
                context: "snapshot layout",
                expected: local.total(),
                actual: snapshots.layout().total(),
            }
            .into());
        }
        let map = provider.boundary_map();
        let coupling = settings.coupling;
        let coupled = coupling.layout(local, map);

        let matrix = snapshots.coupled_matrix(coupling, provider);
        let partition = match settings.dirichlet {
            DirichletDetection::ProbeSnapshots { first, second } => {
                DirichletPartition::from_probes(matrix.column(first), matrix.column(second), coupled.boundary)?
            }
            DirichletDetection::FromProvider => {
                let dofs = provider
                    .dirichlet_dofs()
                    .ok_or_else(|| eyre!("Dirichlet detection from provider requested, but the provider has none"))?;
                let dofs = coupled_indices(&dofs, local, coupling, provider);
                DirichletPartition::from_indices(&dofs, matrix.column(settings.reference_index))?
            }
        };
        info!(
            "Dirichlet partition: {} fixed, {} free of {} dofs",
            partition.num_fixed(),
            partition.num_free(),
            partition.len()
        );

        let tolerance = T::from_f64(settings.pod_tolerance).unwrap();
        let pod = PodBasis::compute(&matrix, tolerance, settings.basis_size)?;
        let basis = ReducedBasis::restrict(&pod, &partition)?;
        debug!("Reduced basis orthonormality error: {}", basis.orthonormality_error());

        let physical = PhysicalBasis::from_modes(provider, &pod, |mode| coupling.to_local(mode, local, map))?;

        let reference_viscosity = T::from_f64(settings.reference_viscosity).unwrap();
        let reference_point = ParameterPoint {
            viscosity: reference_viscosity,
            geometry: snapshots.point(settings.reference_index).geometry,
        };
        let reference_field = snapshots.field(settings.reference_index);
        let mixed = snapshots
            .points()
            .iter()
            .filter(|point| point.geometry != reference_point.geometry)
            .count();
        if mixed > 0 {
            warn!(
                "{} snapshots have a geometry other than the reference geometry {:?}. The reduced terms are \
                 only valid at the reference geometry.",
                mixed, reference_point.geometry
            );
        }

        let mut terms = BTreeMap::new();
        let project = |parts: OperatorParts, field: &VelocityField<T>| -> eyre::Result<(DMatrix<T>, ProjectedTerm<T>)> {
            let (operator, _) = assemble_from_provider(provider, &reference_point, field, parts, coupling)?;
            let term = project_term(&operator, &partition, &basis)?;
            Ok((operator, term))
        };

        let (_, constant) = project(OperatorParts::PRESSURE, reference_field).wrap_err("failed to project constant term")?;
        terms.insert(TermKey::Constant, constant);

        // The diffusive part is linear in the viscosity, so the unit-coefficient term is recovered by scaling
        let (_, diffusive) = project(OperatorParts::DIFFUSIVE, reference_field).wrap_err("failed to project diffusive term")?;
        terms.insert(TermKey::Diffusive, diffusive.scaled(T::one() / reference_viscosity));

        let newton = settings.linearization == Linearization::Newton;
        let mut slices: BTreeMap<Direction, Vec<DMatrix<T>>> = BTreeMap::new();
        for direction in Direction::ALL {
            for mode in 0..physical.size() {
                let field = physical.unit_field(direction, mode);
                let (operator, term) = project(OperatorParts::ADVECTIVE, &field)
                    .wrap_err_with(|| format!("failed to project advection term {:?} {}", direction, mode))?;
                terms.insert(TermKey::Advection { direction, mode }, term);

                if newton {
                    let action = partition.strip_matrix_rows(&(&operator * pod.modes()))?;
                    slices
                        .entry(direction)
                        .or_default()
                        .push(basis.matrix().tr_mul(&action));
                }
            }
            debug!("Projected {} advection terms in direction {:?}", physical.size(), direction);
        }

        let terms = AffineTerms::new(basis.dim(), physical.size(), terms)?;
        let newton = if newton {
            let mut take = |direction| slices.remove(&direction).unwrap_or_default();
            let (x, y) = (take(Direction::X), take(Direction::Y));
            Some(NewtonTensor::new(basis.dim(), pod.size(), x, y)?)
        } else {
            None
        };
        info!(
            "Reduced model built: dimension {}, {} affine terms{}",
            basis.dim(),
            terms.iter().count(),
            if newton.is_some() { ", with Newton tensor" } else { "" }
        );

        Ok(ReducedModel {
            settings: settings.clone(),
            geometry: reference_point.geometry,
            local_layout: local,
            boundary_map: map.clone(),
            partition,
            pod,
            basis,
            physical,
            terms,
            newton,
        })
    }
}

/// Builds a reduced model from precomputed snapshots with the given settings.
pub fn build_reduced_model<T, P>(provider: &P, snapshots: &SnapshotSet<T>, settings: RomSettings) -> eyre::Result<ReducedModel<T>>
where
    T: Real,
    P: ?Sized + TruthOperatorProvider<T>,
{
    OfflineBuilder::new(provider, settings).build(snapshots)
}

/// Relative error of representing the physical field of a training snapshot in the model's physical basis.
pub fn physical_projection_error<T: Real>(model: &ReducedModel<T>, snapshots: &SnapshotSet<T>, index: usize) -> Result<T, RomError> {
    let field = snapshots.field(index);
    let coordinates = model.physical_basis().project(field)?;
    let reconstructed = model.physical_basis().reconstruct(&coordinates);
    let difference = (&reconstructed.x - &field.x).norm_squared() + (&reconstructed.y - &field.y).norm_squared();
    let norm = field.norm();
    let difference = difference.sqrt();
    Ok(if norm == T::zero() { difference } else { difference / norm })
}
