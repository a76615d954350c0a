//! Acquisition and storage of full-order snapshots.
use crate::assembly::{assemble_operator, BoundaryCoupling, OperatorParts};
use crate::dirichlet::DirichletPartition;
use crate::layout::DofLayout;
use crate::provider::{ParameterPoint, TruthOperatorProvider, VelocityField};
use crate::settings::{Linearization, PicardSettings};
use crate::{Real, RomError};
use eyre::{eyre, WrapErr};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, DVectorView};
use rayon::prelude::*;

/// A source of full-order solution vectors, one per sampled parameter point.
///
/// Vectors are in the provider's local layout.
pub trait SnapshotSource<T: Real> {
    fn layout(&self) -> DofLayout;

    fn snapshot_at(&self, index: usize, point: &ParameterPoint<T>) -> eyre::Result<DVector<T>>;
}

/// Full-order solves through a [`TruthOperatorProvider`].
///
/// Dirichlet dofs are taken from the provider's boundary-condition metadata unless given explicitly, and
/// their values from the provider's boundary forcing.
#[derive(Debug, Clone)]
pub struct FullOrderSolver<P> {
    provider: P,
    coupling: BoundaryCoupling,
    linearization: Linearization,
    picard: PicardSettings,
    dirichlet_dofs: Option<Vec<usize>>,
}

impl<P> FullOrderSolver<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            coupling: BoundaryCoupling::default(),
            linearization: Linearization::default(),
            picard: PicardSettings::default(),
            dirichlet_dofs: None,
        }
    }

    pub fn with_coupling(self, coupling: BoundaryCoupling) -> Self {
        Self { coupling, ..self }
    }

    pub fn with_linearization(self, linearization: Linearization) -> Self {
        Self { linearization, ..self }
    }

    pub fn with_picard_settings(self, picard: PicardSettings) -> Self {
        Self { picard, ..self }
    }

    /// Overrides the provider's Dirichlet metadata. Indices refer to the local layout.
    pub fn with_dirichlet_dofs(self, dofs: Vec<usize>) -> Self {
        Self {
            dirichlet_dofs: Some(dofs),
            ..self
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> FullOrderSolver<P> {
    /// Solves the full-order problem at the given parameter point and returns the local full vector.
    pub fn solve<T>(&self, point: &ParameterPoint<T>) -> eyre::Result<DVector<T>>
    where
        T: Real,
        P: TruthOperatorProvider<T>,
    {
        let provider = &self.provider;
        let local = provider.layout();
        let map = provider.boundary_map();
        let local_dirichlet = self
            .dirichlet_dofs
            .clone()
            .or_else(|| provider.dirichlet_dofs())
            .ok_or_else(|| eyre!("full-order solve requires Dirichlet dofs, but none are known"))?;
        let coupled_dirichlet = coupled_indices(&local_dirichlet, local, self.coupling, provider);

        let tolerance = T::from_f64(self.picard.tolerance).unwrap();
        let mut field = VelocityField::zeros(provider.num_physical_points());
        let mut previous: Option<DVector<T>> = None;

        for iteration in 0..self.picard.max_iterations {
            let blocks = provider
                .assemble(point, &field)
                .wrap_err("failed to assemble full-order operator")?;
            let operator = assemble_operator(&blocks, OperatorParts::COMPLETE, self.coupling, map)?;
            let forcing = self
                .coupling
                .to_coupled(DVectorView::from(&blocks.boundary_forcing), local, map);
            let partition = DirichletPartition::from_indices(&coupled_dirichlet, DVectorView::from(&forcing))?;

            // K_ff u_f = -(K g)_f
            let k_ff = partition.strip_rows_and_cols(&operator)?;
            let lifting = &operator * partition.offset();
            let rhs = -partition.strip_rows(DVectorView::from(&lifting))?;
            let u_free = k_ff
                .lu()
                .solve(&rhs)
                .ok_or_else(|| eyre!("singular full-order system at viscosity {}", point.viscosity))?;
            let coupled = partition.lift(DVectorView::from(&u_free))?;
            let u = self
                .coupling
                .to_local(DVectorView::from(&coupled), local, map);

            if self.linearization == Linearization::Stokes {
                return Ok(u);
            }

            let converged = previous
                .as_ref()
                .map(|prev| (&u - prev).norm() <= tolerance * u.norm())
                .unwrap_or(false);
            debug!("Picard iteration {} at viscosity {}", iteration, point.viscosity);
            if converged {
                return Ok(u);
            }
            field = provider.to_physical(DVectorView::from(&u))?;
            previous = Some(u);
        }

        Err(RomError::NotConverged {
            iterations: self.picard.max_iterations,
        }
        .into())
    }
}

impl<T, P> SnapshotSource<T> for FullOrderSolver<P>
where
    T: Real,
    P: TruthOperatorProvider<T>,
{
    fn layout(&self) -> DofLayout {
        self.provider.layout()
    }

    fn snapshot_at(&self, _index: usize, point: &ParameterPoint<T>) -> eyre::Result<DVector<T>> {
        self.solve(point)
    }
}

/// Maps local full-vector indices to the coupled numbering. Boundary dofs without a global
/// counterpart are dropped.
pub(crate) fn coupled_indices<T, P>(local_indices: &[usize], local: DofLayout, coupling: BoundaryCoupling, provider: &P) -> Vec<usize>
where
    T: Real,
    P: ?Sized + TruthOperatorProvider<T>,
{
    match coupling {
        BoundaryCoupling::LocalBlocks | BoundaryCoupling::GloballyAveraged => local_indices.to_vec(),
        BoundaryCoupling::GloballyAssembled => {
            let map = provider.boundary_map();
            let shift = map.num_global() as isize - local.boundary as isize;
            local_indices
                .iter()
                .filter_map(|&i| {
                    if i < local.boundary {
                        map.global_index(i).map(|(g, _)| g)
                    } else {
                        Some((i as isize + shift) as usize)
                    }
                })
                .collect()
        }
    }
}

/// Externally produced snapshot vectors, e.g. loaded from files by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedSnapshots<T: Real> {
    layout: DofLayout,
    vectors: Vec<DVector<T>>,
}

impl<T: Real> PrecomputedSnapshots<T> {
    pub fn new(layout: DofLayout, vectors: Vec<DVector<T>>) -> Result<Self, RomError> {
        for v in &vectors {
            layout.check_len(v.len(), "precomputed snapshot")?;
        }
        Ok(Self { layout, vectors })
    }
}

impl<T: Real> SnapshotSource<T> for PrecomputedSnapshots<T> {
    fn layout(&self) -> DofLayout {
        self.layout
    }

    fn snapshot_at(&self, index: usize, _point: &ParameterPoint<T>) -> eyre::Result<DVector<T>> {
        self.vectors
            .get(index)
            .cloned()
            .ok_or_else(|| {
                RomError::IndexOutOfBounds {
                    index,
                    len: self.vectors.len(),
                }
                .into()
            })
    }
}

/// Snapshots over a parameter sweep: the snapshot matrix (one local full vector per column) and the
/// physical velocity field of every snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSet<T: Real> {
    layout: DofLayout,
    points: Vec<ParameterPoint<T>>,
    matrix: DMatrix<T>,
    fields: Vec<VelocityField<T>>,
}

impl<T: Real> SnapshotSet<T> {
    /// Obtains one snapshot per parameter point, in order.
    pub fn acquire<S, P>(source: &S, provider: &P, points: &[ParameterPoint<T>]) -> eyre::Result<Self>
    where
        S: ?Sized + SnapshotSource<T>,
        P: ?Sized + TruthOperatorProvider<T>,
    {
        let columns = points
            .iter()
            .enumerate()
            .map(|(index, point)| acquire_one(source, provider, index, point))
            .collect::<eyre::Result<Vec<_>>>()?;
        Self::from_columns(source.layout(), points.to_vec(), columns)
    }

    /// Same as [`acquire`](Self::acquire), with the snapshots obtained in parallel.
    pub fn acquire_par<S, P>(source: &S, provider: &P, points: &[ParameterPoint<T>]) -> eyre::Result<Self>
    where
        S: ?Sized + SnapshotSource<T> + Sync,
        P: ?Sized + TruthOperatorProvider<T> + Sync,
    {
        let columns = points
            .par_iter()
            .enumerate()
            .map(|(index, point)| acquire_one(source, provider, index, point))
            .collect::<eyre::Result<Vec<_>>>()?;
        Self::from_columns(source.layout(), points.to_vec(), columns)
    }

    fn from_columns(
        layout: DofLayout,
        points: Vec<ParameterPoint<T>>,
        columns: Vec<(DVector<T>, VelocityField<T>)>,
    ) -> eyre::Result<Self> {
        let (vectors, fields): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
        Ok(Self::from_parts(layout, points, &vectors, fields)?)
    }

    pub fn from_parts(
        layout: DofLayout,
        points: Vec<ParameterPoint<T>>,
        vectors: &[DVector<T>],
        fields: Vec<VelocityField<T>>,
    ) -> Result<Self, RomError> {
        if vectors.is_empty() {
            return Err(RomError::EmptySnapshotSet);
        }
        for (context, len) in [("snapshot parameter points", points.len()), ("snapshot fields", fields.len())] {
            if len != vectors.len() {
                return Err(RomError::LayoutMismatch {
                    context,
                    expected: vectors.len(),
                    actual: len,
                });
            }
        }
        for v in vectors {
            layout.check_len(v.len(), "snapshot vector")?;
        }
        Ok(Self {
            layout,
            points,
            matrix: DMatrix::from_columns(vectors),
            fields,
        })
    }

    pub fn len(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.ncols() == 0
    }

    pub fn layout(&self) -> DofLayout {
        self.layout
    }

    /// The snapshot matrix in the local layout.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    pub fn vector(&self, index: usize) -> DVector<T> {
        self.matrix.column(index).into_owned()
    }

    pub fn field(&self, index: usize) -> &VelocityField<T> {
        &self.fields[index]
    }

    pub fn point(&self, index: usize) -> &ParameterPoint<T> {
        &self.points[index]
    }

    pub fn points(&self) -> &[ParameterPoint<T>] {
        &self.points
    }

    /// The snapshot matrix with every column converted to the coupled numbering.
    pub fn coupled_matrix<P>(&self, coupling: BoundaryCoupling, provider: &P) -> DMatrix<T>
    where
        P: ?Sized + TruthOperatorProvider<T>,
    {
        let map = provider.boundary_map();
        let columns: Vec<_> = self
            .matrix
            .column_iter()
            .map(|column| coupling.to_coupled(column, self.layout, map))
            .collect();
        DMatrix::from_columns(&columns)
    }
}

fn acquire_one<T, S, P>(
    source: &S,
    provider: &P,
    index: usize,
    point: &ParameterPoint<T>,
) -> eyre::Result<(DVector<T>, VelocityField<T>)>
where
    T: Real,
    S: ?Sized + SnapshotSource<T>,
    P: ?Sized + TruthOperatorProvider<T>,
{
    let vector = source
        .snapshot_at(index, point)
        .wrap_err_with(|| format!("failed to obtain snapshot {}", index))?;
    source.layout().check_len(vector.len(), "snapshot vector")?;
    let field = provider.to_physical(DVectorView::from(&vector))?;
    info!("Snapshot {} acquired (viscosity {})", index, point.viscosity);
    Ok((vector, field))
}
