//! Placement of element blocks into full saddle-point operators.
//!
//! Rows and columns of the assembled operator are ordered `[boundary | pressure | interior]`:
//!
//! ```text
//! [  A      -Dbndᵀ    B  ]
//! [ -Dbnd     0     -Dint ]
//! [  Cᵀ     -Dintᵀ    D  ]
//! ```
//!
//! How the element-local boundary dofs are coupled is decided by [`BoundaryCoupling`].
use crate::layout::{BoundaryMap, DofLayout};
use crate::provider::{ParameterPoint, SaddlePointBlocks, SplitBlock, TruthOperatorProvider, VelocityField};
use crate::{Real, RomError};
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// How inter-element coupling of boundary dofs is enforced in the assembled operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryCoupling {
    /// Element blocks are used as-is. No coupling between elements.
    LocalBlocks,
    /// Boundary rows are premultiplied by `M Mᵀ`, keeping the local boundary numbering.
    #[default]
    GloballyAveraged,
    /// Boundary rows and columns are transformed to the global boundary numbering with `M`.
    GloballyAssembled,
}

impl BoundaryCoupling {
    /// Number of boundary dofs in the coupled numbering.
    pub fn boundary_size(&self, map: &BoundaryMap) -> usize {
        match self {
            BoundaryCoupling::LocalBlocks | BoundaryCoupling::GloballyAveraged => map.num_local(),
            BoundaryCoupling::GloballyAssembled => map.num_global(),
        }
    }

    /// The layout of full vectors in the coupled numbering.
    pub fn layout(&self, local: DofLayout, map: &BoundaryMap) -> DofLayout {
        local.with_boundary(self.boundary_size(map))
    }

    /// Converts a full vector from the local to the coupled numbering.
    pub fn to_coupled<T: Real>(&self, local_full: DVectorView<T>, local: DofLayout, map: &BoundaryMap) -> DVector<T> {
        assert_eq!(local_full.len(), local.total());
        match self {
            BoundaryCoupling::LocalBlocks | BoundaryCoupling::GloballyAveraged => local_full.clone_owned(),
            BoundaryCoupling::GloballyAssembled => {
                let coupled = self.layout(local, map);
                let mut full = DVector::zeros(coupled.total());
                full.rows_mut(0, coupled.boundary)
                    .copy_from(&map.gather(local_full.rows(0, local.boundary)));
                let rest = local.pressure + local.interior;
                full.rows_mut(coupled.boundary, rest)
                    .copy_from(&local_full.rows(local.boundary, rest));
                full
            }
        }
    }

    /// Converts a full vector from the coupled to the local numbering.
    pub fn to_local<T: Real>(&self, coupled_full: DVectorView<T>, local: DofLayout, map: &BoundaryMap) -> DVector<T> {
        match self {
            BoundaryCoupling::LocalBlocks | BoundaryCoupling::GloballyAveraged => coupled_full.clone_owned(),
            BoundaryCoupling::GloballyAssembled => {
                let coupled = self.layout(local, map);
                assert_eq!(coupled_full.len(), coupled.total());
                let mut full = DVector::zeros(local.total());
                full.rows_mut(0, local.boundary)
                    .copy_from(&map.scatter(coupled_full.rows(0, coupled.boundary)));
                let rest = local.pressure + local.interior;
                full.rows_mut(local.boundary, rest)
                    .copy_from(&coupled_full.rows(coupled.boundary, rest));
                full
            }
        }
    }
}

/// Selects which sub-blocks enter an assembled operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperatorParts {
    pub pressure: bool,
    pub diffusive: bool,
    pub advective: bool,
}

impl OperatorParts {
    pub const COMPLETE: Self = Self {
        pressure: true,
        diffusive: true,
        advective: true,
    };
    /// Pressure coupling only (`Dbnd`, `Dint`).
    pub const PRESSURE: Self = Self {
        pressure: true,
        diffusive: false,
        advective: false,
    };
    /// Diffusive parts of the velocity blocks `A`, `B`, `C`, `D`.
    pub const DIFFUSIVE: Self = Self {
        pressure: false,
        diffusive: true,
        advective: false,
    };
    /// Advective parts of the velocity blocks `A`, `B`, `C`, `D`.
    pub const ADVECTIVE: Self = Self {
        pressure: false,
        diffusive: false,
        advective: true,
    };
    pub const NO_ADVECTION: Self = Self {
        pressure: true,
        diffusive: true,
        advective: false,
    };

    fn select<T: Real>(&self, block: &SplitBlock<T>) -> Option<DMatrix<T>> {
        match (self.diffusive, self.advective) {
            (true, true) => Some(block.complete()),
            (true, false) => Some(block.diffusive.clone()),
            (false, true) => Some(block.advective.clone()),
            (false, false) => None,
        }
    }
}

impl BitOr for OperatorParts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            pressure: self.pressure || rhs.pressure,
            diffusive: self.diffusive || rhs.diffusive,
            advective: self.advective || rhs.advective,
        }
    }
}

/// Assembles the full saddle-point operator from element blocks.
///
/// Returns an error if the block shapes are inconsistent or the boundary map does not match the
/// boundary block size.
pub fn assemble_operator<T: Real>(
    blocks: &SaddlePointBlocks<T>,
    parts: OperatorParts,
    coupling: BoundaryCoupling,
    map: &BoundaryMap,
) -> Result<DMatrix<T>, RomError> {
    blocks.check_consistent()?;
    let local = blocks.layout();
    if map.num_local() != local.boundary {
        return Err(RomError::LayoutMismatch {
            context: "boundary map",
            expected: local.boundary,
            actual: map.num_local(),
        });
    }

    let coupled = coupling.layout(local, map);
    let (nb, np, ni) = (coupled.boundary, coupled.pressure, coupled.interior);
    let (p0, i0) = (coupled.pressure_offset(), coupled.interior_offset());

    // Boundary rows are transformed by `left`, boundary columns by `right`
    let scatter = map.scatter_matrix::<T>();
    let (left, right) = match coupling {
        BoundaryCoupling::LocalBlocks => (None, None),
        BoundaryCoupling::GloballyAveraged => (Some(&scatter * scatter.transpose()), None),
        BoundaryCoupling::GloballyAssembled => (Some(scatter.transpose()), Some(scatter.clone())),
    };
    let bnd_rows = |x: DMatrix<T>| match &left {
        Some(l) => l * x,
        None => x,
    };
    let bnd_cols = |x: DMatrix<T>| match &right {
        Some(r) => x * r,
        None => x,
    };

    let mut k = DMatrix::zeros(coupled.total(), coupled.total());

    if let Some(a) = parts.select(&blocks.a) {
        k.view_mut((0, 0), (nb, nb)).copy_from(&bnd_cols(bnd_rows(a)));
    }
    if let Some(b) = parts.select(&blocks.b) {
        k.view_mut((0, i0), (nb, ni)).copy_from(&bnd_rows(b));
    }
    if let Some(c) = parts.select(&blocks.c) {
        k.view_mut((i0, 0), (ni, nb))
            .copy_from(&bnd_cols(c.transpose()));
    }
    if let Some(d) = parts.select(&blocks.d) {
        k.view_mut((i0, i0), (ni, ni)).copy_from(&d);
    }
    if parts.pressure {
        k.view_mut((0, p0), (nb, np))
            .copy_from(&-bnd_rows(blocks.d_bnd.transpose()));
        k.view_mut((p0, 0), (np, nb))
            .copy_from(&-bnd_cols(blocks.d_bnd.clone()));
        k.view_mut((p0, i0), (np, ni)).copy_from(&-&blocks.d_int);
        k.view_mut((i0, p0), (ni, np))
            .copy_from(&-blocks.d_int.transpose());
    }

    Ok(k)
}

/// Assembles an operator and the coupled boundary forcing directly from a provider.
pub fn assemble_from_provider<T, P>(
    provider: &P,
    point: &ParameterPoint<T>,
    field: &VelocityField<T>,
    parts: OperatorParts,
    coupling: BoundaryCoupling,
) -> eyre::Result<(DMatrix<T>, DVector<T>)>
where
    T: Real,
    P: ?Sized + TruthOperatorProvider<T>,
{
    let blocks = provider.assemble(point, field)?;
    let map = provider.boundary_map();
    let operator = assemble_operator(&blocks, parts, coupling, map)?;
    let forcing = coupling.to_coupled(DVectorView::from(&blocks.boundary_forcing), blocks.layout(), map);
    Ok((operator, forcing))
}
