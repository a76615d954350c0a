//! The seam to the full-order ("truth") discretization.
//!
//! Element-level machinery (boundary/interior maps, derivative operators, static condensation)
//! lives behind [`TruthOperatorProvider`]. This crate only places the returned blocks into saddle-point
//! operators, see [`assemble_operator`](crate::assembly::assemble_operator).
use crate::layout::{BoundaryMap, DofLayout};
use crate::{Real, RomError};
use nalgebra::{DMatrix, DVector, DVectorView};
use serde::{Deserialize, Serialize};

/// A point in parameter space.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint<T> {
    /// The physical coefficient (kinematic viscosity).
    pub viscosity: T,
    /// Optional geometric shape parameter.
    pub geometry: Option<T>,
}

impl<T> ParameterPoint<T> {
    pub fn new(viscosity: T) -> Self {
        Self {
            viscosity,
            geometry: None,
        }
    }

    pub fn with_geometry(viscosity: T, geometry: T) -> Self {
        Self {
            viscosity,
            geometry: Some(geometry),
        }
    }
}

/// Two velocity components sampled at the physical (quadrature) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityField<T: Real> {
    pub x: DVector<T>,
    pub y: DVector<T>,
}

impl<T: Real> VelocityField<T> {
    pub fn new(x: DVector<T>, y: DVector<T>) -> Self {
        assert_eq!(x.len(), y.len(), "Velocity components must have the same number of points.");
        Self { x, y }
    }

    pub fn zeros(num_points: usize) -> Self {
        Self::new(DVector::zeros(num_points), DVector::zeros(num_points))
    }

    pub fn num_points(&self) -> usize {
        self.x.len()
    }

    /// Euclidean norm over both components.
    pub fn norm(&self) -> T {
        (self.x.norm_squared() + self.y.norm_squared()).sqrt()
    }
}

/// A velocity block split into its diffusive and advective contributions.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBlock<T: Real> {
    /// Linear in the physical coefficient.
    pub diffusive: DMatrix<T>,
    /// Linear in the advecting field, independent of the physical coefficient.
    pub advective: DMatrix<T>,
}

impl<T: Real> SplitBlock<T> {
    pub fn new(diffusive: DMatrix<T>, advective: DMatrix<T>) -> Self {
        assert_eq!(diffusive.shape(), advective.shape());
        Self { diffusive, advective }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.diffusive.shape()
    }

    pub fn complete(&self) -> DMatrix<T> {
        &self.diffusive + &self.advective
    }
}

/// Element-wise blocks of the saddle-point operator, in the local boundary numbering.
///
/// With `nb`, `np`, `ni` the local boundary, pressure and interior sizes:
/// `a` is `nb × nb`, `b` and `c` are `nb × ni`, `d` is `ni × ni`, `d_bnd` is `np × nb` and
/// `d_int` is `np × ni`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaddlePointBlocks<T: Real> {
    pub a: SplitBlock<T>,
    pub b: SplitBlock<T>,
    pub c: SplitBlock<T>,
    pub d: SplitBlock<T>,
    pub d_bnd: DMatrix<T>,
    pub d_int: DMatrix<T>,
    /// Dirichlet data over the local full dof layout.
    pub boundary_forcing: DVector<T>,
}

impl<T: Real> SaddlePointBlocks<T> {
    /// The layout implied by the block shapes.
    pub fn layout(&self) -> DofLayout {
        DofLayout::new(self.a.shape().0, self.d_bnd.nrows(), self.d.shape().0)
    }

    /// Checks that the block shapes agree with the layout implied by `a`, `d_bnd` and `d`.
    pub fn check_consistent(&self) -> Result<(), RomError> {
        let DofLayout {
            boundary: nb,
            pressure: np,
            interior: ni,
        } = self.layout();
        check_shape("A block", self.a.shape(), (nb, nb))?;
        check_shape("B block", self.b.shape(), (nb, ni))?;
        check_shape("C block", self.c.shape(), (nb, ni))?;
        check_shape("D block", self.d.shape(), (ni, ni))?;
        check_shape("Dbnd block", self.d_bnd.shape(), (np, nb))?;
        check_shape("Dint block", self.d_int.shape(), (np, ni))?;
        if self.boundary_forcing.len() != nb + np + ni {
            return Err(RomError::LayoutMismatch {
                context: "boundary forcing",
                expected: nb + np + ni,
                actual: self.boundary_forcing.len(),
            });
        }
        Ok(())
    }
}

fn check_shape(context: &'static str, shape: (usize, usize), expected: (usize, usize)) -> Result<(), RomError> {
    let (expected, actual) = if shape.0 != expected.0 {
        (expected.0, shape.0)
    } else if shape.1 != expected.1 {
        (expected.1, shape.1)
    } else {
        return Ok(());
    };
    Err(RomError::LayoutMismatch {
        context,
        expected,
        actual,
    })
}

/// Full-order discretization consumed by the reduced-order pipeline.
pub trait TruthOperatorProvider<T: Real> {
    /// Element-local layout of full dof vectors.
    fn layout(&self) -> DofLayout;

    /// Local-to-global map of the boundary dofs.
    fn boundary_map(&self) -> &BoundaryMap;

    /// Number of physical points of the velocity fields produced by [`to_physical`](Self::to_physical).
    fn num_physical_points(&self) -> usize;

    fn assemble(&self, point: &ParameterPoint<T>, field: &VelocityField<T>) -> eyre::Result<SaddlePointBlocks<T>>;

    /// Maps the velocity dofs (boundary and interior blocks) of a local full vector to physical space.
    fn to_physical(&self, full: DVectorView<T>) -> eyre::Result<VelocityField<T>>;

    /// Indices (into the local full vector) fixed by boundary conditions, if known.
    fn dirichlet_dofs(&self) -> Option<Vec<usize>> {
        None
    }
}

impl<'a, T, P> TruthOperatorProvider<T> for &'a P
where
    T: Real,
    P: ?Sized + TruthOperatorProvider<T>,
{
    fn layout(&self) -> DofLayout {
        <P as TruthOperatorProvider<T>>::layout(self)
    }

    fn boundary_map(&self) -> &BoundaryMap {
        <P as TruthOperatorProvider<T>>::boundary_map(self)
    }

    fn num_physical_points(&self) -> usize {
        <P as TruthOperatorProvider<T>>::num_physical_points(self)
    }

    fn assemble(&self, point: &ParameterPoint<T>, field: &VelocityField<T>) -> eyre::Result<SaddlePointBlocks<T>> {
        <P as TruthOperatorProvider<T>>::assemble(self, point, field)
    }

    fn to_physical(&self, full: DVectorView<T>) -> eyre::Result<VelocityField<T>> {
        <P as TruthOperatorProvider<T>>::to_physical(self, full)
    }

    fn dirichlet_dofs(&self) -> Option<Vec<usize>> {
        <P as TruthOperatorProvider<T>>::dirichlet_dofs(self)
    }
}
