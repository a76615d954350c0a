use eyre::eyre;
use nalgebra::{DMatrix, DVector, DVectorView};
use saddle_rom::geometry::GeometricRegion;
use saddle_rom::layout::{BoundaryMap, DofLayout};
use saddle_rom::provider::{ParameterPoint, SaddlePointBlocks, SplitBlock, TruthOperatorProvider, VelocityField};

/// Smooth deterministic matrix entries in `[-1, 1]`.
fn pattern(rows: usize, cols: usize, a: f64, b: f64, c: f64) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |i, j| f64::sin(a * i as f64 + b * j as f64 + c))
}

/// A small dense saddle-point discretization for tests.
///
/// The velocity dofs `[boundary; interior]` carry the operator `ν s L + α diag(Wx f_x + Wy f_y) S`, where
/// `L` is a symmetric positive definite tridiagonal matrix, `s` a geometric scale, `f` the advecting field and
/// `α` a small advection strength. Even boundary dofs are Dirichlet dofs with fixed nonzero values. The
/// physical field has one point per velocity dof.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    layout: DofLayout,
    map: BoundaryMap,
    dirichlet: Vec<usize>,
    dirichlet_metadata: bool,
    forcing: DVector<f64>,
    laplacian: DMatrix<f64>,
    convection: DMatrix<f64>,
    weights_x: DMatrix<f64>,
    weights_y: DMatrix<f64>,
    physical_x: DMatrix<f64>,
    physical_y: DMatrix<f64>,
    d_bnd: DMatrix<f64>,
    d_int: DMatrix<f64>,
    advection_strength: f64,
    region: GeometricRegion,
}

impl SyntheticProvider {
    pub fn new(boundary: usize, pressure: usize, interior: usize) -> Self {
        assert!(pressure <= interior, "Pressure coupling needs full row rank on the interior block.");
        let layout = DofLayout::new(boundary, pressure, interior);
        let nv = boundary + interior;

        let dirichlet: Vec<usize> = (0..boundary).step_by(2).collect();
        let mut forcing = DVector::zeros(layout.total());
        for &i in &dirichlet {
            forcing[i] = 1.0 + 0.5 * f64::sin(i as f64 + 1.0);
        }

        let laplacian = DMatrix::from_fn(nv, nv, |i, j| match (i as isize - j as isize).abs() {
            0 => 3.0,
            1 => -1.0,
            _ => 0.0,
        });
        let identity = DMatrix::<f64>::identity(nv, nv);
        let d_int = DMatrix::from_fn(pressure, interior, |p, j| {
            let diagonal = if p == j { 1.0 } else { 0.0 };
            diagonal + 0.2 * f64::sin(1.1 * p as f64 + 0.6 * j as f64 + 0.3) / interior as f64
        });

        Self {
            layout,
            map: BoundaryMap::identity(boundary),
            dirichlet,
            dirichlet_metadata: true,
            forcing,
            laplacian,
            convection: pattern(nv, nv, 1.0, 2.0, 0.5),
            weights_x: pattern(nv, nv, 0.9, 1.7, 0.2) / nv as f64,
            weights_y: pattern(nv, nv, 1.3, 0.4, 0.8) / nv as f64,
            physical_x: &identity * 2.0 + pattern(nv, nv, 0.7, 1.9, 0.1) * (1.0 / nv as f64),
            physical_y: &identity * 2.0 + pattern(nv, nv, 1.5, 0.3, 0.9) * (1.0 / nv as f64),
            d_bnd: pattern(pressure, boundary, 0.8, 1.2, 0.4) * 0.5,
            d_int,
            advection_strength: 0.02,
            region: GeometricRegion::Stretched,
        }
    }

    pub fn with_advection_strength(self, advection_strength: f64) -> Self {
        Self {
            advection_strength,
            ..self
        }
    }

    /// Replaces the identity boundary map, e.g. to let several local boundary dofs share a global dof.
    ///
    /// The blocks stay in the local numbering, so shared copies are only tied together by a coupling
    /// that assembles through the map.
    pub fn with_boundary_map(self, map: BoundaryMap) -> Self {
        assert_eq!(map.num_local(), self.layout.boundary, "Boundary map must cover every boundary dof.");
        Self { map, ..self }
    }

    /// Hide the Dirichlet dofs from consumers of the provider.
    pub fn without_dirichlet_metadata(self) -> Self {
        Self {
            dirichlet_metadata: false,
            ..self
        }
    }

    pub fn dirichlet(&self) -> &[usize] {
        &self.dirichlet
    }

    pub fn forcing(&self) -> &DVector<f64> {
        &self.forcing
    }

    fn velocity_dofs(&self, full: DVectorView<f64>) -> DVector<f64> {
        let DofLayout {
            boundary: nb,
            interior: ni,
            ..
        } = self.layout;
        let mut velocity = DVector::zeros(nb + ni);
        velocity
            .rows_mut(0, nb)
            .copy_from(&full.rows(0, nb));
        velocity
            .rows_mut(nb, ni)
            .copy_from(&full.rows(self.layout.interior_offset(), ni));
        velocity
    }

    /// Splits an operator over the velocity dofs into the `A`, `B`, `C`, `D` blocks.
    fn split(&self, velocity_operator: &DMatrix<f64>) -> [DMatrix<f64>; 4] {
        let (nb, ni) = (self.layout.boundary, self.layout.interior);
        [
            velocity_operator.view((0, 0), (nb, nb)).into_owned(),
            velocity_operator.view((0, nb), (nb, ni)).into_owned(),
            velocity_operator
                .view((nb, 0), (ni, nb))
                .transpose(),
            velocity_operator.view((nb, nb), (ni, ni)).into_owned(),
        ]
    }
}

impl TruthOperatorProvider<f64> for SyntheticProvider {
    fn layout(&self) -> DofLayout {
        self.layout
    }

    fn boundary_map(&self) -> &BoundaryMap {
        &self.map
    }

    fn num_physical_points(&self) -> usize {
        self.layout.boundary + self.layout.interior
    }

    fn assemble(&self, point: &ParameterPoint<f64>, field: &VelocityField<f64>) -> eyre::Result<SaddlePointBlocks<f64>> {
        if field.num_points() != self.num_physical_points() {
            return Err(eyre!(
                "advecting field has {} points, expected {}",
                field.num_points(),
                self.num_physical_points()
            ));
        }
        let scale = match point.geometry {
            Some(w) => 1.0 / self.region.determinant(w)?,
            None => 1.0,
        };

        let diffusive = &self.laplacian * (point.viscosity * scale);
        let weights = &self.weights_x * &field.x + &self.weights_y * &field.y;
        let advective = DMatrix::from_diagonal(&weights) * &self.convection * self.advection_strength;

        let [a_diff, b_diff, c_diff, d_diff] = self.split(&diffusive);
        let [a_adv, b_adv, c_adv, d_adv] = self.split(&advective);
        Ok(SaddlePointBlocks {
            a: SplitBlock::new(a_diff, a_adv),
            b: SplitBlock::new(b_diff, b_adv),
            c: SplitBlock::new(c_diff, c_adv),
            d: SplitBlock::new(d_diff, d_adv),
            d_bnd: self.d_bnd.clone(),
            d_int: self.d_int.clone(),
            boundary_forcing: self.forcing.clone(),
        })
    }

    fn to_physical(&self, full: DVectorView<f64>) -> eyre::Result<VelocityField<f64>> {
        if full.len() != self.layout.total() {
            return Err(eyre!("full vector has length {}, expected {}", full.len(), self.layout.total()));
        }
        let velocity = self.velocity_dofs(full);
        Ok(VelocityField::new(&self.physical_x * &velocity, &self.physical_y * &velocity))
    }

    fn dirichlet_dofs(&self) -> Option<Vec<usize>> {
        self.dirichlet_metadata
            .then(|| self.dirichlet.clone())
    }
}

/// Viscosities spread over `[0.5, 4]`.
pub fn training_viscosities(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 0.5 * f64::powf(8.0, i as f64 / (count.max(2) - 1) as f64))
        .collect()
}

pub fn training_points(count: usize) -> Vec<ParameterPoint<f64>> {
    training_viscosities(count)
        .into_iter()
        .map(ParameterPoint::new)
        .collect()
}
