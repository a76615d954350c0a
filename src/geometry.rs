//! Affine geometry parametrization of subdomains.
//!
//! A geometric parameter `w` deforms each region of the domain by a fixed family of affine maps. Element
//! integrals over a deformed region are pulled back to the reference region with the Jacobian of its map,
//! which keeps the operators affine in the geometric terms.
use crate::provider::ParameterPoint;
use crate::{Real, RomError};
use nalgebra::Matrix2;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// The deformation applied to a region of the domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometricRegion {
    /// Stretched by `w` in the y direction.
    Stretched,
    /// Compressed by `(3 - w) / 2` in the y direction.
    Compressed,
    /// Sheared downwards by `(1 - w) / 2`.
    ShearedDown,
    /// Sheared upwards by `(w - 1) / 2`.
    ShearedUp,
    /// Not deformed.
    Fixed,
}

impl GeometricRegion {
    pub const ALL: [GeometricRegion; 5] = [
        GeometricRegion::Stretched,
        GeometricRegion::Compressed,
        GeometricRegion::ShearedDown,
        GeometricRegion::ShearedUp,
        GeometricRegion::Fixed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GeometricRegion::Stretched => "stretched",
            GeometricRegion::Compressed => "compressed",
            GeometricRegion::ShearedDown => "sheared down",
            GeometricRegion::ShearedUp => "sheared up",
            GeometricRegion::Fixed => "fixed",
        }
    }

    /// The map from deformed to reference coordinates for the geometric parameter `w`.
    ///
    /// Returns an error if `w` is not finite or the map is singular.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn jacobian<T: Real>(&self, w: T) -> Result<Matrix2<T>, RomError> {
        let invalid = || RomError::InvalidGeometry {
            region: self.name(),
            value: nalgebra::try_convert(w).unwrap_or(f64::NAN),
        };
        if !w.is_finite() {
            return Err(invalid());
        }
        let jacobian = match self {
            GeometricRegion::Stretched => {
                if w == 0.0 {
                    return Err(invalid());
                }
                Matrix2::new(1.0, 0.0, 0.0, 1.0 / w)
            }
            GeometricRegion::Compressed => {
                if w == 3.0 {
                    return Err(invalid());
                }
                Matrix2::new(1.0, 0.0, 0.0, 2.0 / (3.0 - w))
            }
            GeometricRegion::ShearedDown => Matrix2::new(1.0, 0.0, -(1.0 - w) / 2.0, 1.0),
            GeometricRegion::ShearedUp => Matrix2::new(1.0, 0.0, -(w - 1.0) / 2.0, 1.0),
            GeometricRegion::Fixed => Matrix2::identity(),
        };
        Ok(jacobian)
    }

    /// Determinant of [`jacobian`](Self::jacobian).
    pub fn determinant<T: Real>(&self, w: T) -> Result<T, RomError> {
        Ok(self.jacobian(w)?.determinant())
    }
}

/// All combinations of geometry and viscosity values.
///
/// Points are ordered with the geometry value varying slowest.
pub fn tensor_product_points<T: Real>(geometry_values: &[T], viscosity_values: &[T]) -> Vec<ParameterPoint<T>> {
    geometry_values
        .iter()
        .flat_map(|&w| {
            viscosity_values
                .iter()
                .map(move |&nu| ParameterPoint::with_geometry(nu, w))
        })
        .collect()
}

/// Parameter points for a list of viscosities without geometric parameter.
pub fn viscosity_points<T: Real>(viscosity_values: &[T]) -> Vec<ParameterPoint<T>> {
    viscosity_values
        .iter()
        .map(|&nu| ParameterPoint::new(nu))
        .collect()
}
