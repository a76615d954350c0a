use matrixcompare::assert_scalar_eq;
use nalgebra::Matrix2;
use saddle_rom::geometry::{tensor_product_points, viscosity_points, GeometricRegion};
use saddle_rom::RomError;

#[test]
fn jacobians_of_deformed_regions() {
    assert_eq!(
        GeometricRegion::Stretched.jacobian(2.0).unwrap(),
        Matrix2::new(1.0, 0.0, 0.0, 0.5)
    );
    assert_eq!(
        GeometricRegion::Compressed.jacobian(1.0).unwrap(),
        Matrix2::new(1.0, 0.0, 0.0, 1.0)
    );
    assert_eq!(
        GeometricRegion::ShearedDown.jacobian(3.0).unwrap(),
        Matrix2::new(1.0, 0.0, 1.0, 1.0)
    );
    assert_eq!(
        GeometricRegion::ShearedUp.jacobian(3.0).unwrap(),
        Matrix2::new(1.0, 0.0, -1.0, 1.0)
    );
    assert_eq!(GeometricRegion::Fixed.jacobian(7.0).unwrap(), Matrix2::identity());

    // Every region is undeformed at w = 1
    for region in GeometricRegion::ALL {
        assert_eq!(region.jacobian(1.0).unwrap(), Matrix2::identity(), "{}", region.name());
    }
}

#[test]
fn determinants_scale_areas() {
    assert_scalar_eq!(GeometricRegion::Stretched.determinant(4.0).unwrap(), 0.25, comp = float);
    assert_scalar_eq!(GeometricRegion::Compressed.determinant(2.0).unwrap(), 2.0, comp = float);
    assert_scalar_eq!(GeometricRegion::ShearedDown.determinant(0.2).unwrap(), 1.0, comp = float);
    assert_scalar_eq!(GeometricRegion::ShearedUp.determinant(5.0).unwrap(), 1.0, comp = float);
}

#[test]
fn singular_or_non_finite_parameters_are_rejected() {
    assert_eq!(
        GeometricRegion::Stretched.jacobian(0.0),
        Err(RomError::InvalidGeometry {
            region: "stretched",
            value: 0.0
        })
    );
    assert_eq!(
        GeometricRegion::Compressed.determinant(3.0),
        Err(RomError::InvalidGeometry {
            region: "compressed",
            value: 3.0
        })
    );
    for region in GeometricRegion::ALL {
        assert!(matches!(
            region.jacobian(f64::NAN),
            Err(RomError::InvalidGeometry { .. })
        ));
        assert!(region.jacobian(f64::INFINITY).is_err());
    }
}

#[test]
fn parameter_grids() {
    let points = tensor_product_points(&[1.0, 2.0], &[0.1, 0.2, 0.3]);
    let pairs: Vec<_> = points
        .iter()
        .map(|p| (p.geometry, p.viscosity))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Some(1.0), 0.1),
            (Some(1.0), 0.2),
            (Some(1.0), 0.3),
            (Some(2.0), 0.1),
            (Some(2.0), 0.2),
            (Some(2.0), 0.3),
        ]
    );

    let points = viscosity_points(&[0.5, 4.0]);
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|p| p.geometry.is_none()));
    assert_eq!(points[1].viscosity, 4.0);

    assert!(tensor_product_points::<f64>(&[], &[1.0]).is_empty());
}
