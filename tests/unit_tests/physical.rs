use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView};
use saddle_rom::physical::{PhysicalBasis, ReducedCoordinates};
use saddle_rom::pod::PodBasis;
use saddle_rom::projection::Direction;
use saddle_rom::provider::{TruthOperatorProvider, VelocityField};
use saddle_rom::RomError;
use util::SyntheticProvider;

#[test]
fn orthonormalization_in_column_order() {
    let x = DMatrix::from_row_slice(3, 2, &[3.0, 1.0, 4.0, 1.0, 0.0, 2.0]);
    let y = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 2.0, 0.0, 0.0, 1.0]);
    let basis = PhysicalBasis::orthonormalize(x, y).unwrap();
    assert_eq!(basis.size(), 2);
    assert_eq!(basis.num_points(), 3);

    for direction in Direction::ALL {
        let q = basis.component(direction);
        assert_matrix_eq!(q.tr_mul(q), DMatrix::<f64>::identity(2, 2), comp = abs, tol = 1e-14);
    }
    // The first vector is the normalized first column
    assert_matrix_eq!(
        basis.component(Direction::X).column(0),
        DVector::from_column_slice(&[0.6, 0.8, 0.0]),
        comp = abs,
        tol = 1e-15
    );
    assert_matrix_eq!(
        basis.component(Direction::Y).column(0),
        DVector::from_column_slice(&[0.0, 1.0, 0.0]),
        comp = abs,
        tol = 1e-15
    );
}

#[test]
fn nearly_dependent_columns_stay_orthonormal() {
    // Läuchli matrix: the columns differ only by entries far below their norm
    let eps = 1e-7;
    #[rustfmt::skip]
    let x = DMatrix::from_row_slice(4, 3, &[
        1.0, 1.0, 1.0,
        eps, 0.0, 0.0,
        0.0, eps, 0.0,
        0.0, 0.0, eps,
    ]);
    let y = DMatrix::<f64>::identity(4, 3);
    let basis = PhysicalBasis::orthonormalize(x.clone(), y).unwrap();
    assert!(basis.orthonormality_error() < 1e-10);

    // The leading subspaces are preserved
    let q = basis.component(Direction::X);
    let projected = q * q.tr_mul(&x);
    assert_matrix_eq!(projected, x, comp = abs, tol = 1e-12);
}

#[test]
fn components_of_different_shape_are_rejected() {
    assert_eq!(
        PhysicalBasis::<f64>::orthonormalize(DMatrix::identity(3, 2), DMatrix::identity(4, 2)),
        Err(RomError::LayoutMismatch {
            context: "physical basis components",
            expected: 3,
            actual: 4
        })
    );
}

#[test]
fn dependent_components_are_rejected() {
    let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 2.0]);
    let y = DMatrix::<f64>::identity(2, 2);
    assert_eq!(
        PhysicalBasis::orthonormalize(x.clone(), y.clone()),
        Err(RomError::DegeneratePhysicalBasis {
            direction: Direction::X,
            mode: 1
        })
    );
    assert_eq!(
        PhysicalBasis::orthonormalize(y, DMatrix::zeros(2, 2)),
        Err(RomError::DegeneratePhysicalBasis {
            direction: Direction::Y,
            mode: 0
        })
    );
}

#[test]
fn project_and_reconstruct_fields_in_the_span() {
    let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    let y = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 0.0, 1.0, 1.0, 0.0]);
    let basis = PhysicalBasis::orthonormalize(x.clone(), y.clone()).unwrap();

    let field = VelocityField::new(
        x * DVector::from_column_slice(&[2.0, -1.0]),
        y * DVector::from_column_slice(&[0.5, 3.0]),
    );
    let coordinates = basis.project(&field).unwrap();
    assert_eq!(coordinates.len(), 2);
    let reconstructed = basis.reconstruct(&coordinates);
    assert_matrix_eq!(reconstructed.x, field.x, comp = abs, tol = 1e-13);
    assert_matrix_eq!(reconstructed.y, field.y, comp = abs, tol = 1e-13);

    let unit = basis.unit_field(Direction::Y, 1);
    let unit_coordinates = basis.project(&unit).unwrap();
    assert_matrix_eq!(unit_coordinates.x, DVector::zeros(2), comp = abs, tol = 1e-15);
    assert_matrix_eq!(unit_coordinates.y, DVector::from_column_slice(&[0.0, 1.0]), comp = abs, tol = 1e-14);

    assert!(matches!(
        basis.project(&VelocityField::zeros(4)),
        Err(RomError::LayoutMismatch { .. })
    ));
}

#[test]
fn reduced_coordinates_by_direction() {
    let coordinates = ReducedCoordinates {
        x: DVector::from_column_slice(&[1.0]),
        y: DVector::from_column_slice(&[2.0]),
    };
    assert_eq!(coordinates.get(Direction::X)[0], 1.0);
    assert_eq!(coordinates.get(Direction::Y)[0], 2.0);
    assert!(!coordinates.is_empty());
    assert!(ReducedCoordinates::<f64>::zeros(0).is_empty());
}

#[test]
fn physical_basis_from_pod_modes_spans_mapped_modes() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let total = provider.layout().total();
    let snapshots = DMatrix::from_fn(total, 3, |i, j| f64::sin(0.3 + i as f64 * (j + 1) as f64) + j as f64);
    let pod = PodBasis::compute(&snapshots, 1.0, None).unwrap();
    let basis = PhysicalBasis::from_modes(&provider, &pod, |mode| mode.clone_owned()).unwrap();
    assert_eq!(basis.size(), pod.size());
    assert_eq!(basis.num_points(), provider.num_physical_points());
    assert!(basis.orthonormality_error() < 1e-10);

    // The physical field of every snapshot is represented exactly
    for j in 0..snapshots.ncols() {
        let column = snapshots.column(j).into_owned();
        let field = provider.to_physical(DVectorView::from(&column)).unwrap();
        let reconstructed = basis.reconstruct(&basis.project(&field).unwrap());
        assert_matrix_eq!(reconstructed.x, field.x, comp = abs, tol = 1e-12);
        assert_matrix_eq!(reconstructed.y, field.y, comp = abs, tol = 1e-12);
    }
}
