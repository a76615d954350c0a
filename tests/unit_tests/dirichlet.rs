use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView};
use proptest::prelude::*;
use saddle_rom::dirichlet::DirichletPartition;
use saddle_rom::proptest::{dof_layout, probe_pair};
use saddle_rom::RomError;

fn view(v: &DVector<f64>) -> DVectorView<f64> {
    DVectorView::from(v)
}

#[test]
fn probe_comparison_classifies_identical_entries_as_fixed() {
    let first = DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0]);
    let second = DVector::from_column_slice(&[1.0, 5.0, 3.0, 7.0]);
    let partition = DirichletPartition::from_probes(view(&first), view(&second), 4).unwrap();

    assert_eq!(partition.fixed_indices(), &[0, 2]);
    assert_eq!(partition.free_indices(), &[1, 3]);
    assert_eq!(partition.num_fixed(), 2);
    assert_eq!(partition.num_free(), 2);
    assert_eq!(partition.offset(), &DVector::from_column_slice(&[1.0, 0.0, 3.0, 0.0]));
    assert_eq!(partition.fixed_values(), DVector::from_column_slice(&[1.0, 3.0]));
    assert_eq!(partition.is_fixed(2), Ok(true));
    assert_eq!(partition.is_fixed(4), Err(RomError::IndexOutOfBounds { index: 4, len: 4 }));
}

#[test]
fn only_boundary_entries_can_be_fixed() {
    // Entries past the boundary block are always free, even if identical
    let first = DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let second = DVector::from_column_slice(&[1.0, 0.0, 3.0, 4.0, 5.0]);
    let partition = DirichletPartition::from_probes(view(&first), view(&second), 2).unwrap();

    assert_eq!(partition.fixed_indices(), &[0]);
    assert_eq!(partition.free_indices(), &[1, 2, 3, 4]);
}

#[test]
fn coincidentally_equal_free_dof_is_misclassified_as_fixed() {
    // Dof 1 is free in the underlying problem, but both probes happen to hold the same value there.
    // Exact comparison cannot tell, and no error is raised.
    let first = DVector::from_column_slice(&[1.0, 0.25, 3.0, 4.0]);
    let second = DVector::from_column_slice(&[1.0, 0.25, 3.0, 7.0]);
    let partition = DirichletPartition::from_probes(view(&first), view(&second), 4).unwrap();

    assert_eq!(partition.fixed_indices(), &[0, 1, 2]);
    assert_eq!(partition.free_indices(), &[3]);

    // Explicit boundary-condition metadata gives the intended partition
    let explicit = DirichletPartition::from_indices(&[0, 2], view(&first)).unwrap();
    assert_eq!(explicit.fixed_indices(), &[0, 2]);
    assert_eq!(explicit.free_indices(), &[1, 3]);
}

#[test]
fn nan_probe_entries_are_free() {
    let first = DVector::from_column_slice(&[f64::NAN, 1.0]);
    let second = DVector::from_column_slice(&[f64::NAN, 1.0]);
    let partition = DirichletPartition::from_probes(view(&first), view(&second), 2).unwrap();
    assert_eq!(partition.fixed_indices(), &[1]);
}

#[test]
fn probe_length_mismatch_is_an_error() {
    let first = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    let second = DVector::from_column_slice(&[1.0, 2.0]);
    assert!(matches!(
        DirichletPartition::from_probes(view(&first), view(&second), 2),
        Err(RomError::LayoutMismatch { .. })
    ));
    assert_eq!(
        DirichletPartition::from_probes(view(&first), view(&first), 4),
        Err(RomError::IndexOutOfBounds { index: 4, len: 3 })
    );
}

#[test]
fn from_indices_validates_and_deduplicates() {
    let values = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    let partition = DirichletPartition::from_indices(&[2, 0, 2], view(&values)).unwrap();
    assert_eq!(partition.fixed_indices(), &[0, 2]);
    assert_eq!(partition.free_indices(), &[1]);

    assert_eq!(
        DirichletPartition::from_indices(&[3], view(&values)),
        Err(RomError::IndexOutOfBounds { index: 3, len: 3 })
    );
}

#[test]
fn strip_and_lift() {
    let values = DVector::from_column_slice(&[10.0, 20.0, 30.0, 40.0]);
    let partition = DirichletPartition::from_indices(&[1, 3], view(&values)).unwrap();

    let matrix = DMatrix::from_fn(4, 4, |i, j| (4 * i + j) as f64);
    let stripped = partition.strip_rows_and_cols(&matrix).unwrap();
    assert_matrix_eq!(stripped, DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 8.0, 10.0]));

    let rows = partition.strip_matrix_rows(&matrix).unwrap();
    assert_eq!(rows.shape(), (2, 4));
    let free_fixed = partition.free_fixed_block(&matrix).unwrap();
    assert_matrix_eq!(free_fixed, DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 9.0, 11.0]));

    let free = DVector::from_column_slice(&[-1.0, -2.0]);
    let lifted = partition.lift(view(&free)).unwrap();
    assert_eq!(lifted, DVector::from_column_slice(&[-1.0, 20.0, -2.0, 40.0]));

    let too_short = DVector::from_column_slice(&[1.0]);
    assert!(matches!(
        partition.lift(view(&too_short)),
        Err(RomError::LayoutMismatch { .. })
    ));
    assert!(matches!(
        partition.strip_rows(view(&too_short)),
        Err(RomError::LayoutMismatch { .. })
    ));
}

proptest! {
    #[test]
    fn partition_is_complete_and_disjoint((len, (first, second)) in dof_layout(6)
        .prop_flat_map(|layout| (Just(layout.boundary), probe_pair(layout))))
    {
        let partition = DirichletPartition::from_probes(view(&first), view(&second), len).unwrap();
        let mut all: Vec<_> = partition.fixed_indices().iter()
            .chain(partition.free_indices())
            .copied()
            .collect();
        all.sort_unstable();
        let expected: Vec<_> = (0..first.len()).collect();
        prop_assert_eq!(all, expected);
        prop_assert_eq!(partition.num_fixed() + partition.num_free(), first.len());

        for &i in partition.fixed_indices() {
            prop_assert!(i < len);
            prop_assert_eq!(partition.is_fixed(i), Ok(true));
            prop_assert_eq!(first[i], second[i]);
        }
        for &i in partition.free_indices() {
            prop_assert_eq!(partition.is_fixed(i), Ok(false));
        }
    }

    #[test]
    fn lift_with_own_fixed_entries_round_trips((len, (v, other)) in dof_layout(6)
        .prop_flat_map(|layout| (Just(layout.boundary), probe_pair(layout))))
    {
        let partition = DirichletPartition::from_probes(view(&v), view(&other), len).unwrap();
        let stripped = partition.strip_rows(view(&v)).unwrap();
        let lifted = partition.lift_with(view(&stripped), view(&v)).unwrap();
        prop_assert_eq!(lifted, v.clone());

        // The stored offset holds the fixed entries of the first probe
        let lifted = partition.lift(view(&stripped)).unwrap();
        prop_assert_eq!(lifted, v);
    }
}
