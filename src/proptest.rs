//! Proptest strategies for the data types of the crate.
use crate::assembly::BoundaryCoupling;
use crate::layout::DofLayout;
use crate::settings::{DirichletDetection, Linearization, RomSettings};
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::DVector;

pub fn dof_layout(max_block_size: usize) -> impl Strategy<Value = DofLayout> {
    (0..=max_block_size, 0..=max_block_size, 0..=max_block_size)
        .prop_map(|(boundary, pressure, interior)| DofLayout::new(boundary, pressure, interior))
}

/// A pair of full vectors over `layout` that agree exactly on a random subset of the boundary entries.
///
/// Differing entries differ by at least one, so only the shared entries compare equal.
pub fn probe_pair(layout: DofLayout) -> impl Strategy<Value = (DVector<f64>, DVector<f64>)> {
    let n = layout.total();
    (vec(-10.0..10.0, n), vec(1.0..5.0, n), vec(any::<bool>(), n)).prop_map(|(first, shift, shared)| {
        let first = DVector::from_vec(first);
        let second = DVector::from_iterator(
            first.len(),
            first
                .iter()
                .zip(shift)
                .zip(shared)
                .map(|((&v, s), shared)| if shared { v } else { v + s }),
        );
        (first, second)
    })
}

/// Non-negative values sorted in decreasing order.
pub fn singular_values(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(0.0..100.0, 1..=max_len).prop_map(|mut values| {
        values.sort_by(|a: &f64, b| b.total_cmp(a));
        values
    })
}

pub fn boundary_coupling() -> impl Strategy<Value = BoundaryCoupling> {
    prop_oneof![
        Just(BoundaryCoupling::LocalBlocks),
        Just(BoundaryCoupling::GloballyAveraged),
        Just(BoundaryCoupling::GloballyAssembled),
    ]
}

pub fn linearization() -> impl Strategy<Value = Linearization> {
    prop_oneof![
        Just(Linearization::Stokes),
        Just(Linearization::Oseen),
        Just(Linearization::Newton),
    ]
}

/// Settings that pass [`RomSettings::validate`].
pub fn valid_settings() -> impl Strategy<Value = RomSettings> {
    (2..20usize)
        .prop_flat_map(|n| {
            (
                Just(n),
                0.01..=1.0,
                prop::option::of(1..10usize),
                0..n,
                0.01..100.0,
                linearization(),
                boundary_coupling(),
                (0..n, 1..n),
                any::<bool>(),
            )
        })
        .prop_map(
            |(n, pod_tolerance, basis_size, reference_index, reference_viscosity, linearization, coupling, (first, offset), provider)| {
                let dirichlet = if provider {
                    DirichletDetection::FromProvider
                } else {
                    DirichletDetection::ProbeSnapshots {
                        first,
                        second: (first + offset) % n,
                    }
                };
                RomSettings {
                    number_of_snapshots: n,
                    pod_tolerance,
                    basis_size,
                    reference_index,
                    reference_viscosity,
                    linearization,
                    coupling,
                    dirichlet,
                    ..RomSettings::default()
                }
            },
        )
}
