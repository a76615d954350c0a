use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, DVectorView};
use saddle_rom::assembly::{assemble_from_provider, BoundaryCoupling, OperatorParts};
use saddle_rom::layout::DofLayout;
use saddle_rom::provider::{ParameterPoint, TruthOperatorProvider};
use saddle_rom::settings::{Linearization, PicardSettings};
use saddle_rom::snapshot::{FullOrderSolver, PrecomputedSnapshots, SnapshotSet, SnapshotSource};
use saddle_rom::RomError;
use util::{training_points, SyntheticProvider};

/// Max-norm of the operator residual over the rows that are not Dirichlet dofs.
fn free_residual(provider: &SyntheticProvider, point: &ParameterPoint<f64>, u: &DVector<f64>) -> f64 {
    let field = provider.to_physical(DVectorView::from(u)).unwrap();
    let (k, _) =
        assemble_from_provider(provider, point, &field, OperatorParts::COMPLETE, BoundaryCoupling::LocalBlocks).unwrap();
    let residual = k * u;
    (0..residual.len())
        .filter(|i| !provider.dirichlet().contains(i))
        .map(|i| residual[i].abs())
        .fold(0.0, f64::max)
}

#[test]
fn picard_iteration_converges_to_nonlinear_solution() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let solver = FullOrderSolver::new(&provider).with_picard_settings(PicardSettings {
        max_iterations: 50,
        tolerance: 1e-13,
    });
    let point = ParameterPoint::new(0.8);
    let u = solver.solve(&point).unwrap();

    assert_eq!(u.len(), provider.layout().total());
    for &i in provider.dirichlet() {
        assert_eq!(u[i], provider.forcing()[i]);
    }
    assert!(free_residual(&provider, &point, &u) < 1e-10);
}

#[test]
fn stokes_solve_ignores_advection() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let point = ParameterPoint::new(1.3);
    let stokes = FullOrderSolver::new(&provider)
        .with_linearization(Linearization::Stokes)
        .solve(&point)
        .unwrap();
    let no_advection = SyntheticProvider::new(4, 1, 3).with_advection_strength(0.0);
    let oseen = FullOrderSolver::new(&no_advection).solve(&point).unwrap();
    assert_matrix_eq!(stokes, oseen, comp = abs, tol = 1e-12);
}

#[test]
fn couplings_agree_for_identity_boundary_map() {
    let provider = SyntheticProvider::new(4, 2, 3);
    let point = ParameterPoint::new(2.0);
    let solve = |coupling| {
        FullOrderSolver::new(&provider)
            .with_coupling(coupling)
            .solve(&point)
            .unwrap()
    };
    let local = solve(BoundaryCoupling::LocalBlocks);
    assert_matrix_eq!(solve(BoundaryCoupling::GloballyAveraged), local.clone(), comp = abs, tol = 1e-12);
    assert_matrix_eq!(solve(BoundaryCoupling::GloballyAssembled), local, comp = abs, tol = 1e-12);
}

#[test]
fn picard_iteration_reports_non_convergence() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let solver = FullOrderSolver::new(&provider).with_picard_settings(PicardSettings {
        max_iterations: 1,
        tolerance: 1e-10,
    });
    let err = solver.solve(&ParameterPoint::new(1.0)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RomError>(),
        Some(&RomError::NotConverged { iterations: 1 })
    );
}

#[test]
fn full_order_solve_needs_dirichlet_dofs() {
    let provider = SyntheticProvider::new(4, 1, 3).without_dirichlet_metadata();
    let point = ParameterPoint::new(1.0);
    assert!(FullOrderSolver::new(&provider).solve(&point).is_err());

    let dofs = SyntheticProvider::new(4, 1, 3).dirichlet().to_vec();
    let u = FullOrderSolver::new(&provider)
        .with_dirichlet_dofs(dofs)
        .solve(&point)
        .unwrap();
    assert!(free_residual(&provider, &point, &u) < 1e-8);
}

#[test]
fn sequential_and_parallel_acquisition_agree() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let solver = FullOrderSolver::new(&provider);
    let points = training_points(5);

    let sequential = SnapshotSet::acquire(&solver, &provider, &points).unwrap();
    let parallel = SnapshotSet::acquire_par(&solver, &provider, &points).unwrap();
    assert_eq!(sequential, parallel);

    assert_eq!(sequential.len(), 5);
    assert_eq!(sequential.layout(), provider.layout());
    assert_eq!(sequential.matrix().shape(), (provider.layout().total(), 5));
    assert_eq!(sequential.points(), points.as_slice());
    for i in 0..sequential.len() {
        let expected = provider
            .to_physical(DVectorView::from(&sequential.vector(i)))
            .unwrap();
        assert_eq!(sequential.field(i), &expected);
        assert_eq!(sequential.point(i).viscosity, points[i].viscosity);
    }
}

#[test]
fn precomputed_snapshots_are_served_by_index() {
    let provider = SyntheticProvider::new(2, 1, 1);
    let layout = provider.layout();
    let vectors: Vec<_> = (0..3)
        .map(|j| DVector::from_fn(layout.total(), |i, _| (i + 10 * j) as f64))
        .collect();
    let source = PrecomputedSnapshots::new(layout, vectors.clone()).unwrap();
    let points = training_points(3);

    assert_eq!(source.snapshot_at(1, &points[1]).unwrap(), vectors[1]);
    let err = source.snapshot_at(3, &points[0]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<RomError>(),
        Some(&RomError::IndexOutOfBounds { index: 3, len: 3 })
    );

    let set = SnapshotSet::acquire(&source, &provider, &points).unwrap();
    assert_eq!(set.vector(2), vectors[2]);

    assert!(matches!(
        PrecomputedSnapshots::<f64>::new(layout, vec![DVector::zeros(3)]),
        Err(RomError::LayoutMismatch { .. })
    ));
}

#[test]
fn snapshot_set_from_parts_validates() {
    let layout = DofLayout::new(1, 1, 1);
    let points = vec![ParameterPoint::new(1.0)];
    let vectors = vec![DVector::from_column_slice(&[1.0, 2.0, 3.0])];
    let provider = SyntheticProvider::new(1, 1, 1);
    let fields = vec![provider.to_physical(DVectorView::from(&vectors[0])).unwrap()];

    assert!(SnapshotSet::from_parts(layout, points.clone(), &vectors, fields.clone()).is_ok());
    assert_eq!(
        SnapshotSet::<f64>::from_parts(layout, vec![], &[], vec![]),
        Err(RomError::EmptySnapshotSet)
    );
    assert!(matches!(
        SnapshotSet::from_parts(layout, vec![], &vectors, fields.clone()),
        Err(RomError::LayoutMismatch { .. })
    ));
    assert!(matches!(
        SnapshotSet::from_parts(layout, points, &[DVector::zeros(2)], fields),
        Err(RomError::LayoutMismatch { .. })
    ));
}

#[test]
fn coupled_snapshot_matrix_matches_local_for_identity_map() {
    let provider = SyntheticProvider::new(4, 1, 3);
    let solver = FullOrderSolver::new(&provider);
    let set = SnapshotSet::acquire(&solver, &provider, &training_points(3)).unwrap();
    for coupling in [
        BoundaryCoupling::LocalBlocks,
        BoundaryCoupling::GloballyAveraged,
        BoundaryCoupling::GloballyAssembled,
    ] {
        assert_eq!(&set.coupled_matrix(coupling, &provider), set.matrix());
    }
}
