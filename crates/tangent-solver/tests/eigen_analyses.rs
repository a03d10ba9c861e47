//! Modal, ill-conditioning and linear-buckling extraction.

mod common;

use common::CompressionColumn;
use tangent_model::{Domain, LoadPattern};
use tangent_solver::{
    presets, BucklingState, LinearBucklingAnalysis, SolutionStrategy, SolveOptions,
};

fn column_domain() -> Domain {
    let mut domain = Domain::new(Box::new(CompressionColumn {
        num_nodes: 6,
        k0: 10.0,
        g: 5.0,
    }));
    let mut axial = LoadPattern::new("N");
    axial.add_nodal_load(5, 0, -50.0);
    domain.cases_mut().define_pattern(axial);
    domain.cases_mut().define_combination("N", "N").unwrap();
    domain
}

#[test]
fn modal_extraction_returns_ascending_eigenvalues() {
    let mut domain = column_domain();
    let mut strategy = SolutionStrategy::new(presets::frequency_analysis(3));
    let status = strategy
        .solve(&mut domain, 3, SolveOptions::default())
        .unwrap();
    assert_eq!(status.code(), 0);

    let pairs = strategy.eigenpairs().expect("modal solve stores eigenpairs");
    assert_eq!(pairs.num_modes(), 3);
    // Free DOFs 1..5 carry k = 10*(i+1), m = 2: lambda = 5*(i+1).
    let expected = [10.0, 15.0, 20.0];
    for (lambda, expected) in pairs.eigenvalues.iter().zip(expected) {
        assert!((lambda - expected).abs() < 1e-8, "{lambda} vs {expected}");
    }
    assert!(pairs.eigenvalues.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn ill_conditioning_exposes_the_stiffness_spectrum() {
    let mut domain = column_domain();
    let mut strategy = SolutionStrategy::new(presets::ill_conditioning(2));
    // The step count of an eigen solve is the requested eigenpair count.
    let status = strategy
        .solve(&mut domain, 2, SolveOptions::default())
        .unwrap();
    assert_eq!(status.code(), 0);
    let pairs = strategy.eigenpairs().unwrap();
    // Smallest stiffness eigenvalue is the first free DOF's 20.0.
    assert!((pairs.eigenvalues[0] - 20.0).abs() < 1e-8);
}

/// Scenario D: four buckling modes of a compression column, ascending.
#[test]
fn buckling_composite_extracts_requested_modes() {
    let mut domain = column_domain();
    let (static_cfg, eigen_cfg) = presets::linear_buckling_pair();
    let mut analysis = LinearBucklingAnalysis::new(static_cfg, eigen_cfg).unwrap();

    let results = analysis.solve_combination(&mut domain, "N", 4).unwrap();
    assert_eq!(results.static_status.code(), 0);
    assert_eq!(results.eigen_status.code(), 0);
    assert_eq!(results.num_modes(), 4);

    // Free DOFs 1..5: critical factors k/g = 2*(i+1) -> 4, 6, 8, 10.
    let expected = [4.0, 6.0, 8.0, 10.0];
    for (lambda, expected) in results.eigenvalues.iter().zip(expected) {
        assert!((lambda - expected).abs() < 1e-8, "{lambda} vs {expected}");
    }
    assert!(results.eigenvalues.windows(2).all(|w| w[0] < w[1]));
    assert!(results.mode_shape(3).is_some());
    assert!(results.mode_shape(4).is_none());

    assert_eq!(analysis.state(), BucklingState::Solved);
    assert_eq!(domain.attached_combination(), None);
}

#[test]
fn buckling_parts_share_one_model_wrapper() {
    let domain = column_domain();
    let (static_cfg, eigen_cfg) = presets::linear_buckling_pair();
    let mut analysis = LinearBucklingAnalysis::new(static_cfg, eigen_cfg).unwrap();

    assert_eq!(analysis.state(), BucklingState::Uninitialized);
    analysis.setup(&domain).unwrap();
    assert_eq!(analysis.state(), BucklingState::AnalysisBound);
    assert!(
        analysis.shares_model_wrapper(),
        "eigen part must hold the static part's wrapper, not its own"
    );
}

#[test]
fn buckling_composite_rejects_mismatched_parts() {
    let (static_cfg, _) = presets::linear_buckling_pair();
    let err = LinearBucklingAnalysis::new(static_cfg.clone(), static_cfg).unwrap_err();
    assert!(err.to_string().contains("eigen part"));
}

#[test]
fn buckling_surfaces_static_failure_without_gating_extraction() {
    // Static part engineered to fail: a one-iteration Newton whose
    // displacement-increment test demands an impossible tolerance.
    let mut domain = column_domain();
    let (_, eigen_cfg) = presets::linear_buckling_pair();
    let mut static_cfg = presets::newton_raphson_static(1e-9, 1);
    static_cfg.convergence_test = Some(tangent_solver::ConvergenceTestSpec {
        kind: tangent_solver::ConvergenceTestKind::NormDispIncr,
        tolerance: 1e-300,
        max_iter: 1,
        print_flag: 0,
    });

    let mut analysis = LinearBucklingAnalysis::new(static_cfg, eigen_cfg).unwrap();
    let results = analysis.solve_combination(&mut domain, "N", 2).unwrap();
    assert!(results.static_status.code() > 0, "static part must fail");
    // Extraction still ran and its outcome is reported alongside.
    assert_eq!(results.eigen_status.code(), 0);
    assert_eq!(results.num_modes(), 2);
    assert_eq!(domain.attached_combination(), None);
}
