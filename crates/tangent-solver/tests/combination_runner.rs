//! Batch execution scenarios for `CombinationRunner`.

mod common;

use common::{spring_chain_domain, CappedSprings};
use tangent_model::{Domain, LoadPattern};
use tangent_solver::{presets, CombinationRunner, SolutionStrategy, SolveOptions, SolveStatus};

/// Five combinations over a capped-spring model; combination C3 demands
/// more than the loaded spring can resist.
fn capped_domain() -> Domain {
    let mut domain = Domain::new(Box::new(CappedSprings {
        num_nodes: 3,
        k: 100.0,
        cap: 0.5,
    }));
    let mut light = LoadPattern::new("L");
    light.add_nodal_load(1, 0, 10.0);
    light.add_nodal_load(2, 0, 10.0);
    let mut heavy = LoadPattern::new("H");
    heavy.add_nodal_load(2, 0, 200.0);
    domain.cases_mut().define_pattern(light);
    domain.cases_mut().define_pattern(heavy);
    for (name, expr) in [
        ("C1", "L"),
        ("C2", "2*L"),
        ("C3", "H"), // above capacity: no equilibrium exists
        ("C4", "3*L"),
        ("C5", "L+0.5*L"),
    ] {
        domain.cases_mut().define_combination(name, expr).unwrap();
    }
    domain
}

/// Scenario A: linear static with defaults, one combination, reactions on.
#[test]
fn linear_static_combination_with_reactions() {
    let mut domain = spring_chain_domain(4, 20.0);
    let mut strategy = SolutionStrategy::new(presets::linear_static());
    let status = strategy
        .solve_combination(&mut domain, "G1", SolveOptions::with_reactions())
        .unwrap();

    assert_eq!(status.code(), 0);
    let reactions = domain.reactions().expect("reactions were requested");
    // The fixed end reacts the full applied load.
    assert!((reactions[0] + 20.0).abs() < 1e-8);
    assert_eq!(domain.attached_combination(), None);
}

/// Scenario B: a Newton solve engineered to never satisfy its test returns
/// a non-zero status without crashing.
#[test]
fn newton_failure_is_reported_as_status() {
    let mut domain = capped_domain();
    let mut strategy = SolutionStrategy::new(presets::newton_raphson_static(1e-9, 10));
    let status = strategy
        .solve_combination(&mut domain, "C3", SolveOptions::default())
        .unwrap();

    assert_eq!(
        status,
        SolveStatus::ConvergenceFailure { iterations: 10 },
        "expected an exhausted iteration budget"
    );
    assert!(status.code() > 0);
    assert_eq!(domain.attached_combination(), None);
}

/// Scenario C: a five-combination batch where #3 fails; the others all
/// produce results and the batch does not abort.
#[test]
fn batch_continues_past_a_failed_combination() {
    let mut domain = capped_domain();
    let mut strategy = SolutionStrategy::new(presets::newton_raphson_static(1e-9, 10));
    let runner = CombinationRunner::new(["C1", "C2", "C3", "C4", "C5"])
        .options(SolveOptions::with_reactions());

    let report = runner.run(&mut strategy, &mut domain).unwrap();
    assert_eq!(report.len(), 5);
    assert_eq!(report.failed_names(), vec!["C3"]);

    for name in ["C1", "C2", "C4", "C5"] {
        let result = report.get(name).unwrap();
        assert_eq!(result.status_code(), 0, "{name}");
        assert!(result.displacements.is_some(), "{name}");
        assert!(result.reactions.is_some(), "{name}");
    }
    let failed = report.get("C3").unwrap();
    assert!(failed.status_code() > 0);
    assert!(failed.displacements.is_none());

    // No residual attachment after the failing combination.
    assert_eq!(domain.attached_combination(), None);
}

#[test]
fn abort_on_failure_stops_after_the_failing_combination() {
    let mut domain = capped_domain();
    let mut strategy = SolutionStrategy::new(presets::newton_raphson_static(1e-9, 10));
    let runner = CombinationRunner::new(["C1", "C2", "C3", "C4", "C5"]).abort_on_failure(true);

    let report = runner.run(&mut strategy, &mut domain).unwrap();
    assert_eq!(report.len(), 3);
    assert!(report.get("C4").is_none());
    assert!(!report.all_succeeded());
}

#[test]
fn combinations_run_in_caller_order() {
    let mut domain = capped_domain();
    let mut strategy = SolutionStrategy::new(presets::newton_raphson_static(1e-9, 10));
    let runner = CombinationRunner::new(["C5", "C1", "C4"]);
    let report = runner.run(&mut strategy, &mut domain).unwrap();
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["C5", "C1", "C4"]);
}

#[test]
fn unknown_combination_is_recorded_fatal_and_stops_the_batch() {
    let mut domain = spring_chain_domain(4, 10.0);
    let mut strategy = SolutionStrategy::new(presets::linear_static());
    let runner = CombinationRunner::new(["G1", "MISSING", "G1"]);

    let report = runner.run(&mut strategy, &mut domain).unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report.get("MISSING").unwrap().status_code(), -3);
    assert_eq!(domain.attached_combination(), None);
}

#[test]
fn invalid_configuration_surfaces_before_any_combination_runs() {
    let mut domain = spring_chain_domain(4, 10.0);
    let mut cfg = presets::linear_static();
    cfg.soe = tangent_solver::SoeKind::BandGeneral; // mismatched solver pairing
    let mut strategy = SolutionStrategy::new(cfg);
    let runner = CombinationRunner::new(["G1"]);

    let err = runner.run(&mut strategy, &mut domain).unwrap_err();
    assert!(err.to_string().contains("pair"));
    assert_eq!(domain.attached_combination(), None);
}

#[test]
fn batch_report_serializes_with_stable_fields() {
    let mut domain = spring_chain_domain(4, 20.0);
    let mut strategy = SolutionStrategy::new(presets::linear_static());
    let runner = CombinationRunner::new(["G1"]).options(SolveOptions::with_reactions());
    let report = runner.run(&mut strategy, &mut domain).unwrap();

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"name\":\"G1\""));
    assert!(json.contains("\"status\""));

    let back: tangent_solver::BatchReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), 1);
    assert!(back.get("G1").unwrap().is_success());
}
