//! End-to-end dynamic batches: per-tick rows and live input injection.

mod common;

use common::{Op, Playback, StubEngine};
use simbatch::{units, BatchRunner, RunnerConfig, Trial, Value};
use std::sync::Arc;

fn tick(hours: f64, snhx: f64) -> Playback {
    let clock = hours * units::HOUR;
    Playback::Telemetry(format!("Engine__Time = {clock}|Effluent__SNHx = {snhx}"))
}

fn finished() -> Playback {
    Playback::Status("530004 Simulation finished".to_string())
}

#[test]
fn test_three_ticks_three_rows_three_injections_per_function() {
    let _guard = common::session_guard();

    let engine = Arc::new(StubEngine::new());
    engine.play(vec![
        tick(1.0, 5.0),
        tick(2.0, 4.5),
        tick(3.0, 4.1),
        finished(),
    ]);

    let trial = Trial::builder("Trial1", 1.0 * units::DAY, 1.0 * units::HOUR)
        .snapshot("snapshot_0.xml")
        .param("Influent__Q", 24000.0)
        .input_function("Influent__TKN", |t| {
            32.0 + 10.0 / (1.0 + (-5.0 * (t - 0.01)).exp())
        })
        .input_function("Influent__TCOD", |t| 50.0f64.mul_add((20.0 * t).sin(), 400.0))
        .timeseries_file("influent_table.tsv")
        .build();

    let mut runner = BatchRunner::new(
        Arc::clone(&engine) as Arc<dyn simbatch::Engine>,
        "plant.dll",
        ["Effluent__SNHx"],
        RunnerConfig::new(),
    )
    .unwrap();

    let report = runner.run_dynamic(vec![trial]).unwrap();
    let table = report.trial_table("Trial1").unwrap();

    // One row per telemetry tick, in non-decreasing simulation-time order.
    assert_eq!(table.len(), 3);
    let times: Vec<f64> = table.rows().iter().map(|r| r.time().unwrap()).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    // Clock is normalized to days in the exported rows.
    assert!((times[0] - 1.0 / 24.0).abs() < 1e-12);
    assert!((times[2] - 3.0 / 24.0).abs() < 1e-12);

    // Constant parameters ride along as metadata in every row.
    for row in table.rows() {
        assert_eq!(row.get("Influent__Q"), Some(&Value::Number(24000.0)));
    }

    // Exactly one live set per registered function per tick.
    let job = engine
        .ops()
        .iter()
        .find_map(|op| match op {
            Op::Submit(id, _) => Some(*id),
            _ => None,
        })
        .unwrap();
    let commands = engine.commands_for(job);
    let tkn_sets = commands
        .iter()
        .filter(|c| c.starts_with("set Influent__TKN "))
        .count();
    let tcod_sets = commands
        .iter()
        .filter(|c| c.starts_with("set Influent__TCOD "))
        .count();
    assert_eq!(tkn_sets, 3);
    assert_eq!(tcod_sets, 3);
    assert_eq!(commands.len(), 6);

    assert_eq!(runner.registry().outstanding_count(), 0);
    // Dynamic batches release all metadata on completion.
    assert!(runner.registry().is_empty());
}

#[test]
fn test_dynamic_script_and_injection_ordering() {
    let _guard = common::session_guard();

    let engine = Arc::new(StubEngine::new());
    engine.play(vec![tick(1.0, 5.0), finished()]);

    let trial = Trial::builder("T", 1.0 * units::DAY, 1.0 * units::HOUR)
        .snapshot("base.xml")
        .param("DOSP", 2.0)
        .input_function("TKN", |_| 33.0)
        .input_function("TCOD", |_| 410.0)
        .timeseries_file("a.tsv")
        .build();

    let mut runner = BatchRunner::new(
        Arc::clone(&engine) as Arc<dyn simbatch::Engine>,
        "plant.dll",
        ["Effluent__SNHx"],
        RunnerConfig::new(),
    )
    .unwrap();
    runner.run_dynamic(vec![trial]).unwrap();

    let ops = engine.ops();
    let Op::Submit(job, script) = &ops[0] else {
        panic!("first op should be the submission");
    };
    assert_eq!(
        script,
        "load base.xml;maptoic;loadtsv a.tsv;mode dynamic;set DOSP 2;\
         set Engine__StopTime 86400000;set Engine__DataComm 3600000;start"
    );

    // Injections follow registration order within the tick.
    let commands = engine.commands_for(*job);
    assert_eq!(commands, vec!["set TKN 33", "set TCOD 410"]);

    // Engine-side release happens after the terminal status.
    assert_eq!(ops.last(), Some(&Op::Finish(*job)));
}

#[test]
fn test_two_trials_get_separate_tables() {
    let _guard = common::session_guard();

    let engine = Arc::new(StubEngine::new());
    engine.play(vec![tick(1.0, 5.0), tick(2.0, 4.0), finished()]);
    engine.play(vec![tick(1.0, 7.0), finished()]);

    let trials = vec![
        Trial::builder("Trial1", 1.0 * units::DAY, 1.0 * units::HOUR).build(),
        Trial::builder("Trial2", 1.0 * units::DAY, 1.0 * units::HOUR).build(),
    ];

    let mut runner = BatchRunner::new(
        Arc::clone(&engine) as Arc<dyn simbatch::Engine>,
        "plant.dll",
        ["Effluent__SNHx"],
        RunnerConfig::new(),
    )
    .unwrap();
    let report = runner.run_dynamic(trials).unwrap();

    assert_eq!(report.trial_table("Trial1").unwrap().len(), 2);
    assert_eq!(report.trial_table("Trial2").unwrap().len(), 1);
    assert_eq!(
        report.trial_table("Trial2").unwrap().rows()[0].get("Effluent__SNHx"),
        Some(&Value::Number(7.0))
    );
}

#[test]
fn test_tick_without_clock_degrades_but_completes() {
    let _guard = common::session_guard();

    let engine = Arc::new(StubEngine::new());
    engine.play(vec![
        Playback::Telemetry("Effluent__SNHx = 5.0".to_string()),
        tick(1.0, 4.0),
        finished(),
    ]);

    let trial = Trial::builder("T", 1.0 * units::DAY, 1.0 * units::HOUR)
        .input_function("TKN", |_| 33.0)
        .build();

    let mut runner = BatchRunner::new(
        Arc::clone(&engine) as Arc<dyn simbatch::Engine>,
        "plant.dll",
        ["Effluent__SNHx"],
        RunnerConfig::new(),
    )
    .unwrap();
    let report = runner.run_dynamic(vec![trial]).unwrap();

    // The clockless line is dropped and reported; the good tick lands.
    assert_eq!(report.trial_table("T").unwrap().len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("clock"));
}
