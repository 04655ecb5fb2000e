//! End-to-end runs of the shell convection driver.
//!
//! Each run starts from the conductive profile with an m = 4 perturbation
//! and integrates for a few dozen steps at low resolution. The base case is
//! subcritical so every step stays well resolved.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use shellconv::comm::{ProcessMesh, ThreadMesh};
use shellconv::io::{RunConfig, read_checkpoint_set};
use shellconv::simulation::{RunError, RunSummary, Simulation, SimulationContext};
use shellconv::time::TimestepError;
use shellconv::time::Timestepper;

const BASE_CONFIG: &str = "\
[parameters]
Lmax = 7
Nmax = 7
Ekman = 1e-3
Rayleigh = 100
Xn = 1
Yn = 1
t_end = 0.005
";

fn write_config(dir: &Path, name: &str, extra: &str) -> std::path::PathBuf {
    let path = dir.join(format!("{}.cfg", name));
    fs::write(&path, format!("{}{}", BASE_CONFIG, extra)).unwrap();
    path
}

fn run_single(run: &RunConfig, root: &Path) -> RunSummary {
    let ctx = SimulationContext::single(root);
    Simulation::from_run_config(run, ctx).unwrap().run().unwrap()
}

#[test]
fn test_adaptive_run_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "shell",
        "max_dt = 1e-3\ninit_dt = 1e-4\ntimestepper = SBDF2\nsafety = 0.4\n",
    );
    let run = RunConfig::read(&path).unwrap();
    assert_eq!(run.name, "shell");
    assert!(!run.timestepper_defaulted);

    let summary = run_single(&run, dir.path());

    assert!(summary.completed);
    assert!(summary.final_time >= run.t_end);
    assert!(summary.iterations > 20);
    assert!(summary.dt_min >= 1e-4 - 1e-15);
    assert!(summary.dt_max <= 1e-3 + 1e-15);

    // energies are sampled every report_cadence iterations
    assert!(!summary.series.is_empty());
    assert!(summary.series.is_time_ordered());
    assert_eq!(summary.series.times()[0], 0.0);
    assert!(summary.series.energies().iter().all(|e| e.is_finite() && *e >= 0.0));

    let series = fs::read_to_string(run.series_path(dir.path())).unwrap();
    let rows: Vec<&str> = series.lines().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].split_whitespace().count(), summary.series.len());

    // the initial snapshot is always written
    assert_eq!(summary.snapshots, 1);
    assert!(run.frames_dir(dir.path()).join("T_0000.png").exists());

    // one checkpoint at iteration 0 fits in the first set
    assert_eq!(summary.checkpoints, 1);
    let set = dir.path().join("data_shell").join("data_shell_s1_p0.bin");
    assert!(set.exists());
    assert!(!dir.path().join("data_shell").join("data_shell_s2_p0.bin").exists());
    let records = read_checkpoint_set(&set).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].iteration, 0);
    assert_eq!(records[0].sim_time, 0.0);
    let temperature = records[0].field("T").unwrap();
    assert_eq!(temperature.ncomp, 1);
    assert_eq!(temperature.extents, [16, 8, 8]);
    assert!(records[0].field("u").is_some());
}

#[test]
fn test_missing_timestepper_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "fallback", "max_dt = 1e-3\ninit_dt = 1e-4\n");
    let run = RunConfig::read(&path).unwrap();
    assert!(run.timestepper_defaulted);
    assert_eq!(run.timestepper, Timestepper::Sbdf2);
    assert_eq!(run.safety, 0.4);

    let summary = run_single(&run, dir.path());
    assert!(summary.completed);
    assert!(summary.series.energies().iter().all(|e| e.is_finite()));
}

#[test]
fn test_fixed_step_variant_caps_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "fixed", "dt = 5e-4\ntimestepper = SBDF3\n");
    let run = RunConfig::read(&path).unwrap();
    let summary = run_single(&run, dir.path());

    assert!(summary.completed);
    // no start-up cap, so the first step is the configured one
    assert!(summary.dt_max <= 5.0 * 5e-4 + 1e-15);
    assert!(summary.final_time >= run.t_end);
}

#[test]
fn test_thread_mesh_matches_single_rank() {
    let single_dir = tempfile::tempdir().unwrap();
    let mesh_dir = tempfile::tempdir().unwrap();
    let text = format!("{}max_dt = 1e-3\ninit_dt = 1e-4\n", BASE_CONFIG);

    let single_run = RunConfig::parse(&text, "single").unwrap();
    let expected = run_single(&single_run, single_dir.path());

    let mesh_run = RunConfig::parse(&text.replace("Xn = 1", "Xn = 2"), "mesh").unwrap();
    let mesh = ProcessMesh::new(mesh_run.xn, mesh_run.yn);
    let results = ThreadMesh::run(mesh.size(), |comm| {
        let ctx = SimulationContext::new(Arc::new(comm), mesh, mesh_dir.path())?;
        Simulation::from_run_config(&mesh_run, ctx)?.run()
    });

    assert_eq!(results.len(), 2);
    for result in results {
        let summary = result.unwrap();
        assert_eq!(summary.iterations, expected.iterations);
        assert_eq!(summary.series.len(), expected.series.len());
        for (a, b) in summary
            .series
            .energies()
            .iter()
            .zip(expected.series.energies())
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-14, max_relative = 1e-8);
        }
    }

    // every rank writes its own checkpoint set
    for rank in 0..2 {
        let set = mesh_dir
            .path()
            .join("data_mesh")
            .join(format!("data_mesh_s1_p{}.bin", rank));
        assert!(set.exists());
    }
    // only the root writes the series and frames
    assert!(mesh_run.series_path(mesh_dir.path()).exists());
}

#[test]
fn test_supercritical_run_finishes_or_reports_divergence() {
    let dir = tempfile::tempdir().unwrap();
    let text = "\
[parameters]
Lmax = 15
Nmax = 15
Ekman = 1e-3
Rayleigh = 1e5
Xn = 1
Yn = 1
t_end = 0.01
max_dt = 1e-2
init_dt = 1e-4
timestepper = SBDF2
";
    let run = RunConfig::parse(text, "supercritical").unwrap();
    let ctx = SimulationContext::single(dir.path());
    match Simulation::from_run_config(&run, ctx).unwrap().run() {
        Ok(summary) => {
            assert!(summary.completed);
            assert!(summary.final_time >= run.t_end);
            assert!(summary.series.energies().iter().all(|e| e.is_finite()));
        }
        Err(RunError::Timestep(TimestepError::NonFiniteFrequency { sim_time, .. })) => {
            assert!(sim_time > 0.0 && sim_time < run.t_end);
        }
        Err(e) => panic!("unexpected failure: {}", e),
    }
}
