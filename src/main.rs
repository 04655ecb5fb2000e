//! Rotating convection in a spherical shell.
//!
//! Run with: `cargo run --release -- path/to/run.cfg`
//!
//! Outputs are written relative to the working directory. The process mesh `Xn x Yn` from the configuration is realised as one
//! thread per rank.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use shellconv::comm::{ProcessMesh, ThreadMesh};
use shellconv::io::RunConfig;
use shellconv::simulation::{RunSummary, Simulation, SimulationContext};
use shellconv::solver::format_duration;

#[derive(Parser, Debug)]
#[command(name = "shellconv", about = "Rotating convection in a spherical shell")]
struct Cli {
    /// Configuration file with a [parameters] section
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let _ = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();
    let run = RunConfig::read(&cli.config)?;
    run.log();
    let root = Path::new(".");

    let mesh = ProcessMesh::new(run.xn, run.yn);
    let summary = if mesh.size() == 1 {
        let ctx = SimulationContext::single(root);
        Simulation::from_run_config(&run, ctx)?.run()?
    } else {
        let results = ThreadMesh::run(mesh.size(), |comm| {
            let ctx = SimulationContext::new(Arc::new(comm), mesh, root)?;
            Simulation::from_run_config(&run, ctx)?.run()
        });
        let mut root_summary: Option<RunSummary> = None;
        for (rank, result) in results.into_iter().enumerate() {
            match result {
                Ok(summary) if rank == 0 => root_summary = Some(summary),
                Ok(_) => {}
                Err(e) => {
                    error!(rank, "run failed: {}", e);
                    if root_summary.is_none() && rank == 0 {
                        return Err(e.into());
                    }
                }
            }
        }
        root_summary.ok_or("root rank produced no result")?
    };

    info!(
        iterations = summary.iterations,
        final_time = summary.final_time,
        snapshots = summary.snapshots,
        checkpoints = summary.checkpoints,
        "finished in {}",
        format_duration(summary.wall_time)
    );
    if !summary.completed {
        info!("stopped before t_end");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_positional_argument() {
        let cli = Cli::try_parse_from(["shellconv", "runs/shell.cfg"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("runs/shell.cfg"));
        assert!(Cli::try_parse_from(["shellconv"]).is_err());
        assert!(Cli::try_parse_from(["shellconv", "a.cfg", "--output", "out"]).is_err());
        assert!(Cli::try_parse_from(["shellconv", "a.cfg", "b.cfg"]).is_err());
    }
}
