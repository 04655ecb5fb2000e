//! Time integration: SBDF multistep weights and CFL timestep control.

mod cfl;
mod sbdf;

pub use cfl::{AdaptiveTimestep, CflConfig, TimestepError, choose_dt, local_frequency};
pub use sbdf::{IntegratorInfo, StepWeights, Timestepper, sbdf_weights};
