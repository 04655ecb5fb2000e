//! I/O for run configuration, checkpoints and equatorial snapshots.
//!
//! This module provides:
//! - **Run configuration**: INI files with a `[parameters]` section, read with serde
//! - **Checkpoints**: rotating per-rank sets of bincode records
//! - **Snapshots**: equatorial temperature slices rendered to PNG
//!
//! # File Formats
//!
//! ## Configuration Files
//!
//! ```text
//! [parameters]
//! Lmax = 15
//! Nmax = 15
//! Ekman = 1e-3
//! Rayleigh = 1e5
//! Prandtl = 1
//! Xn = 1
//! Yn = 1
//! t_end = 0.1
//! max_dt = 1e-2
//! init_dt = 1e-4
//! timestepper = SBDF2
//! ```
//!
//! ## Checkpoint Sets
//!
//! `data_<name>/data_<name>_s<set>_p<rank>.bin` holds consecutive bincode-encoded
//! records, one per write. A new set is started after `max_writes` records.

mod checkpoint;
mod config_reader;
mod snapshot;

pub use checkpoint::{
    CheckpointError, CheckpointRecord, CheckpointWriter, FieldRecord, read_checkpoint_set,
};
pub use config_reader::{ConfigError, FALLBACK_SAFETY, Parameters, RunConfig, StepControl};
pub use snapshot::{
    EquatorialSlice, PngSnapshotWriter, SnapshotError, SnapshotSink, diverging_rgba,
};
