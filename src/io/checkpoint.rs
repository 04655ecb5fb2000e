//! Checkpoint record sets.
//!
//! Each rank appends bincode-encoded [`CheckpointRecord`]s holding the grid
//! data of its tile to
//! `data_<name>/data_<name>_s<set>_p<rank>.bin`. A set holds at most
//! `max_writes` records; the next write opens set `s + 1`. Sets are numbered
//! from 1.
//!
//! # Example
//!
//! ```ignore
//! use shellconv::io::{CheckpointWriter, FieldRecord};
//!
//! let mut writer = CheckpointWriter::new(&dir, "shell", rank, 10)?;
//! writer.write(iteration, sim_time, vec![FieldRecord::from_field(&t, basis.tile())])?;
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comm::Tile;
use crate::field::Field;

/// Error type for checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// File I/O error
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure
    #[error("checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("max_writes must be positive")]
    ZeroMaxWrites,

    /// A field's grid does not match its declared extents
    #[error("field '{name}': {found} values, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Grid data of one field on one rank's tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    /// Grid components: 1 for scalars, 3 for vectors (φ, θ, r)
    pub ncomp: usize,
    /// First global (φ, θ) index of the tile
    pub start: [usize; 2],
    /// Local (φ, θ, r) extents
    pub extents: [usize; 3],
    /// Values in (component, φ, θ, r) order
    pub data: Vec<f64>,
}

impl FieldRecord {
    /// Copy the grid of `field`. The grid must be current.
    pub fn from_field(field: &Field, tile: &Tile) -> Self {
        Self {
            name: field.name().to_string(),
            ncomp: field.kind().ncomp(),
            start: [tile.phi.start, tile.theta.start],
            extents: [tile.phi.len(), tile.theta.len(), field.radial_size()],
            data: field.grid().to_vec(),
        }
    }

    fn check(&self) -> Result<(), CheckpointError> {
        let expected = self.ncomp * self.extents.iter().product::<usize>();
        if self.data.len() != expected {
            return Err(CheckpointError::SizeMismatch {
                name: self.name.clone(),
                expected,
                found: self.data.len(),
            });
        }
        Ok(())
    }
}

/// One write: simulation clock plus field data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub iteration: usize,
    pub sim_time: f64,
    /// Running write count across all sets, from 1
    pub write_number: usize,
    pub fields: Vec<FieldRecord>,
}

impl CheckpointRecord {
    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Appends records to rotating set files.
#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
    name: String,
    rank: usize,
    max_writes: usize,
    set: usize,
    writes_in_set: usize,
    write_number: usize,
    file: Option<BufWriter<File>>,
}

impl CheckpointWriter {
    /// Create `data_<name>` under `root`. Nothing is written until the first
    /// record.
    pub fn new(
        root: &Path,
        name: &str,
        rank: usize,
        max_writes: usize,
    ) -> Result<Self, CheckpointError> {
        if max_writes == 0 {
            return Err(CheckpointError::ZeroMaxWrites);
        }
        let dir = root.join(format!("data_{}", name));
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            name: name.to_string(),
            rank,
            max_writes,
            set: 0,
            writes_in_set: 0,
            write_number: 0,
            file: None,
        })
    }

    /// Directory holding the set files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of set `set` for this rank.
    pub fn set_path(&self, set: usize) -> PathBuf {
        self.dir
            .join(format!("data_{}_s{}_p{}.bin", self.name, set, self.rank))
    }

    /// Current set number, 0 before the first write.
    pub fn current_set(&self) -> usize {
        self.set
    }

    /// Total records written.
    pub fn writes(&self) -> usize {
        self.write_number
    }

    /// Append a record, rotating to a new set when the current one is full.
    pub fn write(
        &mut self,
        iteration: usize,
        sim_time: f64,
        fields: Vec<FieldRecord>,
    ) -> Result<(), CheckpointError> {
        for field in &fields {
            field.check()?;
        }
        if self.file.is_none() || self.writes_in_set == self.max_writes {
            self.rotate()?;
        }
        self.write_number += 1;
        let record = CheckpointRecord {
            iteration,
            sim_time,
            write_number: self.write_number,
            fields,
        };
        if let Some(file) = self.file.as_mut() {
            bincode::serialize_into(&mut *file, &record)?;
            file.flush()?;
        }
        self.writes_in_set += 1;
        tracing::debug!(
            set = self.set,
            write = self.write_number,
            iteration,
            "wrote checkpoint"
        );
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), CheckpointError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.set += 1;
        self.writes_in_set = 0;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.set_path(self.set))?;
        self.file = Some(BufWriter::new(file));
        Ok(())
    }
}

/// Read every record of a set file.
pub fn read_checkpoint_set(path: &Path) -> Result<Vec<CheckpointRecord>, CheckpointError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    while !reader.fill_buf()?.is_empty() {
        records.push(bincode::deserialize_from(&mut reader)?);
    }
    Ok(records)
}
