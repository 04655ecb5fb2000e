//! Explicit run context: communicator, process mesh and output root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comm::{CommError, Communicator, ProcessMesh, SingleProcess};

/// Everything a rank needs to know about its place in the run.
#[derive(Clone)]
pub struct SimulationContext {
    comm: Arc<dyn Communicator>,
    mesh: ProcessMesh,
    root: PathBuf,
}

impl SimulationContext {
    /// Fails if the mesh does not match the communicator.
    pub fn new(
        comm: Arc<dyn Communicator>,
        mesh: ProcessMesh,
        root: impl Into<PathBuf>,
    ) -> Result<Self, CommError> {
        mesh.check_size(comm.size())?;
        Ok(Self {
            comm,
            mesh,
            root: root.into(),
        })
    }

    /// One rank on a 1×1 mesh.
    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self {
            comm: Arc::new(SingleProcess),
            mesh: ProcessMesh::single(),
            root: root.into(),
        }
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn comm_handle(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    pub fn mesh(&self) -> ProcessMesh {
        self.mesh
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Whether this rank writes the shared outputs.
    pub fn is_root(&self) -> bool {
        self.comm.rank() == 0
    }

    /// Directory under which all outputs are written.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("mesh", &self.mesh)
            .field("root", &self.root)
            .finish()
    }
}
