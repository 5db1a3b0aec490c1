//! volscope: a distributed, CPU-side bricked volume engine.
//!
//! volscope ingests large structured scalar fields, stores them in a
//! ghost-padded brick layout and answers the sampling queries issued by
//! ray-marching integrators. It also tracks which process of a rendering
//! cluster owns data and which coordinates.
//!
//! # Quick Start
//!
//! ```no_run
//! use volscope::*;
//!
//! fn main() -> Result<()> {
//!     init()?;
//!     init_single_process()?;
//!
//!     let dims = IVec3::splat(16);
//!     let volume = register_structured_volume("density", VoxelType::Float, dims)?;
//!     let voxels = vec![0.5_f32; 16 * 16 * 16];
//!     volume.set_region_typed(&voxels, IVec3::ZERO, dims)?;
//!
//!     if let Some(tf) = transfer_function_preset("viridis") {
//!         volume.set_transfer_function(tf)?;
//!     }
//!     volume.commit()?;
//!     let (lower, upper) = volume.finish()?;
//!     let samples = volume.compute_samples(&[(lower + upper) * 0.5])?;
//!     assert_eq!(samples.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! A volume follows one lifecycle: set parameters, stream regions, commit,
//! finish, sample.
//!
//! - The first region write creates the native brick storage from the
//!   `voxelType` and `dimensions` parameters
//! - [`StructuredVolumeHandle::commit`] pushes shading, sampling, clipping
//!   and transform parameters into the storage
//! - [`StructuredVolumeHandle::finish`] publishes the world-space bounds
//!
//! # Cluster groups
//!
//! [`world()`], [`app()`] and [`worker()`] are the process groups of the
//! running cluster, installed once with [`init_cluster`].

mod cluster;
mod init;
mod volume;

// Re-export core types
pub use volscope_core::{
    error::{Result, VolscopeError},
    group::{ClusterTopology, Communicator, ProcessGroup, ProcessRole, Rank},
    local_comm::{local_cluster, single_process, LocalComm},
    options::Options,
    params::{FromParam, ParamValue, ParameterStore},
    registry::Registry,
    state::{with_context, with_context_mut, Context},
    volume::VolumeObject,
};

// Re-export glam types for convenience
pub use glam::{Affine3A, IVec3, Vec3, Vec4};

// Re-export native types
pub use volscope_native::{
    BrickedKernel, ClipBox, TransferFunction, TransferFunctionRegistry, Voxel, VoxelType,
    BRICK_SIZE,
};

// Re-export volumes
pub use volscope_volumes::{StructuredBrickVolume, UpsampleFilter};

pub use cluster::*;
pub use init::*;
pub use volume::*;
