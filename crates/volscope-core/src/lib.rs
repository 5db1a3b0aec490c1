//! Core abstractions for volscope.
//!
//! This crate provides the fundamental traits and types used throughout volscope:
//! - [`ParameterStore`] typed parameters with dirty tracking
//! - [`VolumeObject`] trait for committed, sampleable volumes
//! - [`ProcessGroup`] and [`ClusterTopology`] for distributed role coordination
//! - Global state management and the volume registry
//! - Configuration options

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod group;
pub mod local_comm;
pub mod options;
pub mod params;
pub mod registry;
pub mod state;
pub mod volume;

pub use error::{Result, VolscopeError};
pub use group::{ClusterTopology, Communicator, ProcessGroup, ProcessRole, Rank};
pub use local_comm::{local_cluster, single_process, LocalComm, LocalInterComm};
pub use options::Options;
pub use params::{FromParam, ObjectRef, ParamValue, ParameterStore};
pub use registry::Registry;
pub use state::{with_context, with_context_mut, Context};
pub use volume::{VolumeObject, BOUNDING_BOX_MAX, BOUNDING_BOX_MIN};

// Re-export glam types for convenience
pub use glam::{Affine3A, IVec3, Mat3, Vec3, Vec4};
