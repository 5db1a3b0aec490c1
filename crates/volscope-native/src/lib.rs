//! CPU compute backend for volscope.
//!
//! This crate provides the native objects that committed volumes drive:
//! - [`VolumeKernel`] the call contract between a volume and its kernel
//! - [`BrickedKernel`] ghost-padded bricked storage with trilinear sampling
//! - Voxel element types and transfer functions

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod bricked;
pub mod kernel;
pub mod transfer_function;
pub mod voxel_type;

pub use bricked::{BrickedKernel, BRICK_SIZE, GHOST_WIDTH};
pub use kernel::{AdaptiveSampling, ClipBox, KernelSettings, VolumeKernel};
pub use transfer_function::{TransferFunction, TransferFunctionRegistry};
pub use voxel_type::{Voxel, VoxelType};
