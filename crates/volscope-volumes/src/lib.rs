//! Volume implementations for volscope.
//!
//! This crate provides the volume types applications create and stream data into:
//! - [`Volume`] the parameter/commit lifecycle shared by every volume
//! - [`StructuredBrickVolume`] structured grids stored in ghost-padded bricks,
//!   with region streaming and upsampling

// Volume code intentionally casts between voxel indices and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod structured_brick;
pub mod volume;

pub use structured_brick::{StructuredBrickVolume, UpsampleFilter};
pub use volume::{NativeBinding, Volume, SHININESS_ALIASES, SPECULAR_ALIASES, TRANSFER_FUNCTION};
