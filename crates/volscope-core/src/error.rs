//! Error types for volscope.

use glam::IVec3;
use thiserror::Error;

/// The main error type for volscope operations.
///
/// Everything except [`VolscopeError::NativeBackendFailure`] is a
/// caller-correctable precondition violation. Backend failures (including
/// process-group channel failures) leave the process in an unknown state and
/// should be treated as fatal.
#[derive(Error, Debug)]
pub enum VolscopeError {
    /// A call received a null, empty or malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The `dimensions` parameter is missing or not strictly positive.
    #[error("invalid volume dimensions {0} (must be set before the first region write)")]
    InvalidDimensions(IVec3),

    /// The `voxelType` parameter is missing or names an unknown type.
    #[error("unrecognized voxel type '{0}' (must be set before the first region write)")]
    UnrecognizedType(String),

    /// Commit was called before any voxel data was written.
    #[error("volume data must be set via set_region() prior to commit for this volume type")]
    PrecommitRequired,

    /// Commit was called without a required attached object.
    #[error("no {0} specified on the volume")]
    MissingDependency(&'static str),

    /// An operation was called in a state that does not allow it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The compute backend or the group channel reported a failure.
    #[error("native backend failure: {0}")]
    NativeBackendFailure(String),

    /// Global state has already been initialized.
    #[error("volscope already initialized")]
    AlreadyInitialized,

    /// Global state has not been initialized.
    #[error("volscope not initialized - call volscope::init() first")]
    NotInitialized,

    /// A volume with the given name already exists.
    #[error("volume '{0}' already exists")]
    VolumeExists(String),

    /// A volume with the given name was not found.
    #[error("volume '{0}' not found")]
    VolumeNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl VolscopeError {
    /// Returns whether this error leaves the process in an unrecoverable state.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NativeBackendFailure(_))
    }
}

/// A specialized Result type for volscope operations.
pub type Result<T> = std::result::Result<T, VolscopeError>;
