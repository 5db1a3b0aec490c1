//! Volume trait and related types.
//!
//! A [`VolumeObject`] is a sampled scalar field registered with volscope. It
//! owns a [`ParameterStore`] and an opaque native binding, and follows the
//! same lifecycle everywhere: set parameters and data, [`commit`], then
//! [`finish`] and sample.
//!
//! [`commit`]: VolumeObject::commit
//! [`finish`]: VolumeObject::finish

use std::any::Any;

use glam::Vec3;

use crate::error::Result;
use crate::params::{ParamValue, ParameterStore};

/// Parameter under which [`VolumeObject::finish`] publishes the lower bound.
pub const BOUNDING_BOX_MIN: &str = "boundingBoxMin";

/// Parameter under which [`VolumeObject::finish`] publishes the upper bound.
pub const BOUNDING_BOX_MAX: &str = "boundingBoxMax";

/// A volume that can be committed and sampled.
pub trait VolumeObject: Any + Send + Sync {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the unique name of this volume.
    fn name(&self) -> &str;

    /// Returns the type name of this volume (e.g. "`StructuredBrickVolume`").
    fn type_name(&self) -> &'static str;

    /// Returns a human-readable description including the voxel type.
    fn describe(&self) -> String {
        self.type_name().to_string()
    }

    /// Returns the parameter store.
    fn params(&self) -> &ParameterStore;

    /// Returns the parameter store for writing.
    fn params_mut(&mut self) -> &mut ParameterStore;

    /// Sets a parameter. Takes effect at the next [`VolumeObject::commit`].
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.params_mut().set(name, value)
    }

    /// Returns whether the native binding has been created.
    fn is_built(&self) -> bool;

    /// Pushes the current parameters into the native binding.
    fn commit(&mut self) -> Result<()>;

    /// Publishes native-computed state (the bounding box) as parameters.
    fn finish(&mut self) -> Result<()>;

    /// Samples the volume at world-space positions.
    fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>>;

    /// Returns the bounding box published by the last [`VolumeObject::finish`].
    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let params = self.params();
        Some((
            params.try_get(BOUNDING_BOX_MIN)?,
            params.try_get(BOUNDING_BOX_MAX)?,
        ))
    }

    /// Returns whether this volume's data is spread across worker processes.
    fn is_data_distributed(&self) -> bool {
        false
    }
}
