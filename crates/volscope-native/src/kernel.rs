//! The call contract between volumes and their native compute objects.
//!
//! A volume owns exactly one kernel. Configuration is pushed into it one
//! setter at a time at commit; sampling and bounds are computed by it on
//! demand. Kernels are fail-fast: any error they return is fatal for the
//! volume.

use std::fmt;
use std::sync::Arc;

use glam::{Affine3A, Vec3};
use volscope_core::Result;

use crate::transfer_function::TransferFunction;

/// Adaptive sampling configuration for ray-marching integrators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveSampling {
    /// Whether adaptive sampling is enabled.
    pub enabled: bool,
    /// Opacity-to-rate scale.
    pub scalar: f32,
    /// Upper bound on the sampling rate.
    pub max_sampling_rate: f32,
    /// Step-back distance when refining.
    pub backtrack: f32,
}

impl Default for AdaptiveSampling {
    fn default() -> Self {
        Self {
            enabled: true,
            scalar: 15.0,
            max_sampling_rate: 2.0,
            backtrack: 0.03,
        }
    }
}

/// An axis-aligned clipping box in world space.
///
/// An empty box (upper not strictly greater than lower on every axis)
/// disables clipping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipBox {
    /// Lower corner.
    pub lower: Vec3,
    /// Upper corner.
    pub upper: Vec3,
}

impl ClipBox {
    /// Creates a clipping box.
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// Returns whether the box is degenerate and therefore clips nothing.
    pub fn is_empty(&self) -> bool {
        self.upper.cmple(self.lower).any()
    }

    /// Returns whether a point survives clipping.
    pub fn admits(&self, point: Vec3) -> bool {
        self.is_empty() || (point.cmpge(self.lower).all() && point.cmple(self.upper).all())
    }
}

/// Everything a volume commits into its kernel.
#[derive(Debug, Clone)]
pub struct KernelSettings {
    /// Gradient shading flag.
    pub gradient_shading: bool,
    /// Pre-integrated transfer function flag.
    pub pre_integration: bool,
    /// Shade once per sample instead of per light.
    pub single_shade: bool,
    /// Adaptive sampling configuration.
    pub adaptive: AdaptiveSampling,
    /// Base sampling rate.
    pub sampling_rate: f32,
    /// Specular color.
    pub specular: Vec3,
    /// Shininess exponent.
    pub ns: f32,
    /// Attached transfer function.
    pub transfer_function: Option<Arc<TransferFunction>>,
    /// Clipping box.
    pub clip_box: ClipBox,
    /// Object-to-world transform.
    pub transform: Affine3A,
    /// World-to-object transform.
    pub inverse_transform: Affine3A,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            gradient_shading: false,
            pre_integration: false,
            single_shade: true,
            adaptive: AdaptiveSampling::default(),
            sampling_rate: 0.125,
            specular: Vec3::splat(0.3),
            ns: 20.0,
            transfer_function: None,
            clip_box: ClipBox::default(),
            transform: Affine3A::IDENTITY,
            inverse_transform: Affine3A::IDENTITY,
        }
    }
}

/// Native compute object behind a volume.
pub trait VolumeKernel: Send + Sync + fmt::Debug {
    /// Returns the currently committed settings.
    fn settings(&self) -> &KernelSettings;

    /// Sets the gradient shading flag.
    fn set_gradient_shading(&mut self, enabled: bool);

    /// Sets the pre-integration flag.
    fn set_pre_integration(&mut self, enabled: bool);

    /// Sets the single-shade flag.
    fn set_single_shade(&mut self, enabled: bool);

    /// Sets adaptive sampling.
    fn set_adaptive_sampling(&mut self, adaptive: AdaptiveSampling);

    /// Sets the base sampling rate.
    fn set_sampling_rate(&mut self, rate: f32);

    /// Sets the specular color.
    fn set_specular(&mut self, specular: Vec3);

    /// Sets the shininess exponent.
    fn set_ns(&mut self, ns: f32);

    /// Attaches the transfer function.
    fn set_transfer_function(&mut self, transfer_function: Arc<TransferFunction>);

    /// Sets the clipping box.
    fn set_clip_box(&mut self, clip_box: ClipBox);

    /// Sets both directions of the object transform.
    fn set_transforms(&mut self, transform: Affine3A, inverse: Affine3A);

    /// Returns the world-space bounding box.
    fn bounding_box(&self) -> (Vec3, Vec3);

    /// Samples the field at world-space positions.
    ///
    /// The returned buffer is kernel scratch and has one value per position.
    fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>>;
}
