//! Structured volume stored in ghost-padded bricks.
//!
//! Voxel data is streamed in with [`StructuredBrickVolume::set_region`],
//! one sub-volume at a time, addressed by global voxel coordinates. The
//! first region write fixes the voxel type and dimensions and allocates the
//! native storage; parameters are applied later by
//! [`StructuredBrickVolume::commit`].

mod upsample;

pub use upsample::{effective_scale, scale_region, Region, UpsampleFilter};

use std::any::Any;

use glam::{IVec3, Vec3};
use rayon::prelude::*;
use volscope_core::{
    FromParam, Options, ParamValue, ParameterStore, Result, VolscopeError, VolumeObject,
};
use volscope_native::{BrickedKernel, Voxel, VoxelType};

use crate::volume::Volume;

/// A structured scalar volume backed by a [`BrickedKernel`].
///
/// Recognized parameters besides the common volume ones:
///
/// | key | type | default |
/// |---|---|---|
/// | `voxelType` | string | required before the first region write |
/// | `dimensions` | ivec3 | required before the first region write |
/// | `scaleFactor` | vec3 | `(-1, -1, -1)`, no resampling |
/// | `upsampleFilter` | string | `"nearest"` |
/// | `gridOrigin` | vec3 | `(0, 0, 0)` |
/// | `gridSpacing` | vec3 | `(1, 1, 1)` |
#[derive(Debug)]
pub struct StructuredBrickVolume {
    base: Volume<BrickedKernel>,
    warn_on_clipped_regions: bool,
}

impl StructuredBrickVolume {
    /// Name reported by [`VolumeObject::type_name`].
    pub const TYPE_NAME: &'static str = "StructuredBrickVolume";

    /// Creates a volume with no data. Set `voxelType` and `dimensions`
    /// before the first region write.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, &Options::default())
    }

    /// Creates a volume that takes its defaults from `options`.
    pub fn with_options(name: impl Into<String>, options: &Options) -> Self {
        Self {
            base: Volume::new(name).with_default_sampling_rate(options.default_sampling_rate),
            warn_on_clipped_regions: options.warn_on_clipped_regions,
        }
    }

    /// Creates a volume with `voxelType` and `dimensions` already set.
    pub fn with_layout(
        name: impl Into<String>,
        voxel_type: VoxelType,
        dims: IVec3,
    ) -> Result<Self> {
        let mut volume = Self::new(name);
        volume.set_param("voxelType", voxel_type.name())?;
        volume.set_param("dimensions", dims)?;
        Ok(volume)
    }

    /// Sets a parameter. Takes effect at the next commit.
    ///
    /// `voxelType` and `dimensions` are only read before the first region
    /// write; later changes are ignored.
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.base.set_param(name, value)
    }

    /// Reads a parameter, or `default` when unset or of another type.
    pub fn get_param<T: FromParam>(&self, name: &str, default: T) -> T {
        self.base.get_param(name, default)
    }

    /// Returns the voxel type once storage exists.
    pub fn voxel_type(&self) -> Option<VoxelType> {
        self.base.binding().get().map(BrickedKernel::voxel_type)
    }

    /// Returns the dimensions once storage exists.
    pub fn dimensions(&self) -> Option<IVec3> {
        self.base.binding().get().map(BrickedKernel::dimensions)
    }

    /// Returns the native kernel once storage exists.
    pub fn kernel(&self) -> Option<&BrickedKernel> {
        self.base.binding().get()
    }

    /// Writes a region of voxels given as raw native-endian bytes.
    ///
    /// `source` holds `extent` voxels of the volume's voxel type in x-fastest
    /// order, placed at `origin` in global voxel coordinates. Writes to
    /// disjoint regions may run concurrently; writes overlapping the same
    /// voxels concurrently leave those voxels unspecified.
    pub fn set_region(&self, source: &[u8], origin: IVec3, extent: IVec3) -> Result<()> {
        self.write_region(source, origin, extent, None)
    }

    /// Writes a region of typed voxels.
    ///
    /// Fails with `InvalidArgument` if `T` does not match the voxel type.
    pub fn set_region_typed<T: Voxel>(
        &self,
        source: &[T],
        origin: IVec3,
        extent: IVec3,
    ) -> Result<()> {
        self.write_region(bytemuck::cast_slice(source), origin, extent, Some(T::TYPE))
    }

    fn write_region(
        &self,
        source: &[u8],
        origin: IVec3,
        extent: IVec3,
        expected_type: Option<VoxelType>,
    ) -> Result<()> {
        let kernel = self
            .base
            .binding()
            .get_or_try_build(|| self.create_kernel())?;

        let voxel_type = kernel.voxel_type();
        if let Some(expected) = expected_type.filter(|&t| t != voxel_type) {
            return Err(VolscopeError::InvalidArgument(format!(
                "{expected} voxels written to {voxel_type} volume '{}'",
                self.base.name()
            )));
        }
        validate_source(source, extent, voxel_type)?;

        let params = self.base.params();
        let filter_name: String =
            params.get("upsampleFilter", UpsampleFilter::default().name().to_string());
        let filter = UpsampleFilter::from_name(&filter_name).ok_or_else(|| {
            VolscopeError::InvalidArgument(format!("unknown upsample filter '{filter_name}'"))
        })?;
        let region = scale_region(
            source,
            voxel_type,
            origin,
            extent,
            params.get("scaleFactor", Vec3::splat(-1.0)),
            filter,
        )?;

        if self.warn_on_clipped_regions && !kernel.contains_region(region.origin, region.extent) {
            log::warn!(
                "region {} at {} reaches outside volume '{}' ({}); outside voxels are dropped",
                region.extent,
                region.origin,
                self.base.name(),
                kernel.dimensions()
            );
        }

        (0..region.scanlines()).into_par_iter().try_for_each(|task| {
            kernel.set_region(&region.data, region.origin, region.extent, task)
        })
    }

    fn create_kernel(&self) -> Result<BrickedKernel> {
        let params = self.base.params();
        let type_name: String = params.get("voxelType", "unspecified".to_string());
        let voxel_type = VoxelType::from_name(&type_name)
            .ok_or(VolscopeError::UnrecognizedType(type_name))?;

        let dims = params.get("dimensions", IVec3::ZERO);
        if dims.cmple(IVec3::ZERO).any() {
            return Err(VolscopeError::InvalidDimensions(dims));
        }

        log::info!(
            "creating {voxel_type} brick storage for volume '{}' with dimensions {dims}",
            self.base.name()
        );
        BrickedKernel::new(voxel_type, dims)
    }

    /// Applies grid placement and the common volume parameters.
    ///
    /// Fails with `PrecommitRequired` until a region has been written.
    pub fn commit(&mut self) -> Result<()> {
        if !self.base.is_built() {
            return Err(VolscopeError::PrecommitRequired);
        }
        let origin = self.base.get_param("gridOrigin", Vec3::ZERO);
        let spacing = self.base.get_param("gridSpacing", Vec3::ONE);
        if !(spacing.cmpgt(Vec3::ZERO).all() && spacing.is_finite()) {
            return Err(VolscopeError::InvalidArgument(format!(
                "grid spacing {spacing} must be positive"
            )));
        }
        self.base
            .commit_with(|kernel| kernel.set_grid(origin, spacing))
    }

    /// Publishes the bounding box as `boundingBoxMin`/`boundingBoxMax`.
    pub fn finish(&mut self) -> Result<()> {
        self.base.finish()
    }

    /// Samples the volume at world-space positions.
    pub fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>> {
        self.base.compute_samples(positions)
    }
}

/// Checks that `source` holds exactly one voxel per cell of `extent`.
#[allow(clippy::cast_sign_loss)]
fn validate_source(source: &[u8], extent: IVec3, voxel_type: VoxelType) -> Result<()> {
    if source.is_empty() {
        return Err(VolscopeError::InvalidArgument(
            "region source is empty".to_string(),
        ));
    }
    if extent.cmple(IVec3::ZERO).any() {
        return Err(VolscopeError::InvalidArgument(format!(
            "region extent {extent} must be positive on every axis"
        )));
    }
    let expected = (extent.x as usize)
        .checked_mul(extent.y as usize)
        .and_then(|n| n.checked_mul(extent.z as usize))
        .and_then(|n| n.checked_mul(voxel_type.size()));
    if expected != Some(source.len()) {
        return Err(VolscopeError::InvalidArgument(format!(
            "region source holds {} bytes, expected {extent} {voxel_type} voxels",
            source.len()
        )));
    }
    Ok(())
}

impl VolumeObject for StructuredBrickVolume {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn describe(&self) -> String {
        let voxel_type = self.voxel_type().map_or_else(
            || self.get_param("voxelType", "unspecified".to_string()),
            |t| t.name().to_string(),
        );
        format!("structured_brick_volume<{voxel_type}>")
    }

    fn params(&self) -> &ParameterStore {
        self.base.params()
    }

    fn params_mut(&mut self) -> &mut ParameterStore {
        self.base.params_mut()
    }

    fn is_built(&self) -> bool {
        self.base.is_built()
    }

    fn commit(&mut self) -> Result<()> {
        StructuredBrickVolume::commit(self)
    }

    fn finish(&mut self) -> Result<()> {
        StructuredBrickVolume::finish(self)
    }

    fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>> {
        StructuredBrickVolume::compute_samples(self, positions)
    }
}
