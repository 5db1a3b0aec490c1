//! Structured volume registration and handles.

use std::sync::Arc;

use crate::{
    with_context, with_context_mut, FromParam, IVec3, ParamValue, Result, StructuredBrickVolume,
    TransferFunction, TransferFunctionRegistry, Vec3, VolscopeError, VolumeObject, Voxel,
    VoxelType,
};

/// Registers a structured volume with its voxel type and dimensions set.
///
/// The volume takes its defaults from the global options. Stream data into
/// it with [`StructuredVolumeHandle::set_region`].
pub fn register_structured_volume(
    name: impl Into<String>,
    voxel_type: VoxelType,
    dims: IVec3,
) -> Result<StructuredVolumeHandle> {
    let name = name.into();
    with_context_mut(|ctx| {
        let mut volume = StructuredBrickVolume::with_options(name.clone(), &ctx.options);
        volume.set_param("voxelType", voxel_type.name())?;
        volume.set_param("dimensions", dims)?;
        ctx.registry.register(Box::new(volume))?;
        log::debug!("registered {voxel_type} volume '{name}' with dimensions {dims}");
        Ok(StructuredVolumeHandle { name })
    })?
}

/// Gets a registered structured volume by name.
#[must_use]
pub fn get_structured_volume(name: &str) -> Option<StructuredVolumeHandle> {
    with_context(|ctx| ctx.registry.get_as::<StructuredBrickVolume>(name).is_some())
        .unwrap_or(false)
        .then(|| StructuredVolumeHandle {
            name: name.to_string(),
        })
}

/// Removes a volume by name. Returns whether it existed.
pub fn remove_volume(name: &str) -> Result<bool> {
    with_context_mut(|ctx| ctx.registry.remove(name).is_some())
}

/// Removes all volumes.
pub fn remove_all_volumes() -> Result<()> {
    with_context_mut(|ctx| ctx.registry.clear())
}

/// Returns a shareable copy of a transfer function preset
/// (`grayscale`, `viridis` or `coolwarm`).
#[must_use]
pub fn transfer_function_preset(name: &str) -> Option<Arc<TransferFunction>> {
    TransferFunctionRegistry::new()
        .get(name)
        .cloned()
        .map(Arc::new)
}

/// Executes a closure with mutable access to a registered structured volume.
pub fn with_structured_volume<F, R>(name: &str, f: F) -> Result<R>
where
    F: FnOnce(&mut StructuredBrickVolume) -> Result<R>,
{
    with_context_mut(|ctx| {
        ctx.registry
            .get_as_mut::<StructuredBrickVolume>(name)
            .ok_or_else(|| VolscopeError::VolumeNotFound(name.to_string()))
            .and_then(f)
    })?
}

/// Executes a closure with shared access to a registered structured volume.
///
/// Shared access holds the global context for reading only, so region
/// writes issued this way from several threads run concurrently.
pub fn with_structured_volume_ref<F, R>(name: &str, f: F) -> Result<R>
where
    F: FnOnce(&StructuredBrickVolume) -> Result<R>,
{
    with_context(|ctx| {
        ctx.registry
            .get_as::<StructuredBrickVolume>(name)
            .ok_or_else(|| VolscopeError::VolumeNotFound(name.to_string()))
            .and_then(f)
    })?
}

/// Handle for a registered structured volume.
#[derive(Debug, Clone)]
pub struct StructuredVolumeHandle {
    name: String,
}

impl StructuredVolumeHandle {
    /// Returns the name of this volume.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets a parameter. Takes effect at the next commit.
    pub fn set_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<&Self> {
        let value = value.into();
        with_structured_volume(&self.name, |v| v.set_param(name, value))?;
        Ok(self)
    }

    /// Reads a parameter, or `default` when unset or of another type.
    pub fn get_param<T: FromParam>(&self, name: &str, default: T) -> Result<T> {
        with_structured_volume_ref(&self.name, |v| Ok(v.get_param(name, default)))
    }

    /// Attaches a transfer function.
    pub fn set_transfer_function(
        &self,
        transfer_function: Arc<TransferFunction>,
    ) -> Result<&Self> {
        self.set_param(volscope_volumes::TRANSFER_FUNCTION, transfer_function)
    }

    /// Writes a region of raw voxel bytes at `origin`.
    pub fn set_region(&self, source: &[u8], origin: IVec3, extent: IVec3) -> Result<()> {
        with_structured_volume_ref(&self.name, |v| v.set_region(source, origin, extent))
    }

    /// Writes a region of typed voxels at `origin`.
    pub fn set_region_typed<T: Voxel>(
        &self,
        source: &[T],
        origin: IVec3,
        extent: IVec3,
    ) -> Result<()> {
        with_structured_volume_ref(&self.name, |v| v.set_region_typed(source, origin, extent))
    }

    /// Applies the current parameters.
    pub fn commit(&self) -> Result<()> {
        with_structured_volume(&self.name, StructuredBrickVolume::commit)
    }

    /// Publishes the bounding box and returns it.
    pub fn finish(&self) -> Result<(Vec3, Vec3)> {
        with_structured_volume(&self.name, |v| {
            v.finish()?;
            v.bounding_box().ok_or_else(|| {
                VolscopeError::IllegalState(format!("volume '{}' has no bounding box", v.name()))
            })
        })
    }

    /// Samples the volume at world-space positions.
    pub fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>> {
        with_structured_volume_ref(&self.name, |v| v.compute_samples(positions))
    }

    /// Returns a description such as `structured_brick_volume<float>`.
    pub fn describe(&self) -> Result<String> {
        with_structured_volume_ref(&self.name, |v| Ok(v.describe()))
    }
}
