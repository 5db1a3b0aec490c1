//! The generic volume: parameter store, lazy native binding and commit.

use std::sync::{Arc, OnceLock};

use glam::{Affine3A, Mat3, Vec3};
use parking_lot::Mutex;
use volscope_core::{
    FromParam, ParamValue, ParameterStore, Result, VolscopeError, BOUNDING_BOX_MAX,
    BOUNDING_BOX_MIN,
};
use volscope_native::{AdaptiveSampling, ClipBox, TransferFunction, VolumeKernel};

/// Parameter holding the attached [`TransferFunction`].
pub const TRANSFER_FUNCTION: &str = "transferFunction";

/// Specular color, preferred spelling first.
pub const SPECULAR_ALIASES: &[&str] = &["specular", "ks", "Ks"];

/// Shininess exponent, preferred spelling first.
pub const SHININESS_ALIASES: &[&str] = &["ns", "Ns"];

/// The native object behind a volume, created at most once.
///
/// A binding starts unbuilt. The first successful
/// [`get_or_try_build`](Self::get_or_try_build) stores the kernel for the
/// lifetime of the binding; later calls return the same kernel. A failed
/// build leaves the binding unbuilt.
pub struct NativeBinding<K> {
    kernel: OnceLock<K>,
    build_lock: Mutex<()>,
}

impl<K> Default for NativeBinding<K> {
    fn default() -> Self {
        Self {
            kernel: OnceLock::new(),
            build_lock: Mutex::new(()),
        }
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for NativeBinding<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kernel.get() {
            Some(kernel) => f.debug_tuple("Built").field(kernel).finish(),
            None => f.write_str("Unbuilt"),
        }
    }
}

impl<K> NativeBinding<K> {
    /// Creates an unbuilt binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the kernel exists.
    pub fn is_built(&self) -> bool {
        self.kernel.get().is_some()
    }

    /// Returns the kernel if it exists.
    pub fn get(&self) -> Option<&K> {
        self.kernel.get()
    }

    /// Returns the kernel for writing if it exists.
    pub fn get_mut(&mut self) -> Option<&mut K> {
        self.kernel.get_mut()
    }

    /// Returns the kernel, building it with `build` if needed.
    ///
    /// Concurrent callers on an unbuilt binding are serialized so that
    /// `build` runs at most once successfully.
    pub fn get_or_try_build(&self, build: impl FnOnce() -> Result<K>) -> Result<&K> {
        if let Some(kernel) = self.kernel.get() {
            return Ok(kernel);
        }
        let _guard = self.build_lock.lock();
        if let Some(kernel) = self.kernel.get() {
            return Ok(kernel);
        }
        let kernel = build()?;
        Ok(self.kernel.get_or_init(|| kernel))
    }
}

/// Everything [`Volume::commit`] pushes into the kernel, resolved up front.
#[derive(Debug, Clone)]
struct CommitSettings {
    gradient_shading: bool,
    pre_integration: bool,
    single_shade: bool,
    adaptive: AdaptiveSampling,
    sampling_rate: f32,
    specular: Vec3,
    ns: f32,
    transfer_function: Arc<TransferFunction>,
    clip_box: ClipBox,
    transform: Affine3A,
    inverse_transform: Affine3A,
}

impl CommitSettings {
    fn resolve(params: &ParameterStore, default_sampling_rate: f32) -> Result<Self> {
        let transfer_function = params
            .get_object::<TransferFunction>(TRANSFER_FUNCTION)
            .ok_or(VolscopeError::MissingDependency("transfer function"))?;

        let basis = Mat3::from_cols(
            params.get("xfm.l.vx", Vec3::X),
            params.get("xfm.l.vy", Vec3::Y),
            params.get("xfm.l.vz", Vec3::Z),
        );
        let determinant = basis.determinant();
        if !determinant.is_finite() || determinant.abs() <= f32::EPSILON {
            return Err(VolscopeError::InvalidArgument(format!(
                "volume transform basis is singular (determinant {determinant})"
            )));
        }
        let transform = Affine3A::from_mat3_translation(basis, params.get("xfm.p", Vec3::ZERO));

        Ok(Self {
            gradient_shading: params.get("gradientShadingEnabled", false),
            pre_integration: params.get("preIntegration", false),
            single_shade: params.get("singleShade", true),
            adaptive: AdaptiveSampling {
                enabled: params.get("adaptiveSampling", true),
                scalar: params.get("adaptiveScalar", 15.0),
                max_sampling_rate: params.get("adaptiveMaxSamplingRate", 2.0),
                backtrack: params.get("adaptiveBacktrack", 0.03),
            },
            sampling_rate: params.get("samplingRate", default_sampling_rate),
            specular: params.get_aliased(SPECULAR_ALIASES, Vec3::splat(0.3)),
            ns: params.get_aliased(SHININESS_ALIASES, 20.0),
            transfer_function,
            clip_box: ClipBox::new(
                params.get("volumeClippingBoxLower", Vec3::ZERO),
                params.get("volumeClippingBoxUpper", Vec3::ZERO),
            ),
            transform,
            inverse_transform: transform.inverse(),
        })
    }

    fn push<K: VolumeKernel>(self, kernel: &mut K) {
        kernel.set_gradient_shading(self.gradient_shading);
        kernel.set_pre_integration(self.pre_integration);
        kernel.set_single_shade(self.single_shade);
        kernel.set_adaptive_sampling(self.adaptive);
        kernel.set_sampling_rate(self.sampling_rate);
        kernel.set_specular(self.specular);
        kernel.set_ns(self.ns);
        kernel.set_transfer_function(self.transfer_function);
        kernel.set_clip_box(self.clip_box);
        kernel.set_transforms(self.transform, self.inverse_transform);
    }
}

/// A named volume with parameters and a lazily built native kernel.
///
/// `Volume` implements the lifecycle shared by every volume type. Concrete
/// volumes own one and decide when the binding gets built.
#[derive(Debug)]
pub struct Volume<K> {
    name: String,
    params: ParameterStore,
    binding: NativeBinding<K>,
    inverse_transform: Affine3A,
    default_sampling_rate: f32,
}

impl<K: VolumeKernel> Volume<K> {
    /// Creates an unbuilt volume.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParameterStore::new(),
            binding: NativeBinding::new(),
            inverse_transform: Affine3A::IDENTITY,
            default_sampling_rate: 0.125,
        }
    }

    /// Sets the sampling rate used when `samplingRate` is not set.
    #[must_use]
    pub fn with_default_sampling_rate(mut self, rate: f32) -> Self {
        self.default_sampling_rate = rate;
        self
    }

    /// Returns the volume name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter store.
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Returns the parameter store for writing.
    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    /// Sets a parameter. Takes effect at the next commit.
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.params.set(name, value)
    }

    /// Reads a parameter, or `default` when unset or of another type.
    pub fn get_param<T: FromParam>(&self, name: &str, default: T) -> T {
        self.params.get(name, default)
    }

    /// Returns the native binding.
    pub fn binding(&self) -> &NativeBinding<K> {
        &self.binding
    }

    /// Returns whether the native binding has been built.
    pub fn is_built(&self) -> bool {
        self.binding.is_built()
    }

    /// Returns the inverse transform cached by the last successful commit.
    pub fn inverse_transform(&self) -> Affine3A {
        self.inverse_transform
    }

    /// Returns the built kernel, or `IllegalState` naming `operation`.
    pub fn kernel(&self, operation: &str) -> Result<&K> {
        self.binding.get().ok_or_else(|| self.unbuilt(operation))
    }

    /// Pushes the recognized parameters into the kernel.
    pub fn commit(&mut self) -> Result<()> {
        self.commit_with(|_| {})
    }

    /// Like [`Self::commit`], running `prepare` on the kernel first.
    ///
    /// Every parameter is resolved before `prepare` runs, so a failing commit
    /// leaves the kernel untouched.
    pub fn commit_with(&mut self, prepare: impl FnOnce(&mut K)) -> Result<()> {
        if !self.binding.is_built() {
            return Err(self.unbuilt("commit"));
        }
        let settings = CommitSettings::resolve(&self.params, self.default_sampling_rate)?;
        let inverse_transform = settings.inverse_transform;

        let Some(kernel) = self.binding.get_mut() else {
            return Err(VolscopeError::IllegalState(format!(
                "volume '{}' lost its native binding",
                self.name
            )));
        };
        prepare(kernel);
        settings.push(kernel);

        self.inverse_transform = inverse_transform;
        log::debug!(
            "committed volume '{}' (changed: {:?})",
            self.name,
            self.params.dirty_keys()
        );
        self.params.clear_dirty();
        Ok(())
    }

    /// Publishes the kernel's bounding box as read-only parameters.
    pub fn finish(&mut self) -> Result<()> {
        let (min, max) = self.kernel("finish")?.bounding_box();
        self.params.set_read_only(BOUNDING_BOX_MIN, min);
        self.params.set_read_only(BOUNDING_BOX_MAX, max);
        Ok(())
    }

    /// Samples the volume at world-space positions, one value per position.
    pub fn compute_samples(&self, positions: &[Vec3]) -> Result<Vec<f32>> {
        let kernel = self.kernel("compute_samples")?;
        let mut samples = vec![0.0; positions.len()];
        let scratch = kernel.compute_samples(positions)?;
        if scratch.len() != samples.len() {
            return Err(VolscopeError::NativeBackendFailure(format!(
                "kernel returned {} samples for {} positions",
                scratch.len(),
                positions.len()
            )));
        }
        samples.copy_from_slice(&scratch);
        Ok(samples)
    }

    fn unbuilt(&self, operation: &str) -> VolscopeError {
        VolscopeError::IllegalState(format!(
            "{operation} called on volume '{}' before its native binding was created",
            self.name
        ))
    }
}
