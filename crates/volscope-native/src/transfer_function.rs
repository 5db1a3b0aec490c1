//! Transfer functions.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

/// A transfer function mapping scalar values to color and opacity.
///
/// Colors and opacities are each evenly spaced across `value_range`;
/// values outside the range clamp to the end entries.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    /// Transfer function name.
    pub name: String,
    /// Color samples.
    pub colors: Vec<Vec3>,
    /// Opacity samples.
    pub opacities: Vec<f32>,
    /// Scalar values mapped to the first and last samples.
    pub value_range: (f32, f32),
}

impl TransferFunction {
    /// Creates a new transfer function over `[0, 1]`.
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>, opacities: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            colors,
            opacities,
            value_range: (0.0, 1.0),
        }
    }

    /// Sets the scalar range covered by the transfer function.
    #[must_use]
    pub fn with_value_range(mut self, min: f32, max: f32) -> Self {
        self.value_range = (min, max);
        self
    }

    /// Color at a scalar value.
    pub fn color_at(&self, value: f32) -> Vec3 {
        let t = self.normalize(value);
        sample_linear(&self.colors, t, Vec3::ZERO, Vec3::lerp)
    }

    /// Opacity at a scalar value.
    pub fn opacity_at(&self, value: f32) -> f32 {
        let t = self.normalize(value);
        sample_linear(&self.opacities, t, 0.0, |a, b, f| a + (b - a) * f)
    }

    /// Color and opacity at a scalar value, as RGBA.
    pub fn classify(&self, value: f32) -> Vec4 {
        self.color_at(value).extend(self.opacity_at(value))
    }

    fn normalize(&self, value: f32) -> f32 {
        let (min, max) = self.value_range;
        let span = max - min;
        if span.abs() <= f32::EPSILON {
            return 0.0;
        }
        ((value - min) / span).clamp(0.0, 1.0)
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_linear<T: Copy>(samples: &[T], t: f32, empty: T, lerp: impl Fn(T, T, f32) -> T) -> T {
    match samples {
        [] => empty,
        [only] => *only,
        _ => {
            let n = samples.len() - 1;
            let idx = ((t * n as f32).floor() as usize).min(n - 1);
            let frac = t * n as f32 - idx as f32;
            lerp(samples[idx], samples[idx + 1], frac)
        }
    }
}

/// Registry of named transfer function presets.
#[derive(Default)]
pub struct TransferFunctionRegistry {
    presets: HashMap<String, TransferFunction>,
}

impl TransferFunctionRegistry {
    /// Creates a new registry with the default presets.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(TransferFunction::new(
            "grayscale",
            vec![Vec3::ZERO, Vec3::ONE],
            vec![0.0, 1.0],
        ));

        self.register(TransferFunction::new(
            "viridis",
            vec![
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.253, 0.265, 0.529),
                Vec3::new(0.163, 0.471, 0.558),
                Vec3::new(0.134, 0.658, 0.517),
                Vec3::new(0.477, 0.821, 0.318),
                Vec3::new(0.993, 0.906, 0.144),
            ],
            vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
        ));

        self.register(TransferFunction::new(
            "coolwarm",
            vec![
                Vec3::new(0.230, 0.299, 0.754),
                Vec3::new(0.552, 0.690, 0.996),
                Vec3::new(0.866, 0.866, 0.866),
                Vec3::new(0.956, 0.604, 0.486),
                Vec3::new(0.706, 0.016, 0.150),
            ],
            vec![1.0, 0.5, 0.0, 0.5, 1.0],
        ));
    }

    /// Registers a transfer function, replacing any preset with the same name.
    pub fn register(&mut self, transfer_function: TransferFunction) {
        self.presets
            .insert(transfer_function.name.clone(), transfer_function);
    }

    /// Gets a preset by name.
    pub fn get(&self, name: &str) -> Option<&TransferFunction> {
        self.presets.get(name)
    }

    /// Returns all preset names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}
