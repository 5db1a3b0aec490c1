//! Typed parameter storage with dirty tracking.
//!
//! Every volume owns a [`ParameterStore`]. Values are written by the
//! application (or a scene loader) and read back at commit time, where the
//! volume decides which keys it recognizes. Reads never fail: a missing key,
//! or a key holding a value of another type, yields the caller's default.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::{IVec3, Vec3};

use crate::error::{Result, VolscopeError};

/// A shared, type-erased object attached to a parameter (e.g. a transfer function).
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// A single parameter value.
#[derive(Clone)]
pub enum ParamValue {
    /// Integer value. Flags are stored as integers (0 = off).
    Int(i32),
    /// Scalar float value.
    Float(f32),
    /// Float 3-vector.
    Vec3(Vec3),
    /// Integer 3-vector.
    IVec3(IVec3),
    /// String value.
    String(String),
    /// Attached object.
    Object(ObjectRef),
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Vec3(v) => write!(f, "Vec3({v})"),
            Self::IVec3(v) => write!(f, "IVec3({v})"),
            Self::String(v) => write!(f, "String({v:?})"),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Int(i32::from(v))
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec3> for ParamValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<IVec3> for ParamValue {
    fn from(v: IVec3) -> Self {
        Self::IVec3(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for ParamValue {
    fn from(v: Arc<T>) -> Self {
        Self::Object(v)
    }
}

/// Conversion from a stored [`ParamValue`] to a concrete type.
pub trait FromParam: Sized {
    /// Returns `None` when the stored value has an incompatible type.
    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for i32 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParam for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromParam for f32 {
    #[allow(clippy::cast_precision_loss)]
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromParam for Vec3 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Vec3(v) => Some(*v),
            ParamValue::Float(v) => Some(Vec3::splat(*v)),
            _ => None,
        }
    }
}

impl FromParam for IVec3 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::IVec3(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParam for String {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Param {
    value: ParamValue,
    dirty: bool,
    read_only: bool,
}

/// Typed key → value table with dirty tracking.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: HashMap<String, Param>,
}

impl ParameterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter and marks it dirty.
    ///
    /// Returns an error if the key was published read-only by the volume.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        if self.params.get(name).is_some_and(|p| p.read_only) {
            return Err(VolscopeError::InvalidArgument(format!(
                "parameter '{name}' is read-only"
            )));
        }
        self.params.insert(
            name.to_string(),
            Param {
                value: value.into(),
                dirty: true,
                read_only: false,
            },
        );
        Ok(())
    }

    /// Publishes a value that applications may read but not overwrite.
    pub fn set_read_only(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.params.insert(
            name.to_string(),
            Param {
                value: value.into(),
                dirty: false,
                read_only: true,
            },
        );
    }

    /// Reads a parameter, falling back to `default` when missing or mistyped.
    pub fn get<T: FromParam>(&self, name: &str, default: T) -> T {
        self.try_get(name).unwrap_or(default)
    }

    /// Reads a parameter if it exists with a compatible type.
    pub fn try_get<T: FromParam>(&self, name: &str) -> Option<T> {
        self.params.get(name).and_then(|p| T::from_param(&p.value))
    }

    /// Reads the first alias in `names` that holds a compatible value.
    ///
    /// Aliases are tried in order, so the preferred spelling goes first.
    pub fn get_aliased<T: FromParam>(&self, names: &[&str], default: T) -> T {
        names
            .iter()
            .find_map(|name| self.try_get(name))
            .unwrap_or(default)
    }

    /// Returns the attached object of type `T`, if any.
    pub fn get_object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match &self.params.get(name)?.value {
            ParamValue::Object(obj) => Arc::clone(obj).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Returns the raw stored value.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name).map(|p| &p.value)
    }

    /// Returns whether a key is present.
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Removes a writable parameter. Read-only keys are kept.
    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        if self.params.get(name)?.read_only {
            return None;
        }
        self.params.remove(name).map(|p| p.value)
    }

    /// Returns whether `name` changed since the last [`Self::clear_dirty`].
    pub fn is_dirty(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(|p| p.dirty)
    }

    /// Returns whether any parameter changed since the last [`Self::clear_dirty`].
    pub fn has_dirty(&self) -> bool {
        self.params.values().any(|p| p.dirty)
    }

    /// Returns the changed keys, sorted.
    pub fn dirty_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .params
            .iter()
            .filter(|(_, p)| p.dirty)
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Marks every parameter clean.
    pub fn clear_dirty(&mut self) {
        for p in self.params.values_mut() {
            p.dirty = false;
        }
    }

    /// Returns the number of stored parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
