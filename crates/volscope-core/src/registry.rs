//! Named volume storage.

use std::collections::hash_map::{Entry, HashMap};

use crate::error::{Result, VolscopeError};
use crate::volume::VolumeObject;

/// Volumes keyed by their instance name.
///
/// Names are unique across volume types. Typed lookups downcast through
/// [`VolumeObject::as_any`] and miss when the stored volume has another type.
#[derive(Default)]
pub struct Registry {
    volumes: HashMap<String, Box<dyn VolumeObject>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `volume`. Fails if its name is already taken.
    pub fn register(&mut self, volume: Box<dyn VolumeObject>) -> Result<()> {
        match self.volumes.entry(volume.name().to_string()) {
            Entry::Occupied(slot) => {
                Err(VolscopeError::VolumeExists(slot.key().clone()))
            }
            Entry::Vacant(slot) => {
                log::trace!("registry: added {} '{}'", volume.type_name(), slot.key());
                slot.insert(volume);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn VolumeObject> {
        self.volumes.get(name).map(AsRef::as_ref)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn VolumeObject>> {
        self.volumes.get_mut(name)
    }

    /// Looks up `name` as a concrete volume type.
    pub fn get_as<T: VolumeObject>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref()
    }

    /// Mutable counterpart of [`Registry::get_as`].
    pub fn get_as_mut<T: VolumeObject>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name)?.as_any_mut().downcast_mut()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.volumes.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn VolumeObject>> {
        self.volumes.remove(name)
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.volumes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn VolumeObject> {
        self.volumes.values().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}
