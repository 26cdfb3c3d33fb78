use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::descriptor::{SchemaSource, SlotDescriptor, SlotKind, TypeDescriptor};
use crate::errors::{ArborError, Result};
use crate::path::NodePath;

/// A slot with its position in traversal order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    /// Index in declaration order, the tie-break after priority
    pub ordinal: usize,
    pub name: String,
    pub kind: SlotKind,
    pub priority: i32,
    /// Member path of the slot value relative to its node
    pub member: NodePath,
}

/// Child slots of one type in traversal order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedType {
    pub type_name: String,
    pub slots: Vec<ResolvedSlot>,
}

impl ResolvedType {
    fn from_descriptor(descriptor: &TypeDescriptor) -> Self {
        let mut slots: Vec<ResolvedSlot> = descriptor
            .slots
            .iter()
            .enumerate()
            .map(|(ordinal, slot)| ResolvedSlot {
                ordinal,
                name: slot.name.clone(),
                kind: slot.kind,
                priority: slot.priority,
                member: slot.member_path(),
            })
            .collect();
        slots.sort_by_key(|s| (s.priority, s.ordinal));
        Self {
            type_name: descriptor.type_name.clone(),
            slots,
        }
    }

    fn leaf(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            slots: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-session store of node-type slot metadata
///
/// Descriptors are registered up front; resolved slot orderings are computed
/// on first use and cached. The cache sits behind a lock so [`warm`] may run
/// on a background thread while the owning thread keeps reading.
///
/// [`warm`]: SchemaRegistry::warm
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    descriptors: HashMap<String, TypeDescriptor>,
    cache: RwLock<HashMap<String, Arc<ResolvedType>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a schema source
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a descriptor is malformed.
    pub fn from_source(source: &dyn SchemaSource) -> Result<Self> {
        let mut registry = Self::new();
        registry.register_source(source)?;
        Ok(registry)
    }

    /// Register (or replace) one type descriptor
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty type name, an empty slot name or
    /// duplicate slot names.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        validate_descriptor(&descriptor)?;
        self.write_cache().remove(&descriptor.type_name);
        tracing::debug!(
            type_name = %descriptor.type_name,
            slot_count = descriptor.slots.len(),
            "schema type registered"
        );
        self.descriptors
            .insert(descriptor.type_name.clone(), descriptor);
        Ok(())
    }

    /// Register every descriptor a source supplies
    ///
    /// # Errors
    ///
    /// Same as [`SchemaRegistry::register`]; descriptors before the failing
    /// one stay registered.
    pub fn register_source(&mut self, source: &dyn SchemaSource) -> Result<()> {
        for descriptor in source.descriptors() {
            self.register(descriptor)?;
        }
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.descriptors.get(type_name)
    }

    /// Resolved slots for a type; unknown types are leaves
    pub fn resolve(&self, type_name: &str) -> Arc<ResolvedType> {
        if let Some(hit) = self.read_cache().get(type_name) {
            return Arc::clone(hit);
        }

        let resolved = Arc::new(match self.descriptors.get(type_name) {
            Some(descriptor) => ResolvedType::from_descriptor(descriptor),
            None => ResolvedType::leaf(type_name),
        });
        self.write_cache()
            .entry(type_name.to_string())
            .or_insert(resolved)
            .clone()
    }

    /// Precompute every registered type; returns the number resolved
    pub fn warm(&self) -> usize {
        let mut cache = self.write_cache();
        for (name, descriptor) in &self.descriptors {
            cache
                .entry(name.clone())
                .or_insert_with(|| Arc::new(ResolvedType::from_descriptor(descriptor)));
        }
        self.descriptors.len()
    }

    /// Drop all cached resolutions (descriptors stay registered)
    pub fn clear_cache(&self) {
        self.write_cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ResolvedType>>> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ResolvedType>>> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate_descriptor(descriptor: &TypeDescriptor) -> Result<()> {
    if descriptor.type_name.is_empty() {
        return Err(ArborError::InvalidConfig {
            reason: "type descriptor has an empty type name".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for SlotDescriptor { name, route, .. } in &descriptor.slots {
        if name.is_empty() || route.iter().any(String::is_empty) {
            return Err(ArborError::InvalidConfig {
                reason: format!("type {} declares a slot with an empty name", descriptor.type_name),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ArborError::InvalidConfig {
                reason: format!("type {} declares slot {} twice", descriptor.type_name, name),
            });
        }
    }
    Ok(())
}
