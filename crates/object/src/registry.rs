//! The document's object-numbering authority.
//!
//! All identities are minted by [`ObjectRegistry::mint`], so numbering is
//! monotonic and gap-free by construction. Readers locate objects by their row
//! in the cross-reference table, so every allocation must go through one
//! registry on one serialized path per document.

use crate::error::ObjectError;
use lopdf::{Object, ObjectId};
use std::collections::BTreeMap;

/// The conventional upper bound on indirect object numbers.
pub const DEFAULT_MAX_OBJECT_ID: u32 = 8_388_607;

#[derive(Debug, Clone)]
enum Slot {
    Reserved,
    Filled(Object),
    /// Identity handed out for an object the caller writes itself.
    External,
}

#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    slots: BTreeMap<u32, Slot>,
    max_id: u32,
    limit: u32,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_OBJECT_ID)
    }

    pub fn with_limit(limit: u32) -> Self {
        Self { slots: BTreeMap::new(), max_id: 0, limit }
    }

    fn mint(&mut self, slot: Slot) -> Result<ObjectId, ObjectError> {
        if self.max_id >= self.limit {
            return Err(ObjectError::RegistryExhausted { limit: self.limit });
        }
        self.max_id += 1;
        self.slots.insert(self.max_id, slot);
        Ok((self.max_id, 0))
    }

    /// Registers an object under the next identity.
    pub fn register(&mut self, object: impl Into<Object>) -> Result<ObjectId, ObjectError> {
        self.mint(Slot::Filled(object.into()))
    }

    /// Allocates an identity whose object is supplied later through [`fill`](Self::fill).
    pub fn reserve(&mut self) -> Result<ObjectId, ObjectError> {
        self.mint(Slot::Reserved)
    }

    /// Allocates an identity for an object the caller serializes outside the registry,
    /// such as the cross-reference stream itself.
    pub fn allocate(&mut self) -> Result<ObjectId, ObjectError> {
        self.mint(Slot::External)
    }

    pub fn fill(&mut self, id: ObjectId, object: impl Into<Object>) -> Result<(), ObjectError> {
        match self.slots.get_mut(&id.0) {
            Some(slot) if id.1 == 0 && matches!(slot, Slot::Reserved) => {
                *slot = Slot::Filled(object.into());
                Ok(())
            }
            Some(Slot::Filled(_)) => Err(ObjectError::Validation(format!(
                "object {} {} R is already filled",
                id.0, id.1
            ))),
            _ => Err(ObjectError::Validation(format!(
                "object {} {} R was never reserved",
                id.0, id.1
            ))),
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        match self.slots.get(&id.0) {
            Some(Slot::Filled(object)) if id.1 == 0 => Some(object),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        match self.slots.get_mut(&id.0) {
            Some(Slot::Filled(object)) if id.1 == 0 => Some(object),
            _ => None,
        }
    }

    /// Number of identities minted so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// How many more identities can be minted before the registry is exhausted.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.max_id)
    }

    /// Filled objects in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.slots.iter().filter_map(|(num, slot)| match slot {
            Slot::Filled(object) => Some(((*num, 0), object)),
            _ => None,
        })
    }

    /// Removes and returns every filled object in identity order. Fails without
    /// removing anything if a reservation is still open. The identity counter
    /// keeps its position, so later allocations continue the sequence.
    pub fn take_objects(&mut self) -> Result<Vec<(ObjectId, Object)>, ObjectError> {
        if let Some((num, _)) = self.slots.iter().find(|(_, slot)| matches!(slot, Slot::Reserved)) {
            return Err(ObjectError::UnfilledReservation((*num, 0)));
        }
        let slots = std::mem::take(&mut self.slots);
        let mut objects = Vec::with_capacity(slots.len());
        for (num, slot) in slots {
            match slot {
                Slot::Filled(object) => objects.push(((num, 0), object)),
                other => {
                    self.slots.insert(num, other);
                }
            }
        }
        log::debug!("Took {} objects from registry (max id {})", objects.len(), self.max_id);
        Ok(objects)
    }
}
