//! Component type registration and the bit-masks built over type ids

use crate::{
    entity::ENTITY_ID_BITS,
    error::CapacityError,
};
use alloc::vec::Vec;
use cadence_core::collections::TypeIdMap;
use core::any::{TypeId, type_name};
use derive_more::derive::Display;
use smallvec::SmallVec;

/// Upper bound on registered component types, dictated by the packed
/// write-log entry format: the high `32 - ENTITY_ID_BITS` bits of an entry
/// hold the component type id
pub const MAX_COMPONENT_TYPES: usize = 1 << (32 - ENTITY_ID_BITS);

/// A data type that can be attached to an entity
///
/// The set of component types attached to an entity forms its *shape*, which
/// is what queries match on. Implementing the trait is all that is required;
/// the type must additionally be registered with the world builder before any
/// system references it
pub trait Component: Send + Sync + 'static {}

/// Dense sequential id of a registered component type
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[repr(transparent)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    #[inline]
    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// The dense index of this component type
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Word offset of this type's bit within a [`ComponentMask`]
    #[inline]
    pub(crate) const fn word(self) -> usize {
        (self.0 >> 5) as usize
    }

    /// Bit of this type within its mask word
    #[inline]
    pub(crate) const fn bit(self) -> u32 {
        1 << (self.0 & 31)
    }
}

/// Metadata kept per registered component type
#[derive(Debug)]
pub struct ComponentInfo {
    id: ComponentTypeId,
    type_id: TypeId,
    name: &'static str,
    /// Whether writes to this type are recorded in the write log.
    /// Flipped on when some query tracks the type
    tracked: bool,
}

impl ComponentInfo {
    #[inline]
    pub fn id(&self) -> ComponentTypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }
}

/// Registry of component types, assigning dense ids in registration order
#[derive(Default, Debug)]
pub struct Components {
    infos: Vec<ComponentInfo>,
    by_type: TypeIdMap<ComponentTypeId>,
}

impl Components {
    /// Registers `T`, returning its id. Re-registering a type returns the
    /// existing id
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, CapacityError> {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return Ok(id);
        }
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(CapacityError::ComponentTypes(MAX_COMPONENT_TYPES));
        }
        let id = ComponentTypeId::from_index(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            type_id,
            name: type_name::<T>(),
            tracked: false,
        });
        self.by_type.insert(type_id, id);
        Ok(id)
    }

    /// Looks up the id of `T`, if it has been registered
    #[inline]
    pub fn id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Looks up the id registered for a raw [`TypeId`]
    #[inline]
    pub fn id_of_type(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    #[inline]
    pub fn info(&self, id: ComponentTypeId) -> &ComponentInfo {
        &self.infos[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Marks writes to `id` as worth recording in the write log
    pub(crate) fn mark_tracked(&mut self, id: ComponentTypeId) {
        self.infos[id.index()].tracked = true;
    }

    #[inline]
    pub fn is_tracked(&self, id: ComponentTypeId) -> bool {
        self.infos[id.index()].tracked
    }
}

/// A bit-set over component type ids
///
/// Used for entity shapes, query predicates and per-system read/write masks.
/// Words are 32 bits wide to line up with the `(word, bit)` addressing the
/// write-log consumers use
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ComponentMask {
    words: SmallVec<[u32; 2]>,
}

impl ComponentMask {
    pub fn new() -> Self {
        Self {
            words: SmallVec::new(),
        }
    }

    /// Sets the bit for `id`
    pub fn set(&mut self, id: ComponentTypeId) {
        let word = id.word();
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= id.bit();
    }

    /// Clears the bit for `id`
    pub fn remove(&mut self, id: ComponentTypeId) {
        if let Some(word) = self.words.get_mut(id.word()) {
            *word &= !id.bit();
        }
    }

    #[inline]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.words
            .get(id.word())
            .is_some_and(|word| word & id.bit() != 0)
    }

    /// True if every bit of `other` is also set in `self`
    pub fn contains_all(&self, other: &ComponentMask) -> bool {
        other
            .words
            .iter()
            .enumerate()
            .all(|(i, &word)| self.words.get(i).copied().unwrap_or(0) & word == word)
    }

    /// True if `self` and `other` share at least one bit
    pub fn intersects(&self, other: &ComponentMask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(&a, &b)| a & b != 0)
    }

    /// True if the given word of the mask intersects `bits`
    #[inline]
    pub(crate) fn intersects_word(&self, word: usize, bits: u32) -> bool {
        self.words.get(word).is_some_and(|w| w & bits != 0)
    }

    /// ORs `other` into `self`
    pub fn union_with(&mut self, other: &ComponentMask) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, &other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= other_word;
        }
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Iterates the set component type ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            (0..32)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| ComponentTypeId::from_index((word_index as u32) * 32 + bit))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn registration_assigns_dense_ids() {
        let mut components = Components::default();
        let a = components.register::<Position>().unwrap();
        let b = components.register::<Velocity>().unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        // Idempotent
        assert_eq!(components.register::<Position>().unwrap(), a);
        assert_eq!(components.len(), 2);
        assert_eq!(components.id_of::<Velocity>(), Some(b));
    }

    #[test]
    fn mask_word_addressing_matches_log_layout() {
        let id = ComponentTypeId::from_index(37);
        assert_eq!(id.word(), 1);
        assert_eq!(id.bit(), 1 << 5);

        let mut mask = ComponentMask::new();
        mask.set(id);
        assert!(mask.contains(id));
        assert!(mask.intersects_word(1, 1 << 5));
        assert!(!mask.intersects_word(0, 1 << 5));
    }

    #[test]
    fn mask_set_operations() {
        let mut a = ComponentMask::new();
        a.set(ComponentTypeId::from_index(0));
        a.set(ComponentTypeId::from_index(40));

        let mut b = ComponentMask::new();
        b.set(ComponentTypeId::from_index(40));

        assert!(a.contains_all(&b));
        assert!(!b.contains_all(&a));
        assert!(a.intersects(&b));

        b.set(ComponentTypeId::from_index(7));
        assert!(!a.contains_all(&b));

        a.union_with(&b);
        assert!(a.contains(ComponentTypeId::from_index(7)));

        let ids: Vec<usize> = a.iter().map(ComponentTypeId::index).collect();
        assert_eq!(ids, [0, 7, 40]);

        a.remove(ComponentTypeId::from_index(40));
        assert!(!a.contains(ComponentTypeId::from_index(40)));
    }
}
