//! Entity identity, allocation and liveness

use crate::error::CapacityError;
use alloc::vec::Vec;
use derive_more::derive::Display;
use fixedbitset::FixedBitSet;

/// Number of low bits of a packed log entry that hold the entity id.
/// The remaining high bits carry a component type id, which bounds the
/// number of registered component types (see
/// [`MAX_COMPONENT_TYPES`](crate::component::MAX_COMPONENT_TYPES))
pub const ENTITY_ID_BITS: u32 = 24;

/// Mask selecting the entity id from a packed log entry
pub const ENTITY_ID_MASK: u32 = (1 << ENTITY_ID_BITS) - 1;

/// Dense numeric identity of an entity
///
/// Ids are handed out by [`Entities`] and recycled once a destroyed entity
/// has been purged at the end of the frame it died in. An `EntityId` is
/// plain data; holding one does not keep the entity alive
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an id from its dense index
    #[inline]
    pub const fn from_index(index: u32) -> Self {
        debug_assert!(index <= ENTITY_ID_MASK);
        Self(index)
    }

    /// The dense index of this entity
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Allocation and liveness bookkeeping for every entity in the world
///
/// Destroyed entities linger in a *recently deleted* set until the dispatcher
/// purges them at the end of the frame, so systems that run after the
/// destroyer can still observe their data under the registry's
/// recently-deleted toggle. Ids only return to the free list at purge time,
/// which guarantees an id is never reused within the frame it died in
#[derive(Debug)]
pub struct Entities {
    alive: FixedBitSet,
    recently_deleted: FixedBitSet,
    free: Vec<u32>,
    next: u32,
    capacity: usize,
}

impl Entities {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity <= (ENTITY_ID_MASK as usize) + 1);
        Self {
            alive: FixedBitSet::with_capacity(capacity),
            recently_deleted: FixedBitSet::with_capacity(capacity),
            free: Vec::new(),
            next: 0,
            capacity,
        }
    }

    /// Maximum number of simultaneously live entities
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn alloc(&mut self) -> Result<EntityId, CapacityError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.next as usize >= self.capacity {
                    return Err(CapacityError::Entities(self.capacity));
                }
                let index = self.next;
                self.next += 1;
                index
            }
        };
        self.alive.insert(index as usize);
        Ok(EntityId::from_index(index))
    }

    /// Marks `entity` dead. The id stays out of circulation until
    /// [`Entities::purge`] runs
    pub(crate) fn free(&mut self, entity: EntityId) {
        let index = entity.index() as usize;
        debug_assert!(self.alive.contains(index));
        self.alive.set(index, false);
        self.recently_deleted.insert(index);
    }

    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.contains(entity.index() as usize)
    }

    #[inline]
    pub fn was_recently_deleted(&self, entity: EntityId) -> bool {
        self.recently_deleted.contains(entity.index() as usize)
    }

    /// Iterates every live entity in ascending id order
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.ones().map(|index| EntityId::from_index(index as u32))
    }

    /// Iterates the entities destroyed since the last purge
    pub(crate) fn iter_recently_deleted(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.recently_deleted
            .ones()
            .map(|index| EntityId::from_index(index as u32))
    }

    /// Returns destroyed ids to the free list. Called once per frame by the
    /// dispatcher, after every system has run
    pub(crate) fn purge(&mut self) {
        for index in self.recently_deleted.ones() {
            self.free.push(index as u32);
        }
        self.recently_deleted.clear();
    }
}
