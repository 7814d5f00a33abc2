//! The view of the world a system gets during its turn

use super::{Attach, AttachmentSlot, System, SystemCell, SystemId, SystemState};
use crate::{
    changelog::{ChangeLog, pack_write_entry},
    component::Component,
    entity::EntityId,
    error::{AccessError, RunError},
    query::QueryHandle,
    world::{Bundle, Registry},
};
use alloc::{string::String, vec::Vec};
use core::{
    any::type_name,
    cell::{Ref, RefMut},
};

/// Scoped access to the world for one system while it initializes or
/// executes
///
/// The context exposes this system's query results, component access checked
/// against its declared masks, entity creation and destruction, attached
/// peers, and the system's own run-state controls. Entity ids obtained here
/// may go stale once the frame ends; they should not be stored across frames
/// without re-checking liveness
pub struct SystemContext<'w> {
    pub(crate) state: &'w mut SystemState,
    pub(crate) registry: &'w mut Registry,
    pub(crate) shape_log: &'w mut ChangeLog,
    pub(crate) write_log: &'w mut ChangeLog,
    pub(crate) peers: &'w [SystemCell],
}

impl SystemContext<'_> {
    /// This system's id
    #[inline]
    pub fn id(&self) -> SystemId {
        self.state.id()
    }

    /// This system's display name
    #[inline]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Timestamp of the current frame, in seconds
    #[inline]
    pub fn time(&self) -> f64 {
        self.state.time()
    }

    /// Time elapsed since the previous frame, in seconds
    #[inline]
    pub fn delta(&self) -> f64 {
        self.state.delta()
    }

    /// The entities currently matching the query, in ascending id order
    pub fn entities(&self, handle: &QueryHandle) -> Vec<EntityId> {
        self.state
            .query(handle)
            .results()
            .ones()
            .map(|index| EntityId::from_index(index as u32))
            .collect()
    }

    /// The entities whose membership or tracked data changed this frame.
    /// Empty unless the query was declared with transients
    pub fn changed(&self, handle: &QueryHandle) -> Vec<EntityId> {
        self.state
            .query(handle)
            .transients()
            .map(|transients| {
                transients
                    .ones()
                    .map(|index| EntityId::from_index(index as u32))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reads a component of `entity`. Returns `None` if the entity is not
    /// visible or lacks the component
    pub fn read<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.registry.get::<T>(entity)
    }

    /// Writes a component of `entity`
    ///
    /// Write access to `T` must have been declared by one of this system's
    /// queries. If `T` is tracked, the write lands in the write log for
    /// downstream queries to observe
    pub fn write<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, AccessError> {
        let component = self
            .registry
            .components()
            .id_of::<T>()
            .ok_or(AccessError::UnregisteredComponent(type_name::<T>()))?;
        if !self.state.write_mask().contains(component) {
            return Err(AccessError::UndeclaredWrite {
                system: String::from(self.state.name()),
                component: type_name::<T>(),
            });
        }
        // Validate the access before logging it, so a failed write leaves
        // no trace in the write log
        self.registry.get_mut::<T>(entity)?;
        if self.registry.components().is_tracked(component) {
            self.write_log.append(pack_write_entry(component, entity));
        }
        self.registry.get_mut::<T>(entity)
    }

    /// Creates an entity carrying `bundle`. The new entity becomes visible
    /// to queries of systems that run after this one in the same frame
    pub fn create_entity(&mut self, bundle: impl Bundle) -> Result<EntityId, RunError> {
        self.registry.create_entity(bundle, self.shape_log)
    }

    /// Destroys `entity`. Its data stays readable until the end of the
    /// frame for systems that opted into recently-deleted access
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), AccessError> {
        self.registry.destroy_entity(entity, self.shape_log)
    }

    /// Adds a component to a live entity, changing its shape
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), AccessError> {
        self.registry.add_component(entity, value, self.shape_log)
    }

    /// Removes a component from a live entity, returning it if present
    pub fn remove_component<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<Option<T>, AccessError> {
        self.registry.remove_component::<T>(entity, self.shape_log)
    }

    /// Borrows the peer system behind an attachment
    ///
    /// # Panics
    ///
    /// Panics if the peer is this system itself, or is already borrowed
    /// mutably
    pub fn attached<S: System>(&self, attach: &Attach<S>) -> Ref<'_, S> {
        let cell = self.peer_cell(attach);
        Ref::map(cell.borrow(), |system| {
            system.downcast_ref::<S>().unwrap()
        })
    }

    /// Mutably borrows the peer system behind an attachment
    ///
    /// # Panics
    ///
    /// Panics if the peer is this system itself, or is otherwise borrowed
    pub fn attached_mut<S: System>(&self, attach: &Attach<S>) -> RefMut<'_, S> {
        let cell = self.peer_cell(attach);
        RefMut::map(cell.borrow_mut(), |system| {
            system.downcast_mut::<S>().unwrap()
        })
    }

    fn peer_cell<S: System>(&self, attach: &Attach<S>) -> &SystemCell {
        let AttachmentSlot::Resolved(id) = self.state.attachment(attach.slot()) else {
            panic!("attachment used before dispatcher finalization");
        };
        &self.peers[id.index()]
    }

    /// Stops this system after the current `execute` returns: queries are
    /// cleared and further frames skip it until a restart
    pub fn stop(&mut self) {
        self.state.stop();
    }

    /// Toggles whether component reads (and shape checks) performed from
    /// here on can see entities destroyed earlier in this frame
    pub fn access_recently_deleted(&mut self, enabled: bool) {
        self.registry.set_include_recently_deleted(enabled);
    }
}
