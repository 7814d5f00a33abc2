//! The entity/component store queries evaluate against

use crate::{
    changelog::ChangeLog,
    component::{Component, ComponentMask, ComponentTypeId, Components},
    entity::{Entities, EntityId},
    error::{AccessError, RunError},
    storage::{Column, ComponentColumn},
    world::Bundle,
};
use alloc::{boxed::Box, vec, vec::Vec};
use core::any::type_name;

/// Owns entity liveness, per-entity shape masks and the component columns
///
/// All mutation flows through the registry so that every shape change and
/// tracked write lands in the corresponding change log. The registry itself
/// is owned by the dispatcher; systems reach it through their
/// [`SystemContext`](crate::system::SystemContext)
pub struct Registry {
    entities: Entities,
    components: Components,
    /// One column per registered component type, indexed by type id
    columns: Vec<Box<dyn ComponentColumn>>,
    /// Per-entity shape masks, retained for recently deleted entities until
    /// the end-of-frame purge
    shapes: Vec<ComponentMask>,
    include_recently_deleted: bool,
}

impl Registry {
    pub(crate) fn new(
        components: Components,
        columns: Vec<Box<dyn ComponentColumn>>,
        max_entities: usize,
    ) -> Self {
        debug_assert_eq!(components.len(), columns.len());
        Self {
            entities: Entities::new(max_entities),
            components,
            columns,
            shapes: vec![ComponentMask::new(); max_entities],
            include_recently_deleted: false,
        }
    }

    #[inline]
    pub fn components(&self) -> &Components {
        &self.components
    }

    #[inline]
    pub(crate) fn components_mut(&mut self) -> &mut Components {
        &mut self.components
    }

    /// Maximum number of simultaneously live entities
    #[inline]
    pub fn entity_capacity(&self) -> usize {
        self.entities.capacity()
    }

    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Iterates every live entity in ascending id order
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter_alive()
    }

    #[inline]
    pub fn include_recently_deleted(&self) -> bool {
        self.include_recently_deleted
    }

    pub(crate) fn set_include_recently_deleted(&mut self, enabled: bool) {
        self.include_recently_deleted = enabled;
    }

    /// Whether `entity` is visible for data access: alive, or destroyed this
    /// frame while `include_recently_deleted` applies
    fn visible(&self, entity: EntityId, include_recently_deleted: bool) -> bool {
        self.entities.is_alive(entity)
            || (include_recently_deleted && self.entities.was_recently_deleted(entity))
    }

    /// Predicate over the current component set of `entity`
    pub fn has_shape(
        &self,
        entity: EntityId,
        component: ComponentTypeId,
        include_recently_deleted: bool,
    ) -> bool {
        self.visible(entity, include_recently_deleted)
            && self.shapes[entity.index() as usize].contains(component)
    }

    /// Query membership check: only *live* entities can match, regardless of
    /// the recently-deleted toggle (which governs data access, not
    /// membership)
    pub(crate) fn matches(
        &self,
        entity: EntityId,
        required: &ComponentMask,
        forbidden: &ComponentMask,
    ) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let shape = &self.shapes[entity.index() as usize];
        shape.contains_all(required) && !shape.intersects(forbidden)
    }

    pub(crate) fn create_entity(
        &mut self,
        bundle: impl Bundle,
        shape_log: &mut ChangeLog,
    ) -> Result<EntityId, RunError> {
        let entity = self.entities.alloc()?;
        match bundle.install(self, entity, shape_log) {
            Ok(()) => Ok(entity),
            Err(error) => {
                // Unwind the allocation; the purge reclaims whatever partial
                // shape was installed
                self.entities.free(entity);
                shape_log.append(entity.index());
                Err(error)
            }
        }
    }

    pub(crate) fn destroy_entity(
        &mut self,
        entity: EntityId,
        shape_log: &mut ChangeLog,
    ) -> Result<(), AccessError> {
        if !self.entities.is_alive(entity) {
            return Err(AccessError::DeadEntity(entity));
        }
        self.entities.free(entity);
        shape_log.append(entity.index());
        Ok(())
    }

    pub(crate) fn add_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
        shape_log: &mut ChangeLog,
    ) -> Result<(), AccessError> {
        if !self.entities.is_alive(entity) {
            return Err(AccessError::DeadEntity(entity));
        }
        let component = self
            .components
            .id_of::<T>()
            .ok_or(AccessError::UnregisteredComponent(type_name::<T>()))?;
        self.column_mut::<T>(component).data.insert(entity, value);
        let shape = &mut self.shapes[entity.index() as usize];
        if !shape.contains(component) {
            shape.set(component);
            shape_log.append(entity.index());
        }
        Ok(())
    }

    pub(crate) fn remove_component<T: Component>(
        &mut self,
        entity: EntityId,
        shape_log: &mut ChangeLog,
    ) -> Result<Option<T>, AccessError> {
        if !self.entities.is_alive(entity) {
            return Err(AccessError::DeadEntity(entity));
        }
        let component = self
            .components
            .id_of::<T>()
            .ok_or(AccessError::UnregisteredComponent(type_name::<T>()))?;
        let shape = &mut self.shapes[entity.index() as usize];
        if !shape.contains(component) {
            return Ok(None);
        }
        shape.remove(component);
        shape_log.append(entity.index());
        Ok(self.column_mut::<T>(component).data.remove(entity))
    }

    /// Reads a component, honoring the recently-deleted toggle
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        if !self.visible(entity, self.include_recently_deleted) {
            return None;
        }
        let component = self.components.id_of::<T>()?;
        self.column::<T>(component).data.get(entity)
    }

    /// Mutable component access; only live entities may be written
    pub(crate) fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, AccessError> {
        if !self.entities.is_alive(entity) {
            return Err(AccessError::DeadEntity(entity));
        }
        let component = self
            .components
            .id_of::<T>()
            .ok_or(AccessError::UnregisteredComponent(type_name::<T>()))?;
        self.column_mut::<T>(component)
            .data
            .get_mut(entity)
            .ok_or(AccessError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Clears out everything destroyed this frame and recycles the ids.
    /// Runs once per frame, after the last system
    pub(crate) fn purge(&mut self) {
        let deleted: Vec<EntityId> = self.entities.iter_recently_deleted().collect();
        for entity in deleted {
            self.shapes[entity.index() as usize].clear();
            for column in &mut self.columns {
                column.evict(entity);
            }
        }
        self.entities.purge();
    }

    fn column<T: Component>(&self, component: ComponentTypeId) -> &Column<T> {
        self.columns[component.index()]
            .downcast_ref::<Column<T>>()
            .unwrap()
    }

    fn column_mut<T: Component>(&mut self, component: ComponentTypeId) -> &mut Column<T> {
        self.columns[component.index()]
            .downcast_mut::<Column<T>>()
            .unwrap()
    }
}
