//! The outer world facade: building, running and observing a dispatcher

mod registry;

pub use registry::Registry;

use crate::{
    changelog::ChangeLog,
    component::Component,
    entity::EntityId,
    error::{AccessError, RunError},
    schedule::{
        Dispatcher,
        dispatcher::SystemDef,
        error::{BuildDiagnostic, WorldBuildError},
    },
    storage::{Column, ComponentColumn},
    system::System,
};
use alloc::{boxed::Box, vec::Vec};
use core::{
    any::{TypeId, type_name},
    cell::Ref,
};
use variadics_please::all_tuples;

/// Default number of simultaneously live entities a world supports
const DEFAULT_MAX_ENTITIES: usize = 10_000;

/// A set of components installed together when an entity is created
///
/// Implemented for every [`Component`] and for tuples of bundles up to
/// twelve elements
pub trait Bundle {
    /// Installs this bundle's components on `entity`
    fn install(
        self,
        registry: &mut Registry,
        entity: EntityId,
        shape_log: &mut ChangeLog,
    ) -> Result<(), RunError>;
}

impl<C: Component> Bundle for C {
    fn install(
        self,
        registry: &mut Registry,
        entity: EntityId,
        shape_log: &mut ChangeLog,
    ) -> Result<(), RunError> {
        registry.add_component(entity, self, shape_log)?;
        Ok(())
    }
}

impl Bundle for () {
    fn install(
        self,
        _registry: &mut Registry,
        _entity: EntityId,
        _shape_log: &mut ChangeLog,
    ) -> Result<(), RunError> {
        Ok(())
    }
}

macro_rules! impl_bundle {
    ($($name:ident),*) => {
        impl<$($name: Bundle),*> Bundle for ($($name,)*) {
            #[allow(non_snake_case)]
            fn install(
                self,
                registry: &mut Registry,
                entity: EntityId,
                shape_log: &mut ChangeLog,
            ) -> Result<(), RunError> {
                let ($($name,)*) = self;
                $($name.install(registry, entity, shape_log)?;)*
                Ok(())
            }
        }
    };
}

all_tuples!(impl_bundle, 1, 12, B);

/// Collects component and system registrations, then builds a [`World`]
///
/// Component types get dense ids in registration order; systems get dense
/// ids the same way, which doubles as the tie-break order of the schedule.
/// All configuration problems are reported together by [`WorldBuilder::build`]
pub struct WorldBuilder {
    max_entities: usize,
    components: crate::component::Components,
    columns: Vec<Box<dyn ComponentColumn>>,
    systems: Vec<SystemDef>,
    diagnostics: Vec<BuildDiagnostic>,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            components: Default::default(),
            columns: Vec::new(),
            systems: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl WorldBuilder {
    /// Caps the number of simultaneously live entities. Query bit-sets are
    /// sized from this
    pub fn max_entities(mut self, max_entities: usize) -> Self {
        self.max_entities = max_entities;
        self
    }

    /// Registers the component type `T`
    pub fn component<T: Component>(mut self) -> Self {
        match self.components.register::<T>() {
            Ok(id) => {
                if id.index() == self.columns.len() {
                    self.columns.push(Box::new(Column::<T>::default()));
                }
            }
            Err(_) => self.diagnostics.push(BuildDiagnostic::TooManyComponents {
                limit: crate::component::MAX_COMPONENT_TYPES,
            }),
        }
        self
    }

    /// Registers a system constructed with [`Default`]
    pub fn system<S: System + Default>(self) -> Self {
        self.system_with(S::default())
    }

    /// Registers a system from an already-constructed instance, for systems
    /// that take initial values
    pub fn system_with<S: System>(mut self, system: S) -> Self {
        self.systems.push(SystemDef {
            type_id: TypeId::of::<S>(),
            name: type_name::<S>(),
            system: Box::new(system),
        });
        self
    }

    /// Wires everything together: declares systems, builds and seals the
    /// precedence graph, resolves attachments and runs the initialize
    /// hooks. Every configuration problem found along the way is reported in
    /// one [`WorldBuildError`]
    pub fn build(self) -> Result<World, WorldBuildError> {
        Dispatcher::build(
            self.max_entities,
            self.components,
            self.columns,
            self.systems,
            self.diagnostics,
        )
        .map(|dispatcher| World { dispatcher })
    }
}

/// An assembled world: a dispatcher plus everything it owns
///
/// Frames are driven manually with [`World::execute`], passing the frame
/// timestamp and delta in seconds
pub struct World {
    dispatcher: Dispatcher,
}

impl core::fmt::Debug for World {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("World").finish_non_exhaustive()
    }
}

impl World {
    pub fn builder() -> WorldBuilder {
        WorldBuilder::default()
    }

    /// Runs one frame: every running system executes once, in schedule
    /// order. An error from a system body aborts the frame
    pub fn execute(&mut self, time: f64, delta: f64) -> Result<(), RunError> {
        self.dispatcher.execute(time, delta)
    }

    /// The entity/component store
    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    /// The sealed precedence graph, for inspection
    pub fn graph(&self) -> &crate::schedule::graph::PrecedenceGraph {
        self.dispatcher.graph()
    }

    /// Creates an entity outside a frame; systems observe it on the next
    /// [`World::execute`]
    pub fn create_entity(&mut self, bundle: impl Bundle) -> Result<EntityId, RunError> {
        self.dispatcher.create_entity(bundle)
    }

    /// Destroys an entity outside a frame
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), AccessError> {
        self.dispatcher.destroy_entity(entity)
    }

    /// Borrows the registered system of type `S`, for observation
    pub fn system<S: System>(&self) -> Option<Ref<'_, S>> {
        self.dispatcher.system_ref::<S>()
    }

    /// Stops the system of type `S`: its queries forget everything and its
    /// `execute` no longer runs. Returns false if no such system exists
    pub fn stop<S: System>(&mut self) -> bool {
        match self.dispatcher.system_id::<S>() {
            Some(id) => {
                self.dispatcher.stop(id);
                true
            }
            None => false,
        }
    }

    /// Restarts a stopped system: query results are rebuilt from the live
    /// entity set and log changes from the stopped interval are skipped, not
    /// replayed. Returns false if no such system exists
    pub fn restart<S: System>(&mut self) -> bool {
        match self.dispatcher.system_id::<S>() {
            Some(id) => {
                self.dispatcher.restart(id);
                true
            }
            None => false,
        }
    }
}
