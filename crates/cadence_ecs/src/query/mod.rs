//! Compiled entity queries and their incremental maintenance
//!
//! A query is compiled once, while its host system is being declared, into a
//! predicate over component masks plus the access it needs. From then on it
//! is only ever *updated*: the host system feeds it shape and write events
//! drawn from the change logs, and the query keeps its result set equal to
//! the live entities matching the predicate

use crate::{
    component::{Component, ComponentMask, Components},
    entity::EntityId,
    schedule::error::BuildDiagnostic,
    world::Registry,
};
use alloc::{format, string::String, vec::Vec};
use bitflags::bitflags;
use cadence_core::debug::ShortName;
use core::any::type_name;
use fixedbitset::FixedBitSet;

bitflags! {
    /// Capabilities a query was compiled with
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct QueryFlags: u8 {
        /// Declares write access to at least one component type
        const WRITES = 1 << 0;
        /// Keeps a transient set of entities whose membership (or tracked
        /// data) changed this frame
        const TRANSIENTS = 1 << 1;
    }
}

/// Identifies one query owned by a system
///
/// Handles are returned by
/// [`SystemDeclaration::query`](crate::system::SystemDeclaration::query) and
/// redeemed against the [`SystemContext`](crate::system::SystemContext) at
/// execution time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryHandle {
    pub(crate) index: u32,
}

/// A live, incrementally maintained set of entities matching a shape
/// predicate
#[derive(Debug)]
pub struct Query {
    flags: QueryFlags,
    required: ComponentMask,
    forbidden: ComponentMask,
    /// Component types whose writes land in the transient set
    watched_writes: ComponentMask,
    results: FixedBitSet,
    transients: Option<FixedBitSet>,
}

impl Query {
    /// True if this query declared write access to any component type
    #[inline]
    pub(crate) fn is_write_query(&self) -> bool {
        self.flags.contains(QueryFlags::WRITES)
    }

    /// True if this query takes part in write-log consumption: it declared
    /// write access, or it watches writes made by other systems
    #[inline]
    pub(crate) fn wants_write_events(&self) -> bool {
        self.is_write_query() || !self.watched_writes.is_empty()
    }

    #[inline]
    pub(crate) fn has_transients(&self) -> bool {
        self.transients.is_some()
    }

    #[inline]
    pub(crate) fn results(&self) -> &FixedBitSet {
        &self.results
    }

    pub(crate) fn transients(&self) -> Option<&FixedBitSet> {
        self.transients.as_ref()
    }

    /// Re-evaluates the predicate for `entity` and updates membership.
    /// A membership transition is recorded in the transient set
    pub(crate) fn handle_shape_update(&mut self, entity: EntityId, registry: &Registry) {
        let matches = registry.matches(entity, &self.required, &self.forbidden);
        let index = entity.index() as usize;
        if matches != self.results.contains(index) {
            self.results.set(index, matches);
            if let Some(transients) = &mut self.transients {
                transients.insert(index);
            }
        }
    }

    /// Records a write to a watched component on a current member
    pub(crate) fn handle_write(&mut self, entity: EntityId, word: usize, bits: u32) {
        let index = entity.index() as usize;
        if self.watched_writes.intersects_word(word, bits) && self.results.contains(index) {
            if let Some(transients) = &mut self.transients {
                transients.insert(index);
            }
        }
    }

    pub(crate) fn clear_transients(&mut self) {
        if let Some(transients) = &mut self.transients {
            transients.clear();
        }
    }

    /// Forgets every known entity; used when the host system stops so a
    /// restart re-discovers the world
    pub(crate) fn clear_results(&mut self) {
        self.results.clear();
        self.clear_transients();
    }
}

/// Builder DSL handed to
/// [`SystemDeclaration::query`](crate::system::SystemDeclaration::query)
///
/// Component types referenced here must already be registered with the world
/// builder; unknown types are reported as configuration diagnostics and the
/// affected constraint is skipped
pub struct QueryBuilder<'a> {
    components: &'a mut Components,
    system: &'a str,
    errors: &'a mut Vec<BuildDiagnostic>,
    required: ComponentMask,
    forbidden: ComponentMask,
    optional: ComponentMask,
    reads: ComponentMask,
    writes: ComponentMask,
    watched: ComponentMask,
    flags: QueryFlags,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(
        components: &'a mut Components,
        system: &'a str,
        errors: &'a mut Vec<BuildDiagnostic>,
    ) -> Self {
        Self {
            components,
            system,
            errors,
            required: ComponentMask::new(),
            forbidden: ComponentMask::new(),
            optional: ComponentMask::new(),
            reads: ComponentMask::new(),
            writes: ComponentMask::new(),
            watched: ComponentMask::new(),
            flags: QueryFlags::empty(),
        }
    }

    fn lookup<T: Component>(&mut self) -> Option<crate::component::ComponentTypeId> {
        let id = self.components.id_of::<T>();
        if id.is_none() {
            self.errors.push(BuildDiagnostic::UnknownComponent {
                system: String::from(self.system),
                component: format!("{}", ShortName(type_name::<T>())),
            });
        }
        id
    }

    /// Entities must have `T`. Grants read access
    pub fn with<T: Component>(&mut self) -> &mut Self {
        if let Some(id) = self.lookup::<T>() {
            self.required.set(id);
            self.reads.set(id);
        }
        self
    }

    /// Entities must not have `T`
    pub fn without<T: Component>(&mut self) -> &mut Self {
        if let Some(id) = self.lookup::<T>() {
            self.forbidden.set(id);
        }
        self
    }

    /// `T` may or may not be present; grants read access without
    /// constraining the predicate
    pub fn maybe<T: Component>(&mut self) -> &mut Self {
        if let Some(id) = self.lookup::<T>() {
            self.optional.set(id);
            self.reads.set(id);
        }
        self
    }

    /// Declares write access to `T`. If `T` was not otherwise referenced it
    /// is treated as optional
    pub fn writes<T: Component>(&mut self) -> &mut Self {
        if let Some(id) = self.lookup::<T>() {
            if !self.required.contains(id) {
                self.optional.set(id);
            }
            self.reads.set(id);
            self.writes.set(id);
            self.flags |= QueryFlags::WRITES;
        }
        self
    }

    /// Watches writes made to `T` by other systems: members whose `T` was
    /// written show up in the transient set. Marks `T` as tracked so writes
    /// to it are logged
    pub fn track<T: Component>(&mut self) -> &mut Self {
        if let Some(id) = self.lookup::<T>() {
            self.watched.set(id);
            self.reads.set(id);
            self.components.mark_tracked(id);
            self.flags |= QueryFlags::TRANSIENTS;
        }
        self
    }

    /// Keeps a transient set of entities that entered or left the query this
    /// frame, even without tracking any writes
    pub fn transient(&mut self) -> &mut Self {
        self.flags |= QueryFlags::TRANSIENTS;
        self
    }

    /// Compiles the query. Returns the query plus the read and write masks
    /// to OR into the host system
    pub(crate) fn finish(self, entity_capacity: usize) -> (Query, ComponentMask, ComponentMask) {
        let transients = self
            .flags
            .contains(QueryFlags::TRANSIENTS)
            .then(|| FixedBitSet::with_capacity(entity_capacity));
        let query = Query {
            flags: self.flags,
            required: self.required,
            forbidden: self.forbidden,
            watched_writes: self.watched,
            results: FixedBitSet::with_capacity(entity_capacity),
            transients,
        };
        (query, self.reads, self.writes)
    }
}
