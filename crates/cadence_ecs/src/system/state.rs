//! Framework-side container state kept per system

use super::{AttachmentSlot, RunState, SystemId};
use crate::{
    changelog::{ChangeLog, LogPointer, unpack_write_entry},
    component::ComponentMask,
    entity::EntityId,
    query::{Query, QueryBuilder, QueryHandle},
    schedule::config::Constraint,
    world::Registry,
};
use alloc::{boxed::Box, vec::Vec};
use fixedbitset::FixedBitSet;

/// Everything the framework tracks about one registered system: masks,
/// queries, log cursors, run state and the per-frame processed set
///
/// The dispatcher owns one `SystemState` per system; the user's system
/// struct itself lives separately so both can be borrowed during a frame
pub struct SystemState {
    id: SystemId,
    name: Box<str>,
    run_state: RunState,
    read_mask: ComponentMask,
    write_mask: ComponentMask,
    queries: Vec<Query>,
    shape_cursor: LogPointer,
    /// Allocated at finalize, and only when the system has write queries
    write_cursor: Option<LogPointer>,
    /// Entities already delivered a shape update this frame; write events
    /// for them are skipped because the shape update subsumes the write
    processed: FixedBitSet,
    attachments: Vec<AttachmentSlot>,
    constraints: Vec<Constraint>,
    schedule_declared: bool,
    has_transient_queries: bool,
    ran_queries_last_frame: bool,
    time: f64,
    delta: f64,
}

impl SystemState {
    pub(crate) fn new(
        id: SystemId,
        name: Box<str>,
        shape_cursor: LogPointer,
        entity_capacity: usize,
    ) -> Self {
        Self {
            id,
            name,
            run_state: RunState::Running,
            read_mask: ComponentMask::new(),
            write_mask: ComponentMask::new(),
            queries: Vec::new(),
            shape_cursor,
            write_cursor: None,
            processed: FixedBitSet::with_capacity(entity_capacity),
            attachments: Vec::new(),
            constraints: Vec::new(),
            schedule_declared: false,
            has_transient_queries: false,
            ran_queries_last_frame: false,
            time: 0.0,
            delta: 0.0,
        }
    }

    #[inline]
    pub fn id(&self) -> SystemId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[inline]
    pub fn read_mask(&self) -> &ComponentMask {
        &self.read_mask
    }

    #[inline]
    pub fn write_mask(&self) -> &ComponentMask {
        &self.write_mask
    }

    #[inline]
    pub(crate) fn entity_capacity(&self) -> usize {
        self.processed.len()
    }

    #[inline]
    pub(crate) fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub(crate) fn delta(&self) -> f64 {
        self.delta
    }

    pub(crate) fn query(&self, handle: &QueryHandle) -> &Query {
        &self.queries[handle.index as usize]
    }

    pub(crate) fn push_query(&mut self, builder: QueryBuilder<'_>) -> QueryHandle {
        let capacity = self.entity_capacity();
        let (query, reads, writes) = builder.finish(capacity);
        self.read_mask.union_with(&reads);
        self.write_mask.union_with(&writes);
        self.queries.push(query);
        QueryHandle {
            index: (self.queries.len() - 1) as u32,
        }
    }

    pub(crate) fn schedule_declared(&self) -> bool {
        self.schedule_declared
    }

    pub(crate) fn set_constraints(&mut self, constraints: Vec<Constraint>) {
        self.schedule_declared = true;
        self.constraints = constraints;
    }

    pub(crate) fn take_constraints(&mut self) -> Vec<Constraint> {
        core::mem::take(&mut self.constraints)
    }

    pub(crate) fn push_attachment(&mut self, slot: AttachmentSlot) -> u32 {
        self.attachments.push(slot);
        (self.attachments.len() - 1) as u32
    }

    pub(crate) fn attachments_mut(&mut self) -> &mut [AttachmentSlot] {
        &mut self.attachments
    }

    pub(crate) fn attachment(&self, slot: usize) -> AttachmentSlot {
        self.attachments[slot]
    }

    pub(crate) fn shape_cursor(&self) -> &LogPointer {
        &self.shape_cursor
    }

    pub(crate) fn write_cursor(&self) -> Option<&LogPointer> {
        self.write_cursor.as_ref()
    }

    /// Late setup once every query is declared: allocates the write cursor
    /// if any query consumes write events, and caches whether transient
    /// sets exist
    pub(crate) fn finalize(&mut self, write_log: &ChangeLog) {
        if self.queries.iter().any(Query::wants_write_events) {
            self.write_cursor = Some(write_log.create_pointer());
        }
        self.has_transient_queries = self.queries.iter().any(Query::has_transients);
    }

    pub(crate) fn begin_frame(&mut self, time: f64, delta: f64) {
        self.time = time;
        self.delta = delta;
    }

    /// Brings every query up to date with the logs before the system's
    /// `execute` runs
    ///
    /// Three paths, chosen from the two log flags:
    /// 1. either log has news: clear transients, then consume the shape log
    ///    and the write log (shape updates subsume same-frame writes);
    /// 2. no news, but transients from last frame exist: clear them only;
    /// 3. otherwise nothing to do.
    /// Transients therefore persist across exactly one idle frame
    pub(crate) fn update_queries(
        &mut self,
        registry: &Registry,
        shape_log: &ChangeLog,
        write_log: &ChangeLog,
    ) {
        let shapes_changed = shape_log.has_updates_since(&self.shape_cursor);
        let writes_made = self
            .write_cursor
            .as_ref()
            .is_some_and(|cursor| write_log.has_updates_since(cursor));

        if shapes_changed || writes_made {
            for query in &mut self.queries {
                query.clear_transients();
            }
            self.processed.clear();

            while let Some(batch) = shape_log.process_since(&mut self.shape_cursor) {
                for &entry in batch {
                    if self.processed.put(entry as usize) {
                        continue;
                    }
                    let entity = EntityId::from_index(entry);
                    for query in &mut self.queries {
                        query.handle_shape_update(entity, registry);
                    }
                }
            }

            if let Some(cursor) = &mut self.write_cursor {
                while let Some(batch) = write_log.process_since(cursor) {
                    for &entry in batch {
                        let (component_index, entity) = unpack_write_entry(entry);
                        if self.processed.contains(entity.index() as usize) {
                            continue;
                        }
                        let word = (component_index >> 5) as usize;
                        let bits = 1u32 << (component_index & 31);
                        for query in &mut self.queries {
                            if query.wants_write_events() {
                                query.handle_write(entity, word, bits);
                            }
                        }
                    }
                }
            }

            self.ran_queries_last_frame = true;
        } else if self.has_transient_queries && self.ran_queries_last_frame {
            for query in &mut self.queries {
                query.clear_transients();
            }
            self.ran_queries_last_frame = false;
        } else {
            self.ran_queries_last_frame = false;
        }
    }

    /// Takes the system out of frame execution and forgets every query
    /// result, so a later restart re-discovers the world
    pub(crate) fn stop(&mut self) {
        if self.run_state == RunState::Stopped {
            return;
        }
        self.run_state = RunState::Stopped;
        for query in &mut self.queries {
            query.clear_results();
        }
        log::trace!("system `{}` stopped", self.name);
    }

    /// Brings a stopped system back: rebuilds every query from the live
    /// entity set and re-anchors both cursors at the log tails, so changes
    /// from the stopped interval are not replayed
    pub(crate) fn restart(
        &mut self,
        registry: &Registry,
        shape_log: &ChangeLog,
        write_log: &ChangeLog,
    ) {
        if self.run_state == RunState::Running {
            return;
        }
        self.run_state = RunState::Running;
        for entity in registry.iter_alive() {
            for query in &mut self.queries {
                query.handle_shape_update(entity, registry);
            }
        }
        for query in &mut self.queries {
            query.clear_transients();
        }
        shape_log.reanchor(&mut self.shape_cursor);
        if let Some(cursor) = &mut self.write_cursor {
            write_log.reanchor(cursor);
        }
        self.ran_queries_last_frame = false;
        log::trace!("system `{}` restarted", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        changelog::pack_write_entry,
        component::{Component, Components},
        schedule::error::BuildDiagnostic,
        storage::{Column, ComponentColumn},
    };
    use alloc::vec;

    struct Position(#[allow(dead_code)] i32);
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    struct Harness {
        registry: Registry,
        shape_log: ChangeLog,
        write_log: ChangeLog,
        state: SystemState,
    }

    impl Harness {
        /// One system with a single query, built the way the dispatcher
        /// would build it
        fn new(configure: impl FnOnce(&mut crate::query::QueryBuilder)) -> Self {
            let mut components = Components::default();
            components.register::<Position>().unwrap();
            components.register::<Velocity>().unwrap();
            let columns: Vec<Box<dyn ComponentColumn>> = vec![
                Box::new(Column::<Position>::default()),
                Box::new(Column::<Velocity>::default()),
            ];
            let mut registry = Registry::new(components, columns, 32);
            let shape_log = ChangeLog::new();
            let write_log = ChangeLog::new();
            let mut state = SystemState::new(
                SystemId::from_index(0),
                Box::from("harness"),
                shape_log.create_pointer(),
                32,
            );
            let mut errors: Vec<BuildDiagnostic> = Vec::new();
            let mut builder =
                crate::query::QueryBuilder::new(registry.components_mut(), "harness", &mut errors);
            configure(&mut builder);
            state.push_query(builder);
            assert!(errors.is_empty());
            state.finalize(&write_log);
            Harness {
                registry,
                shape_log,
                write_log,
                state,
            }
        }

        fn update(&mut self) {
            self.state
                .update_queries(&self.registry, &self.shape_log, &self.write_log);
        }

        fn spawn_position(&mut self) -> EntityId {
            self.registry
                .create_entity(Position(0), &mut self.shape_log)
                .unwrap()
        }

        fn results(&self) -> Vec<u32> {
            self.state.queries[0]
                .results()
                .ones()
                .map(|index| index as u32)
                .collect()
        }

        fn transients(&self) -> Vec<u32> {
            self.state.queries[0]
                .transients()
                .map(|set| set.ones().map(|index| index as u32).collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn results_track_the_live_matching_set() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>();
        });
        let a = harness.spawn_position();
        let b = harness.spawn_position();
        harness.update();
        assert_eq!(harness.results(), [a.index(), b.index()]);

        harness
            .registry
            .destroy_entity(a, &mut harness.shape_log)
            .unwrap();
        harness.update();
        assert_eq!(harness.results(), [b.index()]);
    }

    #[test]
    fn shape_updates_are_delivered_at_most_once_per_frame() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>().transient();
        });
        let entity = harness.spawn_position();
        // Two more shape entries for the same entity in the same frame:
        // remove then re-add the component
        harness
            .registry
            .remove_component::<Position>(entity, &mut harness.shape_log)
            .unwrap();
        harness
            .registry
            .add_component(entity, Position(1), &mut harness.shape_log)
            .unwrap();
        harness.update();
        // One delivery: the entity entered once, no flicker from the
        // duplicate entries
        assert_eq!(harness.results(), [entity.index()]);
        assert_eq!(harness.transients(), [entity.index()]);
    }

    #[test]
    fn same_frame_shape_change_subsumes_the_write() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>().track::<Position>();
        });
        let entity = harness.spawn_position();
        harness.update();

        // A write alone produces a transient...
        let position = harness.registry.components().id_of::<Position>().unwrap();
        harness.write_log.append(pack_write_entry(position, entity));
        harness.update();
        assert_eq!(harness.transients(), [entity.index()]);

        // ...but when the same entity also has a shape entry this frame, the
        // shape update wins and the write is skipped. Adding Velocity leaves
        // membership intact, so nothing lands in the transient set at all
        harness
            .registry
            .add_component(entity, Velocity, &mut harness.shape_log)
            .unwrap();
        harness.write_log.append(pack_write_entry(position, entity));
        harness.update();
        assert!(harness.transients().is_empty());
    }

    #[test]
    fn transients_persist_across_exactly_one_idle_frame() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>().transient();
        });
        let entity = harness.spawn_position();
        harness.update();
        assert_eq!(harness.transients(), [entity.index()]);

        // First idle frame: path 2 clears the transients
        harness.update();
        assert!(harness.transients().is_empty());

        // Further idle frames: path 3, nothing to do
        harness.update();
        assert!(harness.transients().is_empty());
    }

    #[test]
    fn write_cursor_exists_only_when_needed() {
        let read_only = Harness::new(|q| {
            q.with::<Position>();
        });
        assert!(read_only.state.write_cursor().is_none());

        let writer = Harness::new(|q| {
            q.with::<Position>().writes::<Position>();
        });
        assert!(writer.state.write_cursor().is_some());

        let tracker = Harness::new(|q| {
            q.with::<Position>().track::<Position>();
        });
        assert!(tracker.state.write_cursor().is_some());
    }

    #[test]
    fn stop_clears_results_and_restart_rebuilds_without_replay() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>().transient();
        });
        let a = harness.spawn_position();
        harness.update();
        assert_eq!(harness.results(), [a.index()]);

        harness.state.stop();
        assert_eq!(harness.state.run_state(), RunState::Stopped);
        assert!(harness.results().is_empty());

        // Changes accumulate while stopped
        let b = harness.spawn_position();
        harness
            .registry
            .destroy_entity(a, &mut harness.shape_log)
            .unwrap();
        harness.registry.purge();

        harness.state.restart(
            &harness.registry,
            &harness.shape_log,
            &harness.write_log,
        );
        assert_eq!(harness.state.run_state(), RunState::Running);
        // Rebuilt from liveness, not from the log
        assert_eq!(harness.results(), [b.index()]);
        assert!(harness.transients().is_empty());
        // The stopped interval's entries were skipped: nothing left to read
        assert!(!harness.shape_log.has_updates_since(harness.state.shape_cursor()));
        harness.update();
        assert_eq!(harness.results(), [b.index()]);
    }

    #[test]
    fn restart_of_a_running_system_is_a_no_op() {
        let mut harness = Harness::new(|q| {
            q.with::<Position>();
        });
        let _entity = harness.spawn_position();
        harness.state.restart(
            &harness.registry,
            &harness.shape_log,
            &harness.write_log,
        );
        // Cursor was not re-anchored; the pending entry is still there
        assert!(harness.shape_log.has_updates_since(harness.state.shape_cursor()));
    }

    #[test]
    fn duplicate_schedule_declarations_are_rejected() {
        let shape_log = ChangeLog::new();
        let mut components = Components::default();
        let mut state = SystemState::new(
            SystemId::from_index(0),
            Box::from("doubled"),
            shape_log.create_pointer(),
            8,
        );
        let mut errors = Vec::new();
        let mut declaration = crate::system::SystemDeclaration {
            components: &mut components,
            state: &mut state,
            errors: &mut errors,
        };
        declaration.schedule(|_| {});
        declaration.schedule(|_| {});
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            BuildDiagnostic::DuplicateSchedule { .. }
        ));
    }

    #[test]
    fn queries_share_the_system_masks() {
        let harness = Harness::new(|q| {
            q.with::<Position>().writes::<Velocity>();
        });
        let position = harness.registry.components().id_of::<Position>().unwrap();
        let velocity = harness.registry.components().id_of::<Velocity>().unwrap();
        assert!(harness.state.read_mask().contains(position));
        assert!(harness.state.write_mask().contains(velocity));
        assert!(!harness.state.write_mask().contains(position));
    }
}
