//! The dispatcher: registers systems, orders them, and drives frames

use super::{
    config::{
        ANCHORED_PRECEDENCE_WEIGHT, Constraint, ConstraintKind, ConstraintTarget,
        EXPLICIT_PRECEDENCE_WEIGHT,
    },
    error::{BuildDiagnostic, WorldBuildError},
    graph::PrecedenceGraph,
};
use crate::{
    changelog::ChangeLog,
    entity::EntityId,
    error::{AccessError, RunError},
    storage::ComponentColumn,
    system::{
        AttachmentSlot, RunState, System, SystemCell, SystemContext, SystemDeclaration, SystemId,
        SystemState,
    },
    world::{Bundle, Registry},
};
use alloc::{
    boxed::Box,
    format,
    string::String,
    vec,
    vec::Vec,
};
use cadence_core::{collections::TypeIdMap, debug::ShortName};
use core::{
    any::TypeId,
    cell::{Ref, RefCell},
};

/// A system registration captured by the world builder
pub(crate) struct SystemDef {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) system: Box<dyn System>,
}

/// Owns every system (user struct and framework container alike), the
/// registry, and both change logs, and executes frames serially in sealed
/// topological order
pub struct Dispatcher {
    registry: Registry,
    shape_log: ChangeLog,
    write_log: ChangeLog,
    states: Vec<SystemState>,
    systems: Vec<SystemCell>,
    by_type: TypeIdMap<SystemId>,
    order: Vec<SystemId>,
    graph: PrecedenceGraph,
}

impl Dispatcher {
    /// Runs the whole world-creation pipeline: declaration, graph
    /// construction and sealing, container finalization, attachment
    /// resolution and the initialize hooks. Configuration problems are
    /// aggregated; any at all fail the build
    pub(crate) fn build(
        max_entities: usize,
        components: crate::component::Components,
        columns: Vec<Box<dyn ComponentColumn>>,
        definitions: Vec<SystemDef>,
        mut diagnostics: Vec<BuildDiagnostic>,
    ) -> Result<Self, WorldBuildError> {
        let shape_log = ChangeLog::new();
        let write_log = ChangeLog::new();
        let mut registry = Registry::new(components, columns, max_entities);

        let mut states = Vec::with_capacity(definitions.len());
        let mut systems: Vec<SystemCell> = Vec::with_capacity(definitions.len());
        let mut by_type = TypeIdMap::default();
        for (index, definition) in definitions.into_iter().enumerate() {
            let id = SystemId::from_index(index as u32);
            let name = format!("{}", ShortName(definition.name)).into_boxed_str();
            if by_type.insert(definition.type_id, id).is_some() {
                diagnostics.push(BuildDiagnostic::DuplicateSystem {
                    system: String::from(&*name),
                });
            }
            states.push(SystemState::new(
                id,
                name,
                shape_log.create_pointer(),
                max_entities,
            ));
            systems.push(RefCell::new(definition.system));
        }

        // Declaration: each system compiles its queries, contributes
        // schedule constraints and creates attachment placeholders
        for (state, cell) in states.iter_mut().zip(&systems) {
            let mut system = cell.borrow_mut();
            let mut declaration = SystemDeclaration {
                components: registry.components_mut(),
                state,
                errors: &mut diagnostics,
            };
            system.declare(&mut declaration);
        }

        // Who writes what, needed for component-anchored constraints
        let mut writers: Vec<Vec<SystemId>> = vec![Vec::new(); registry.components().len()];
        for state in &states {
            for component in state.write_mask().iter() {
                writers[component.index()].push(state.id());
            }
        }

        let mut graph = PrecedenceGraph::new(
            states.iter().map(|state| Box::from(state.name())).collect(),
        );
        for index in 0..states.len() {
            for constraint in states[index].take_constraints() {
                translate_constraint(
                    &mut graph,
                    index,
                    constraint,
                    states[index].name(),
                    &by_type,
                    &registry,
                    &writers,
                    &mut diagnostics,
                );
            }
        }

        match graph.seal() {
            Ok(()) => {}
            Err(error) => {
                diagnostics.extend(error.cycles.into_iter().map(BuildDiagnostic::Cycle));
            }
        }

        for state in &mut states {
            state.finalize(&write_log);
            let system = String::from(state.name());
            for slot in state.attachments_mut() {
                if let AttachmentSlot::Unresolved { target, name } = *slot {
                    match by_type.get(&target) {
                        Some(&id) => *slot = AttachmentSlot::Resolved(id),
                        None => diagnostics.push(BuildDiagnostic::UnresolvedAttachment {
                            system: system.clone(),
                            target: format!("{}", ShortName(name)),
                        }),
                    }
                }
            }
        }

        if !diagnostics.is_empty() {
            return Err(WorldBuildError::new(diagnostics));
        }

        let order: Vec<SystemId> = graph
            .topological_order()
            .into_iter()
            .map(|node| SystemId::from_index(node as u32))
            .collect();
        log::debug!(
            "sealed schedule: {:?}",
            order
                .iter()
                .map(|id| states[id.index()].name())
                .collect::<Vec<_>>()
        );

        let mut dispatcher = Self {
            registry,
            shape_log,
            write_log,
            states,
            systems,
            by_type,
            order,
            graph,
        };
        dispatcher.run_initialize().map_err(|(system, error)| {
            WorldBuildError::new(vec![BuildDiagnostic::InitializeFailed { system, error }])
        })?;
        Ok(dispatcher)
    }

    /// Invokes every initialize hook once, in schedule order. Entities
    /// created here land in the logs ahead of all cursors, so every system's
    /// first query update observes them
    fn run_initialize(&mut self) -> Result<(), (String, RunError)> {
        for position in 0..self.order.len() {
            let index = self.order[position].index();
            let state = &mut self.states[index];
            let mut system = self.systems[index].borrow_mut();
            let mut context = SystemContext {
                state,
                registry: &mut self.registry,
                shape_log: &mut self.shape_log,
                write_log: &mut self.write_log,
                peers: &self.systems,
            };
            let result = system.initialize(&mut context);
            if let Err(error) = result {
                return Err((String::from(self.states[index].name()), error));
            }
        }
        Ok(())
    }

    /// Runs one frame with the given timestamp and delta (seconds)
    ///
    /// Systems execute serially in topological order; each consumes the log
    /// entries accumulated since its previous turn before its body runs, so
    /// it observes exactly the changes made by systems ahead of it
    pub(crate) fn execute(&mut self, time: f64, delta: f64) -> Result<(), RunError> {
        for position in 0..self.order.len() {
            let index = self.order[position].index();
            let state = &mut self.states[index];
            if state.run_state() != RunState::Running {
                continue;
            }
            #[cfg(feature = "trace")]
            let _span = tracing::info_span!("system", name = state.name()).entered();
            state.begin_frame(time, delta);
            state.update_queries(&self.registry, &self.shape_log, &self.write_log);
            let mut system = self.systems[index].borrow_mut();
            let mut context = SystemContext {
                state,
                registry: &mut self.registry,
                shape_log: &mut self.shape_log,
                write_log: &mut self.write_log,
                peers: &self.systems,
            };
            system.execute(&mut context)?;
        }
        self.end_frame();
        Ok(())
    }

    /// End-of-frame housekeeping: recently deleted entities are reclaimed
    /// and both logs are compacted up to the slowest running consumer
    fn end_frame(&mut self) {
        self.registry.purge();
        let mut shape_horizon = self.shape_log.tail();
        let mut write_horizon = self.write_log.tail();
        for state in &self.states {
            if state.run_state() != RunState::Running {
                continue;
            }
            shape_horizon = shape_horizon.min(state.shape_cursor().position());
            if let Some(cursor) = state.write_cursor() {
                write_horizon = write_horizon.min(cursor.position());
            }
        }
        self.shape_log.compact(shape_horizon);
        self.write_log.compact(write_horizon);
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The sealed precedence graph
    #[inline]
    pub fn graph(&self) -> &PrecedenceGraph {
        &self.graph
    }

    /// The topological execution order
    #[inline]
    pub fn order(&self) -> &[SystemId] {
        &self.order
    }

    pub(crate) fn system_id<S: System>(&self) -> Option<SystemId> {
        self.by_type.get(&TypeId::of::<S>()).copied()
    }

    pub(crate) fn system_ref<S: System>(&self) -> Option<Ref<'_, S>> {
        let id = self.system_id::<S>()?;
        Some(Ref::map(self.systems[id.index()].borrow(), |system| {
            system.downcast_ref::<S>().unwrap()
        }))
    }

    pub(crate) fn stop(&mut self, id: SystemId) {
        self.states[id.index()].stop();
    }

    pub(crate) fn restart(&mut self, id: SystemId) {
        let state = &mut self.states[id.index()];
        state.restart(&self.registry, &self.shape_log, &self.write_log);
    }

    pub(crate) fn create_entity(&mut self, bundle: impl Bundle) -> Result<EntityId, RunError> {
        self.registry.create_entity(bundle, &mut self.shape_log)
    }

    pub(crate) fn destroy_entity(&mut self, entity: EntityId) -> Result<(), AccessError> {
        self.registry.destroy_entity(entity, &mut self.shape_log)
    }
}

/// Turns one declarative constraint into weighted edges. Named peers use the
/// explicit weight; component-anchored constraints fan out to every writer
/// at the weaker anchored weight. Denials ride along at the weight of their
/// specificity
#[allow(clippy::too_many_arguments)]
fn translate_constraint(
    graph: &mut PrecedenceGraph,
    index: usize,
    constraint: Constraint,
    system_name: &str,
    by_type: &TypeIdMap<SystemId>,
    registry: &Registry,
    writers: &[Vec<SystemId>],
    diagnostics: &mut Vec<BuildDiagnostic>,
) {
    match constraint.target {
        ConstraintTarget::System { type_id, name } => match by_type.get(&type_id) {
            Some(&target) => apply_edge(
                graph,
                constraint.kind,
                index,
                target.index(),
                EXPLICIT_PRECEDENCE_WEIGHT,
            ),
            None => diagnostics.push(BuildDiagnostic::UnknownScheduleTarget {
                system: String::from(system_name),
                target: format!("{}", ShortName(name)),
            }),
        },
        ConstraintTarget::WritersOf { type_id, name } => {
            match registry.components().id_of_type(type_id) {
                Some(component) => {
                    for &writer in &writers[component.index()] {
                        if writer.index() != index {
                            apply_edge(
                                graph,
                                constraint.kind,
                                index,
                                writer.index(),
                                ANCHORED_PRECEDENCE_WEIGHT,
                            );
                        }
                    }
                }
                None => diagnostics.push(BuildDiagnostic::UnknownComponent {
                    system: String::from(system_name),
                    component: format!("{}", ShortName(name)),
                }),
            }
        }
    }
}

fn apply_edge(
    graph: &mut PrecedenceGraph,
    kind: ConstraintKind,
    from: usize,
    to: usize,
    weight: i32,
) {
    match kind {
        ConstraintKind::Before => graph.add(from, to, weight),
        ConstraintKind::After => graph.add(to, from, weight),
        ConstraintKind::Unordered => {
            graph.deny(from, to, weight);
            graph.deny(to, from, weight);
        }
    }
}
