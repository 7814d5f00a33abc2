//! The constraint DSL systems use to place themselves in the schedule

use crate::{component::Component, system::System};
use alloc::vec::Vec;
use core::any::{TypeId, type_name};

/// Strength of an edge anchored on a component (the set of systems writing
/// it) rather than a named peer
pub(crate) const ANCHORED_PRECEDENCE_WEIGHT: i32 = 2;

/// Strength of an edge naming a specific peer system. More specific than an
/// anchored constraint, so it overrides one
pub(crate) const EXPLICIT_PRECEDENCE_WEIGHT: i32 = 4;

/// What a single constraint orders the declaring system against
#[derive(Clone, Copy, Debug)]
pub(crate) enum ConstraintTarget {
    /// A peer system, named by type
    System {
        type_id: TypeId,
        name: &'static str,
    },
    /// Every system that declares write access to the component type
    WritersOf {
        type_id: TypeId,
        name: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Before,
    After,
    Unordered,
}

/// One declarative ordering constraint, recorded during system declaration
/// and translated into weighted graph edges by the dispatcher
#[derive(Clone, Copy, Debug)]
pub(crate) struct Constraint {
    pub(crate) kind: ConstraintKind,
    pub(crate) target: ConstraintTarget,
}

/// Builder handed to
/// [`SystemDeclaration::schedule`](crate::system::SystemDeclaration::schedule)
///
/// Every method records a constraint against the declaring system; the set
/// is translated into precedence edges once all systems are registered
#[derive(Default)]
pub struct ScheduleBuilder {
    pub(crate) constraints: Vec<Constraint>,
}

impl ScheduleBuilder {
    fn push(&mut self, kind: ConstraintKind, target: ConstraintTarget) -> &mut Self {
        self.constraints.push(Constraint { kind, target });
        self
    }

    /// This system runs before `S` each frame
    pub fn before<S: System>(&mut self) -> &mut Self {
        self.push(
            ConstraintKind::Before,
            ConstraintTarget::System {
                type_id: TypeId::of::<S>(),
                name: type_name::<S>(),
            },
        )
    }

    /// This system runs after `S` each frame
    pub fn after<S: System>(&mut self) -> &mut Self {
        self.push(
            ConstraintKind::After,
            ConstraintTarget::System {
                type_id: TypeId::of::<S>(),
                name: type_name::<S>(),
            },
        )
    }

    /// Denies any inherited ordering between this system and `S`, in both
    /// directions
    pub fn unordered_with<S: System>(&mut self) -> &mut Self {
        self.push(
            ConstraintKind::Unordered,
            ConstraintTarget::System {
                type_id: TypeId::of::<S>(),
                name: type_name::<S>(),
            },
        )
    }

    /// This system runs before every system that writes `C`
    pub fn before_writers_of<C: Component>(&mut self) -> &mut Self {
        self.push(
            ConstraintKind::Before,
            ConstraintTarget::WritersOf {
                type_id: TypeId::of::<C>(),
                name: type_name::<C>(),
            },
        )
    }

    /// This system runs after every system that writes `C`
    pub fn after_writers_of<C: Component>(&mut self) -> &mut Self {
        self.push(
            ConstraintKind::After,
            ConstraintTarget::WritersOf {
                type_id: TypeId::of::<C>(),
                name: type_name::<C>(),
            },
        )
    }
}
