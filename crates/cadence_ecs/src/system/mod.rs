//! User-defined systems and their framework-side containers
//!
//! A system is a plain struct implementing [`System`]. During world creation
//! the dispatcher calls [`System::declare`] exactly once, handing it a
//! [`SystemDeclaration`] through which the system compiles its queries,
//! contributes schedule constraints and creates [`Attach`] placeholders.
//! After declaration the shape of a system is frozen; per frame the
//! dispatcher runs [`System::execute`] with a [`SystemContext`] scoped to
//! that system's turn

mod context;
mod state;

pub use context::SystemContext;
pub use state::SystemState;

use crate::{
    error::SystemResult,
    query::{QueryBuilder, QueryHandle},
    schedule::{ScheduleBuilder, error::BuildDiagnostic},
};
use alloc::{boxed::Box, string::String, vec::Vec};
use core::{
    any::{TypeId, type_name},
    cell::RefCell,
    marker::PhantomData,
};
use derive_more::derive::Display;
use downcast_rs::{Downcast, impl_downcast};

/// How user systems are stored by the dispatcher. The `RefCell` lets a
/// running system borrow an attached peer while itself being borrowed
pub(crate) type SystemCell = RefCell<Box<dyn System>>;

/// Stable sequential id of a system, assigned in registration order
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[repr(transparent)]
pub struct SystemId(u32);

impl SystemId {
    #[inline]
    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// The dense index of this system
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a system takes part in frame execution
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RunState {
    #[default]
    Running,
    Stopped,
}

/// A unit of per-frame application logic
///
/// Implementations are registered with the
/// [`WorldBuilder`](crate::world::WorldBuilder); the dispatcher owns every
/// instance and drives the lifecycle: `declare` once during world creation,
/// `initialize` once before the first frame, then `execute` every frame
/// while the system is running
pub trait System: Downcast {
    /// Declares queries, schedule constraints and attachments. Called
    /// exactly once, before any frame runs
    fn declare(&mut self, declaration: &mut SystemDeclaration<'_>) {
        let _ = declaration;
    }

    /// One-time setup, run in schedule order before the first frame.
    /// Entities created here are visible to every system's first query
    /// update. A failure aborts world creation
    fn initialize(&mut self, context: &mut SystemContext<'_>) -> SystemResult {
        let _ = context;
        Ok(())
    }

    /// The per-frame body
    fn execute(&mut self, context: &mut SystemContext<'_>) -> SystemResult;
}

impl_downcast!(System);

/// Placeholder reference to a peer system, created during declaration and
/// resolved by the dispatcher once every system is registered
///
/// Store the handle in a field and redeem it at execution time with
/// [`SystemContext::attached`] or [`SystemContext::attached_mut`]
#[derive(Debug)]
pub struct Attach<S: System> {
    slot: u32,
    marker: PhantomData<fn() -> S>,
}

impl<S: System> Clone for Attach<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: System> Copy for Attach<S> {}

impl<S: System> Attach<S> {
    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }
}

/// One attachment placeholder held by a system container
///
/// The variant transitions from `Unresolved` to `Resolved` exactly once,
/// during dispatcher finalization; an unresolvable target fails world
/// creation
#[derive(Clone, Copy, Debug)]
pub(crate) enum AttachmentSlot {
    Unresolved {
        target: TypeId,
        name: &'static str,
    },
    Resolved(SystemId),
}

/// The declaration surface a system sees while the world is being built
///
/// Queries and schedules can only be declared here; once world creation
/// finishes no further declaration is possible
pub struct SystemDeclaration<'a> {
    pub(crate) components: &'a mut crate::component::Components,
    pub(crate) state: &'a mut SystemState,
    pub(crate) errors: &'a mut Vec<BuildDiagnostic>,
}

impl SystemDeclaration<'_> {
    /// Compiles a query from the builder closure and registers it with this
    /// system. The query's access is ORed into the system's read and write
    /// masks
    pub fn query(&mut self, build: impl FnOnce(&mut QueryBuilder<'_>)) -> QueryHandle {
        let name = String::from(self.state.name());
        let mut builder = QueryBuilder::new(&mut *self.components, &name, &mut *self.errors);
        build(&mut builder);
        self.state.push_query(builder)
    }

    /// Contributes ordering constraints for this system. At most one
    /// schedule may be declared; a second call is a configuration error
    pub fn schedule(&mut self, build: impl FnOnce(&mut ScheduleBuilder)) {
        if self.state.schedule_declared() {
            self.errors.push(BuildDiagnostic::DuplicateSchedule {
                system: String::from(self.state.name()),
            });
            return;
        }
        let mut builder = ScheduleBuilder::default();
        build(&mut builder);
        self.state.set_constraints(builder.constraints);
    }

    /// Creates a placeholder reference to the peer system `S`. Resolution
    /// happens after all systems are registered; if `S` is not among them,
    /// world creation fails
    pub fn attach<S: System>(&mut self) -> Attach<S> {
        let slot = self.state.push_attachment(AttachmentSlot::Unresolved {
            target: TypeId::of::<S>(),
            name: type_name::<S>(),
        });
        Attach {
            slot,
            marker: PhantomData,
        }
    }
}
