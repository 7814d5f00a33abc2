//! Runtime error kinds surfaced to user code
//!
//! Configuration problems found while the world is being wired together live
//! in [`schedule::error`](crate::schedule::error) instead; everything here
//! can occur during a frame

use crate::entity::EntityId;
use alloc::string::String;

/// A fault in how a system used the runtime, fatal at the call site
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    /// A system acquired write access to a component type its queries never
    /// declared writable
    #[error("system `{system}` wrote component `{component}` without declaring write access")]
    UndeclaredWrite {
        system: String,
        component: &'static str,
    },

    /// A component type was used before being registered with the world
    /// builder
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// The entity is dead (and not visible under the recently-deleted
    /// toggle)
    #[error("entity {0} is not alive")]
    DeadEntity(EntityId),

    /// The entity's shape does not include the requested component
    #[error("entity {entity} has no `{component}` component")]
    MissingComponent {
        entity: EntityId,
        component: &'static str,
    },
}

/// A fixed capacity of the world was exhausted
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum CapacityError {
    /// No free entity ids remain
    #[error("entity capacity of {0} exhausted")]
    Entities(usize),

    /// The packed log-entry format cannot address more component types
    #[error("component type capacity of {0} exhausted")]
    ComponentTypes(usize),
}

/// Any error a system body can produce while a frame runs
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Result type of [`System::execute`](crate::system::System::execute) and
/// [`System::initialize`](crate::system::System::initialize)
pub type SystemResult = Result<(), RunError>;
