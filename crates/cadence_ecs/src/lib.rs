#![no_std]

//! A frame-driven Entity-Component-System runtime.
//!
//! Application logic lives in [`System`](system::System)s that run once per
//! frame over the entities matched by their [`Query`](query::Query)s. The
//! [`Dispatcher`](schedule::Dispatcher) orders systems with a weighted
//! precedence graph and drives them serially; queries stay current by
//! consuming the world's append-only shape and write logs incrementally, so
//! each system observes exactly the changes made by the systems that ran
//! before it.

#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

pub mod changelog;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod schedule;
pub mod storage;
pub mod system;
pub mod world;

/// The most common types, re-exported for glob imports
pub mod prelude {
    pub use crate::{
        component::Component,
        entity::EntityId,
        error::{AccessError, CapacityError, RunError, SystemResult},
        query::{QueryBuilder, QueryHandle},
        schedule::ScheduleBuilder,
        system::{Attach, System, SystemContext, SystemDeclaration},
        world::{World, WorldBuilder},
    };
}
