//! Configuration problems found while a world is being wired together

use crate::error::RunError;
use alloc::{string::String, vec::Vec};
use core::fmt;

/// A single problem discovered during world creation
///
/// Diagnostics are collected rather than returned eagerly, so one failed
/// build reports everything that is wrong at once
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum BuildDiagnostic {
    /// The positive-edge precedence graph contains this directed cycle,
    /// rendered as the member system names
    #[error("precedence cycle: {0}")]
    Cycle(String),

    /// A system invoked [`SystemDeclaration::schedule`](crate::system::SystemDeclaration::schedule)
    /// more than once
    #[error("system `{system}` declares more than one schedule")]
    DuplicateSchedule { system: String },

    /// A query or schedule referenced a component type that was never
    /// registered with the world builder
    #[error("system `{system}` references component type `{component}` before registration")]
    UnknownComponent { system: String, component: String },

    /// A schedule constraint named a system type that is not registered
    #[error("system `{system}` schedules against `{target}`, which is not registered")]
    UnknownScheduleTarget { system: String, target: String },

    /// An attachment placeholder could not be resolved because its target
    /// system type is not registered
    #[error("system `{system}` attaches to `{target}`, which is not registered")]
    UnresolvedAttachment { system: String, target: String },

    /// The same system type was registered twice; attachment and schedule
    /// targets would be ambiguous
    #[error("system type `{system}` is registered more than once")]
    DuplicateSystem { system: String },

    /// More component types were registered than the packed log-entry format
    /// can address
    #[error("too many component types registered (limit {limit})")]
    TooManyComponents { limit: usize },

    /// A system's `initialize` hook failed
    #[error("system `{system}` failed to initialize: {error}")]
    InitializeFailed {
        system: String,
        #[source]
        error: RunError,
    },
}

/// Aggregate of every configuration problem found while building a world
#[derive(Debug)]
pub struct WorldBuildError {
    diagnostics: Vec<BuildDiagnostic>,
}

impl WorldBuildError {
    pub(crate) fn new(diagnostics: Vec<BuildDiagnostic>) -> Self {
        debug_assert!(!diagnostics.is_empty());
        Self { diagnostics }
    }

    /// Every problem found, in discovery order. Cycles are listed shortest
    /// first
    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for WorldBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world creation failed:")?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n  - {diagnostic}")?;
        }
        Ok(())
    }
}

impl core::error::Error for WorldBuildError {}
