#![no_std]

//! Foundational utilities shared by the cadence crates: deterministic hashing
//! and the collection types built on top of it

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod collections;
pub mod debug;
pub mod hash;
