//! Provides [`HashMap`] and [`HashSet`] based on [hashbrown]'s implementation.
//! Unlike hashbrown's own aliases these default to [`FixedHasher`] instead of
//! a randomized state, which gives deterministic iteration-independent hashes
//! at an acceptable cost to denial-of-service resistance in the context of a
//! frame-driven runtime

use crate::hash::{FixedHasher, NoOpHash};
use core::any::TypeId;

/// A [`hashbrown::HashMap`] with a deterministic default hasher
pub type HashMap<K, V, S = FixedHasher> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] with a deterministic default hasher
pub type HashSet<T, S = FixedHasher> = hashbrown::HashSet<T, S>;

/// A specialized hashmap keyed by [`TypeId`]
/// `TypeId`s are already well distributed, so the pass-through [`NoOpHash`]
/// is used instead of rehashing them
pub type TypeIdMap<V> = HashMap<TypeId, V, NoOpHash>;
