//! Provides replacements for `std::hash` items using [`foldhash`]

use core::hash::{BuildHasher, Hasher};
pub use foldhash::fast::{FixedState, FoldHasher as DefaultHasher};

const FIXED_HASHER: FixedState =
    FixedState::with_seed(0b0110010101110100010111000010001101100100110001010010011010010111);

/// Deterministic hasher based upon a random but fixed state
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHasher;
impl BuildHasher for FixedHasher {
    type Hasher = DefaultHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASHER.build_hasher()
    }
}

/// [`BuildHasher`] for keys that are already well distributed, such as
/// [`TypeId`](core::any::TypeId). Forwards the written integer instead of
/// mixing it.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHash;

impl BuildHasher for NoOpHash {
    type Hasher = NoOpHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher(0)
    }
}

/// The [`Hasher`] produced by [`NoOpHash`]
#[derive(Debug)]
pub struct NoOpHasher(u64);

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        // `TypeId` writes its raw bytes; fold them so every byte participates
        self.0 = bytes
            .iter()
            .fold(self.0, |hash, b| hash.rotate_left(8).wrapping_add(*b as u64));
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }

    #[inline]
    fn write_u128(&mut self, i: u128) {
        self.0 = i as u64 ^ (i >> 64) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::BuildHasher;

    #[test]
    fn fixed_hasher_is_deterministic() {
        let a = FixedHasher.hash_one("cadence");
        let b = FixedHasher.hash_one("cadence");
        assert_eq!(a, b);
        assert_ne!(FixedHasher.hash_one("cadence"), FixedHasher.hash_one("ecs"));
    }

    #[test]
    fn no_op_hasher_passes_integers_through() {
        let mut hasher = NoOpHash.build_hasher();
        hasher.write_u64(0xDEAD_BEEF);
        assert_eq!(hasher.finish(), 0xDEAD_BEEF);
    }
}
