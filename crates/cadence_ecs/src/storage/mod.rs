//! Component data storage backing the registry

mod sparse_set;

pub use sparse_set::{SparseSet, SparseSetIndex};

use crate::{component::Component, entity::EntityId};
use downcast_rs::{Downcast, impl_downcast};

/// Type-erased view of a [`Column`], letting the registry evict dead
/// entities without knowing the component type
pub(crate) trait ComponentColumn: Downcast {
    /// Drops the value stored for `entity`, if any
    fn evict(&mut self, entity: EntityId);
}

impl_downcast!(ComponentColumn);

/// Storage for every instance of one component type
#[derive(Debug)]
pub(crate) struct Column<T: Component> {
    pub(crate) data: SparseSet<EntityId, T>,
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self {
            data: SparseSet::new(),
        }
    }
}

impl<T: Component> ComponentColumn for Column<T> {
    fn evict(&mut self, entity: EntityId) {
        self.data.remove(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    struct Health(u32);
    impl Component for Health {}

    #[test]
    fn columns_downcast_and_evict() {
        let mut column: Box<dyn ComponentColumn> = Box::new(Column::<Health>::default());
        let entity = EntityId::from_index(4);
        column
            .downcast_mut::<Column<Health>>()
            .unwrap()
            .data
            .insert(entity, Health(10));
        column.evict(entity);
        assert!(
            !column
                .downcast_ref::<Column<Health>>()
                .unwrap()
                .data
                .contains(entity)
        );
    }
}
