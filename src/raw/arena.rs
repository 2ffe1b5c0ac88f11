use alloc::collections::TryReserveError;
use alloc::vec::Vec;

use super::handle::Handle;

/// Fixed-capacity backing store of node cells.
///
/// Every slot the arena will ever own is reserved at construction; after
/// that, allocation and release are free-list pushes and pops with no heap
/// traffic. `try_alloc` returning `None` is the "tree full" signal.
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
    capacity: usize,
}

impl<T> Arena<T> {
    /// Reserves storage for exactly `capacity` cells up front.
    ///
    /// Both the slot vector and the free stack are reserved in full so no
    /// later operation reallocates. Reservation failure is reported rather
    /// than aborting.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        let mut free = Vec::new();
        free.try_reserve_exact(capacity)?;
        Ok(Self { slots, free, capacity })
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live cells.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Claims a cell for `element`, or returns `None` when all `capacity`
    /// cells are live.
    pub(crate) fn try_alloc(&mut self, element: T) -> Option<Handle> {
        if let Some(h) = self.free.pop() {
            // Reuse a previously released slot.
            self.slots[h.to_index()] = Some(element);
            Some(h)
        } else if self.slots.len() < self.capacity {
            // Claim a never-used slot from the reservation.
            self.slots.push(Some(element));
            Some(Handle::from_index(self.slots.len() - 1))
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].as_ref().expect("`Arena::get()` - `handle` is not live!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].as_mut().expect("`Arena::get_mut()` - `handle` is not live!")
    }

    /// Releases a cell back to the free list and returns its element.
    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let element = self.slots[handle.to_index()].take().expect("`Arena::take()` - `handle` is not live!");
        self.free.push(handle);
        element
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        drop(self.take(handle));
    }

    /// Releases every cell at once. The reservation is kept.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

impl<T: Clone> Clone for Arena<T> {
    fn clone(&self) -> Self {
        // A derived clone would shrink both vectors to their lengths and lose
        // the up-front reservation.
        let mut slots = Vec::with_capacity(self.capacity);
        slots.extend(self.slots.iter().cloned());
        let mut free = Vec::with_capacity(self.capacity);
        free.extend_from_slice(&self.free);
        Self { slots, free, capacity: self.capacity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capacity_is_exact() {
        let arena: Arena<u32> = Arena::try_with_capacity(10).unwrap();
        assert_eq!(arena.capacity(), 10);
        assert_eq!(arena.len(), 0);
        assert!(arena.is_empty());
    }

    #[test]
    fn alloc_fails_only_when_full() {
        let mut arena: Arena<u32> = Arena::try_with_capacity(2).unwrap();
        let a = arena.try_alloc(1).unwrap();
        let _b = arena.try_alloc(2).unwrap();
        assert!(arena.is_full());
        assert!(arena.try_alloc(3).is_none());

        arena.free(a);
        assert!(!arena.is_full());
        assert!(arena.try_alloc(4).is_some());
        assert!(arena.try_alloc(5).is_none());
    }

    #[test]
    fn clear_releases_every_slot() {
        let mut arena: Arena<u32> = Arena::try_with_capacity(3).unwrap();
        for i in 0..3 {
            arena.try_alloc(i).unwrap();
        }
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.capacity(), 3);
        for i in 0..3 {
            assert!(arena.try_alloc(i).is_some());
        }
    }

    #[test]
    fn clone_keeps_the_reservation() {
        let mut arena: Arena<u32> = Arena::try_with_capacity(4).unwrap();
        let h = arena.try_alloc(9).unwrap();
        arena.free(h);
        arena.try_alloc(11).unwrap();

        let mut cloned = arena.clone();
        assert_eq!(cloned.capacity(), 4);
        assert_eq!(cloned.len(), 1);
        for i in 0..3 {
            assert!(cloned.try_alloc(i).is_some());
        }
        assert!(cloned.try_alloc(99).is_none());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Alloc(u32),
        Get(usize),
        Take(usize),
        Clear,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => any::<u32>().prop_map(Op::Alloc),
            4 => any::<usize>().prop_map(Op::Get),
            4 => any::<usize>().prop_map(Op::Take),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        /// Replays random alloc/get/take/clear sequences against a vector
        /// model and checks the capacity ceiling is honored exactly.
        #[test]
        fn behaves_like_bounded_store(ops in prop::collection::vec(op_strategy(), 0..256)) {
            const CAP: usize = 16;
            let mut model: Vec<(Handle, u32)> = Vec::new();
            let mut arena: Arena<u32> = Arena::try_with_capacity(CAP).unwrap();

            for op in ops {
                match op {
                    Op::Alloc(value) => {
                        let handle = arena.try_alloc(value);
                        if model.len() == CAP {
                            prop_assert!(handle.is_none());
                        } else {
                            model.push((handle.unwrap(), value));
                        }
                    }
                    Op::Get(which) => {
                        if let Some(&(handle, value)) = model.get(which.checked_rem(model.len()).unwrap_or(0)) {
                            prop_assert_eq!(*arena.get(handle), value);
                        }
                    }
                    Op::Take(which) => {
                        if model.is_empty() {
                            continue;
                        }
                        let (handle, value) = model.swap_remove(which % model.len());
                        prop_assert_eq!(arena.take(handle), value);
                    }
                    Op::Clear => {
                        arena.clear();
                        model.clear();
                    }
                }

                prop_assert_eq!(arena.len(), model.len());
                prop_assert_eq!(arena.is_full(), model.len() == CAP);
            }
        }
    }
}
