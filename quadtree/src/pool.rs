use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

const INITIAL_CAPACITY: usize = 64;

/// Slab allocator issuing stable bucket indices.
///
/// Buckets are picked by probing forward from a random start, so
/// consecutive allocations scatter across the slab without any hashing.
/// Growth doubles the capacity and keeps every live bucket at its index,
/// so handles stay valid until they are deallocated. The fill rate is
/// capped at 75%, which keeps the expected probe length constant.
///
/// This is not a hash table: handles are assigned by the allocator, not
/// derived from the payload.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    filled: usize,
    rng: SmallRng,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Deterministic probing for reproducible layouts.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        let mut slots = Vec::with_capacity(INITIAL_CAPACITY);
        slots.resize_with(INITIAL_CAPACITY, || None);
        Pool {
            slots,
            filled: 0,
            rng,
        }
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Current slab size. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Place `value` in a free bucket and return its index.
    pub fn allocate(&mut self, value: T) -> u32 {
        if self.filled * 4 >= self.capacity() * 3 {
            self.grow();
        }
        let mask = self.capacity() - 1;
        let mut bucket = self.rng.next_u64() as usize & mask;
        while self.slots[bucket].is_some() {
            bucket = (bucket + 1) & mask;
        }
        self.slots[bucket] = Some(value);
        self.filled += 1;
        bucket as u32
    }

    fn grow(&mut self) {
        let next = self.capacity() * 2;
        self.slots.resize_with(next, || None);
    }

    /// Panics if the handle does not name a live element.
    pub fn get(&self, handle: u32) -> &T {
        self.slots[handle as usize]
            .as_ref()
            .expect("stale pool handle")
    }

    /// Panics if the handle does not name a live element.
    pub fn get_mut(&mut self, handle: u32) -> &mut T {
        self.slots[handle as usize]
            .as_mut()
            .expect("stale pool handle")
    }

    /// Drop the element in place and free its bucket.
    pub fn deallocate(&mut self, handle: u32) {
        let slot = self.slots[handle as usize].take();
        debug_assert!(slot.is_some(), "deallocating a free bucket");
        if slot.is_some() {
            self.filled -= 1;
        }
    }

    pub fn is_valid(&self, handle: u32) -> bool {
        self.slots
            .get(handle as usize)
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Drop every live element and shrink back to the initial capacity.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.resize_with(INITIAL_CAPACITY, || None);
        self.filled = 0;
    }

    /// Live elements with their bucket indices, in bucket order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: &self.slots,
            front: 0,
            back: self.slots.len(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            inner: self.slots.iter_mut().enumerate(),
        }
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    slots: &'a [Option<T>],
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (u32, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.front < self.back {
            let i = self.front;
            self.front += 1;
            if let Some(value) = self.slots[i].as_ref() {
                return Some((i as u32, value));
            }
        }
        None
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while self.back > self.front {
            self.back -= 1;
            if let Some(value) = self.slots[self.back].as_ref() {
                return Some((self.back as u32, value));
            }
        }
        None
    }
}

pub struct IterMut<'a, T> {
    inner: std::iter::Enumerate<std::slice::IterMut<'a, Option<T>>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (u32, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        for (i, slot) in self.inner.by_ref() {
            if let Some(value) = slot.as_mut() {
                return Some((i as u32, value));
            }
        }
        None
    }
}

pub struct IntoIter<T> {
    inner: std::iter::Enumerate<std::vec::IntoIter<Option<T>>>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = (u32, T);

    fn next(&mut self) -> Option<Self::Item> {
        for (i, slot) in self.inner.by_ref() {
            if let Some(value) = slot {
                return Some((i as u32, value));
            }
        }
        None
    }
}

impl<T> IntoIterator for Pool<T> {
    type Item = (u32, T);
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.slots.into_iter().enumerate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_get_deallocate() {
        let mut pool = Pool::with_seed(7);
        let a = pool.allocate("a");
        let b = pool.allocate("b");
        assert_ne!(a, b);
        assert_eq!(*pool.get(a), "a");
        assert_eq!(*pool.get(b), "b");
        assert!(pool.is_valid(a));
        pool.deallocate(a);
        assert!(!pool.is_valid(a));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn load_factor_stays_under_three_quarters() {
        let mut pool = Pool::with_seed(1);
        for i in 0..10_000u32 {
            pool.allocate(i);
            assert!(pool.len() * 4 <= pool.capacity() * 3);
            assert!(pool.capacity().is_power_of_two());
        }
    }

    #[test]
    fn iterators_skip_free_buckets_and_reverse() {
        let mut pool = Pool::with_seed(3);
        let handles: Vec<u32> = (0..100u32).map(|i| pool.allocate(i)).collect();
        for h in handles.iter().step_by(2) {
            pool.deallocate(*h);
        }
        let forward: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(forward.len(), 50);
        let mut backward: Vec<u32> = pool.iter().rev().map(|(_, v)| *v).collect();
        backward.reverse();
        assert_eq!(forward, backward);

        let empty: Pool<u32> = Pool::with_seed(4);
        assert_eq!(empty.iter().next_back(), None);
    }

    #[test]
    fn drop_runs_destructors_once() {
        use std::rc::Rc;

        let marker = Rc::new(());
        {
            let mut pool = Pool::with_seed(9);
            for _ in 0..10 {
                pool.allocate(Rc::clone(&marker));
            }
            assert_eq!(Rc::strong_count(&marker), 11);
            let h = pool.iter().next().unwrap().0;
            pool.deallocate(h);
            assert_eq!(Rc::strong_count(&marker), 10);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
