//! Generational slot pool
//!
//! [`SlotPool`] is a growable arena of fixed-type slots that hands out stable
//! [`Handle`]s. A handle's index never changes while the value is alive and
//! live values are never moved or compacted, so handles can be stored freely
//! by other resources.
//!
//! ## Handle validity
//!
//! Every slot carries a generation counter that is bumped when the slot is
//! released. A handle is valid iff its index is below the pool capacity, the
//! slot is occupied and the generations match. A handle to a slot that has
//! since been recycled for another value is therefore detected instead of
//! silently aliasing the new occupant.
//!
//! ## Allocation
//!
//! Free indices live on a LIFO stack, so acquisition is O(1) and the most
//! recently released index is reused first. When every slot is occupied the
//! pool grows by [`GROWTH_FACTOR`]; growth reserves all memory up front and
//! either succeeds completely or leaves the pool untouched. Growth past the
//! pool's maximum capacity (at most [`MAX_CAPACITY`]) fails the same way.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Factor by which a full pool's capacity is multiplied when it grows
pub const GROWTH_FACTOR: usize = 2;

/// Largest capacity any pool can reach, bounded by the `u32` handle index
pub const MAX_CAPACITY: usize = u32::MAX as usize;

/// Errors produced by pool operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Growing the pool failed; the pool is unchanged
    #[error("failed to grow pool from {capacity} to {requested} slots")]
    AllocationFailure {
        /// Capacity before the attempted growth
        capacity: usize,
        /// Capacity that could not be reserved
        requested: usize,
    },
}

/// Typed, generational reference to a value stored in a [`SlotPool<T>`]
///
/// The type parameter is the resource kind tag: a `Handle<Mesh>` can never be
/// passed where a `Handle<Shader>` is expected.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Build a handle from raw parts
    ///
    /// Mostly useful for tests and diagnostics; a fabricated handle is only
    /// valid if a pool actually issued the same index and generation.
    #[must_use]
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Slot index inside the originating pool
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the handle was issued
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    const fn slot(self) -> usize {
        self.index as usize
    }
}

// Manual impls: deriving would put bounds on `T`, which is only a tag.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable arena of `T` addressed by stable generational handles
#[derive(Debug)]
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    used: usize,
    max_capacity: usize,
}

impl<T> SlotPool<T> {
    /// Create a pool with `capacity` free slots
    ///
    /// Capacities above [`MAX_CAPACITY`] are clamped to it.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CAPACITY);
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        // Reversed so the first acquisitions hand out 0, 1, 2, ...
        let free = (0..capacity as u32).rev().collect();

        Self {
            slots,
            free,
            used: 0,
            max_capacity: MAX_CAPACITY,
        }
    }

    /// Cap how far the pool may grow
    ///
    /// The limit never drops below the current capacity and never exceeds
    /// [`MAX_CAPACITY`].
    #[must_use]
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity.clamp(self.capacity(), MAX_CAPACITY);
        self
    }

    /// Capacity beyond which the pool refuses to grow
    #[must_use]
    pub const fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of slots, occupied or free
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    #[must_use]
    pub const fn len(&self) -> usize {
        self.used
    }

    /// Whether no slot is occupied
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Store `value` in a free slot, growing the pool if it is full
    ///
    /// # Errors
    /// Returns [`PoolError::AllocationFailure`] if the pool is full and the
    /// larger storage cannot be reserved. The pool is left unchanged.
    pub fn insert(&mut self, value: T) -> Result<Handle<T>, PoolError> {
        if self.used == self.capacity() {
            self.grow()?;
        }

        let index = self
            .free
            .pop()
            .ok_or(PoolError::AllocationFailure {
                capacity: self.capacity(),
                requested: self.capacity(),
            })?;
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none(), "free stack pointed at an occupied slot");
        slot.value = Some(value);
        self.used += 1;

        Ok(Handle::from_raw_parts(index, slot.generation))
    }

    /// Return a slot to the pool, handing back its value
    ///
    /// Stale, out-of-range or already released handles are ignored and yield
    /// `None`.
    pub fn release(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.is_in_use(handle) {
            return None;
        }

        let slot = &mut self.slots[handle.slot()];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.used -= 1;
        self.free.push(handle.index);
        value
    }

    /// The validity predicate: in range, occupied and same generation
    #[must_use]
    pub fn is_in_use(&self, handle: Handle<T>) -> bool {
        self.slots
            .get(handle.slot())
            .is_some_and(|slot| slot.value.is_some() && slot.generation == handle.generation)
    }

    /// Borrow the value behind a valid handle
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if !self.is_in_use(handle) {
            return None;
        }
        self.slots[handle.slot()].value.as_ref()
    }

    /// Mutably borrow the value behind a valid handle
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if !self.is_in_use(handle) {
            return None;
        }
        self.slots[handle.slot()].value.as_mut()
    }

    /// Iterate occupied slots in handle order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::from_raw_parts(index as u32, slot.generation), value))
        })
    }

    /// Release every occupied slot, yielding the values in handle order
    ///
    /// Capacity is kept; all outstanding handles become stale. Afterwards the
    /// pool hands out indices 0, 1, 2, ... again, like a fresh pool.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.used);
        for slot in &mut self.slots {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                values.push(value);
            }
        }
        self.used = 0;
        self.free.clear();
        self.free.extend((0..self.slots.len() as u32).rev());
        values
    }

    fn grow(&mut self) -> Result<(), PoolError> {
        let capacity = self.capacity();
        let requested = capacity.saturating_mul(GROWTH_FACTOR).max(1);
        let failure = PoolError::AllocationFailure {
            capacity,
            requested,
        };

        if requested > self.max_capacity {
            log::warn!("Slot pool cannot grow past {} slots", self.max_capacity);
            return Err(failure);
        }
        let additional = requested - capacity;

        // Reserve everything before touching any state so a failure leaves
        // the pool exactly as it was.
        self.slots
            .try_reserve_exact(additional)
            .map_err(|_| failure.clone())?;
        self.free
            .try_reserve_exact(additional)
            .map_err(|_| failure.clone())?;

        self.slots.extend((0..additional).map(|_| Slot {
            generation: 0,
            value: None,
        }));
        // The caller takes the pre-growth `used` index, which equals the old
        // capacity because the pool was full.
        self.free.extend((capacity as u32..requested as u32).rev());

        log::debug!("Slot pool grew from {} to {} slots", capacity, requested);
        Ok(())
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
