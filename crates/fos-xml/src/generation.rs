//! Generation-checked arena storage
//!
//! Every slot carries a generation counter that is bumped when the slot is
//! released. Handles remember the generation they were issued with, so a
//! handle to a freed (and possibly reused) slot is detected instead of
//! silently aliasing the new occupant.

/// Generation counter - incremented each time a slot is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Generation(u32);

impl Generation {
    /// Generation of a slot that was never released
    pub const INITIAL: Self = Generation(0);

    /// Create a generation from a raw value
    #[inline]
    pub const fn new(value: u32) -> Self {
        Generation(value)
    }

    /// Get the raw value
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Get the next generation
    #[inline]
    pub const fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Untyped arena handle: slot index plus the generation it was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle {
    pub(crate) index: u32,
    pub(crate) generation: Generation,
}

impl RawHandle {
    /// Slot index
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued with
    #[inline]
    pub fn generation(self) -> Generation {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: Generation,
    value: Option<T>,
}

/// Arena with slot reuse and stale-handle detection
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Indices of vacant slots, reused LIFO
    free: Vec<u32>,
    len: usize,
    limit: Option<usize>,
}

impl<T> Arena<T> {
    /// Create an arena holding at most `limit` live values (unbounded if `None`)
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            limit,
        }
    }

    /// Handle the next `insert` will return, if there is room for it
    pub fn next_handle(&self) -> Option<RawHandle> {
        if self.limit.is_some_and(|limit| self.len >= limit) {
            return None;
        }
        match self.free.last() {
            Some(&index) => Some(RawHandle {
                index,
                generation: self.slots[index as usize].generation,
            }),
            None => Some(RawHandle {
                index: u32::try_from(self.slots.len()).ok()?,
                generation: Generation::INITIAL,
            }),
        }
    }

    /// Store a value. Returns `None` when the arena is full or the
    /// allocation cannot be satisfied.
    pub fn insert(&mut self, value: T) -> Option<RawHandle> {
        let handle = self.next_handle()?;
        if self.free.pop().is_some() {
            self.slots[handle.index as usize].value = Some(value);
        } else {
            self.slots.try_reserve(1).ok()?;
            self.slots.push(Slot {
                generation: Generation::INITIAL,
                value: Some(value),
            });
        }
        self.len += 1;
        Some(handle)
    }

    /// Get a value if the handle is still current
    #[inline]
    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable value if the handle is still current
    #[inline]
    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Check whether a handle still refers to a live value
    #[inline]
    pub fn contains(&self, handle: RawHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Release a slot. Every outstanding handle to it becomes stale.
    pub fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.next();
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no value is live
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new(None)
    }
}
