use std::collections::TryReserveError;
use std::mem::MaybeUninit;

/// A stable handle into a [`Slab`].
///
/// A key pairs a slot index with the generation the slot had when the
/// value was inserted. Once the value is removed the slot's generation
/// moves on, so an old key can never reach a value inserted later in the
/// same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: usize,
    generation: u32,
}

/// A generational slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// [`Key`]s that stay valid until the value is removed. Freed slots are
/// reused by later insertions.
///
/// Internally, it keeps track of:
/// - initialized slots,
/// - free indices,
/// - a generation counter per slot,
/// - and uninitialized memory using [`MaybeUninit`].
///
/// Growth is fallible: [`try_insert`](Self::try_insert) reports allocation
/// failure instead of aborting, which lets the reactor surface it as an
/// out-of-memory error.
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Generation of each slot, bumped on every removal.
    generations: Vec<u32>,
    /// Number of initialized slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with a fixed initial capacity.
    ///
    /// All slots are initially free and uninitialized.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        let free = (0..size).rev().collect();
        let used = vec![false; size];
        let generations = vec![0; size];

        Self {
            items,
            free,
            used,
            generations,
            len: 0,
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused. Otherwise, the slab
    /// grows exponentially. Allocation failure while growing leaves the
    /// slab untouched and hands the error back.
    pub(crate) fn try_insert(&mut self, item: T) -> Result<Key, TryReserveError> {
        let index = match self.free.pop() {
            Some(i) => i,
            None => self.grow()?,
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        Ok(Key {
            index,
            generation: self.generations[index],
        })
    }

    /// Doubles the storage and returns the first new index.
    ///
    /// The returned index is not pushed onto the free stack; the caller
    /// claims it directly.
    fn grow(&mut self) -> Result<usize, TryReserveError> {
        let len = self.items.len();
        let new_len = if len == 0 { 1 } else { 2 * len };
        let extra = new_len - len;

        self.items.try_reserve(extra)?;
        self.used.try_reserve(extra)?;
        self.generations.try_reserve(extra)?;
        self.free.try_reserve(extra)?;

        self.items
            .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
        self.used.resize(new_len, false);
        self.generations.resize(new_len, 0);
        self.free.extend(((len + 1)..new_len).rev());

        Ok(len)
    }

    /// Returns `true` if `key` refers to a live value.
    pub(crate) fn contains(&self, key: Key) -> bool {
        key.index < self.items.len()
            && self.used[key.index]
            && self.generations[key.index] == key.generation
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale or was never issued by this slab.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        if !self.contains(key) {
            return None;
        }

        let index = key.index;
        self.free.push(index);
        self.used[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.len -= 1;

        let item = unsafe { self.items[index].assume_init_read() };
        self.items[index] = MaybeUninit::uninit();

        Some(item)
    }

    /// Returns a shared reference to the value stored under `key`.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        if self.contains(key) {
            Some(unsafe { self.items[key.index].assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        if self.contains(key) {
            Some(unsafe { self.items[key.index].assume_init_mut() })
        } else {
            None
        }
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Drops every live value. Outstanding keys become stale.
    pub(crate) fn clear(&mut self) {
        for index in 0..self.items.len() {
            if self.used[index] {
                self.used[index] = false;
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free.push(index);
                unsafe { self.items[index].assume_init_drop() };
            }
        }

        self.len = 0;
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    ///
    /// Uninitialized slots are ignored.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}
