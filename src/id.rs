//! Numeric identifiers and the dense containers indexed by them.
//!
//! Proof nodes and goals are owned by arenas and referred to by small
//! integer ids; per-goal and per-node bookkeeping lives in maps keyed by
//! those ids rather than by object identity.
use std::{fmt, hash::Hash, marker::PhantomData, ops};

/// An integer newtype usable as an index.
pub trait Id: Copy + Eq + Ord + Hash {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

/// Declare a `u32` id type with `#N` display.
#[macro_export]
macro_rules! define_id {
    ($v:vis $name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $v struct $name(u32);

        impl $crate::id::Id for $name {
            fn from_index(index: usize) -> Self {
                match u32::try_from(index) {
                    Ok(raw) => $name(raw),
                    Err(_) => panic!("{} overflowed at {index}", stringify!($name)),
                }
            }
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

/// Side table from ids to values, stored as a flat vector of slots.
#[derive(Clone)]
pub struct IdMap<K, V> {
    slots: Vec<Option<V>>,
    _key: PhantomData<K>,
}

impl<K, V> Default for IdMap<K, V> {
    fn default() -> Self {
        IdMap { slots: Vec::new(), _key: PhantomData }
    }
}

impl<K: Id + fmt::Debug, V: fmt::Debug> fmt::Debug for IdMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Id, V> IdMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Map `key` to `value`, growing the table as needed.
    pub fn insert(&mut self, key: K, value: V) {
        let i = key.index();
        if i >= self.slots.len() {
            self.slots.resize_with(i + 1, || None);
        }
        self.slots[i] = Some(value);
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.index())?.as_ref()
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.index())?.as_mut()
    }

    /// Remove the value for `key` and return it.
    pub fn take(&mut self, key: K) -> Option<V> {
        self.slots.get_mut(key.index())?.take()
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((K::from_index(i), v.as_ref()?)))
    }
}

/// Push-only storage: a pushed value keeps its id for the arena's lifetime.
#[derive(Clone)]
pub struct Arena<K, V> {
    items: Vec<V>,
    _key: PhantomData<K>,
}

impl<K, V> Default for Arena<K, V> {
    fn default() -> Self {
        Arena { items: Vec::new(), _key: PhantomData }
    }
}

impl<K: Id, V> Arena<K, V> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: V) -> K {
        let id = K::from_index(self.items.len());
        self.items.push(item);
        id
    }
}

impl<K: Id, V> ops::Index<K> for Arena<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        &self.items[key.index()]
    }
}

impl<K: Id, V> ops::IndexMut<K> for Arena<K, V> {
    fn index_mut(&mut self, key: K) -> &mut V {
        &mut self.items[key.index()]
    }
}
