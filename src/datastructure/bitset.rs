//! A bitset that remembers which positions were set so that clearing is proportional to the
//! number of set positions instead of the universe size.

use super::DenseIndex;
use std::marker::PhantomData;

#[derive(Debug, Clone)]
pub(crate) struct SparseBitset<K> {
    bits: Vec<bool>,
    set_positions: Vec<usize>,
    _key: PhantomData<K>,
}

impl<K> Default for SparseBitset<K> {
    fn default() -> Self {
        Self { bits: Vec::new(), set_positions: Vec::new(), _key: PhantomData }
    }
}

impl<K: DenseIndex> SparseBitset<K> {
    /// Clears all set positions and makes sure the universe has at least `size` elements.
    pub(crate) fn clear_and_resize(&mut self, size: usize) {
        self.clear_all();
        if self.bits.len() < size {
            self.bits.resize(size, false);
        }
    }

    pub(crate) fn clear_all(&mut self) {
        for &pos in &self.set_positions {
            self.bits[pos] = false;
        }
        self.set_positions.clear();
    }

    pub(crate) fn set(&mut self, key: K) {
        let pos = key.as_dense();
        if !self.bits[pos] {
            self.bits[pos] = true;
            self.set_positions.push(pos);
        }
    }

    /// Unsets a single position. The position is still reported by
    /// [`SparseBitset::positions_set_at_least_once`].
    pub(crate) fn clear(&mut self, key: K) {
        self.bits[key.as_dense()] = false;
    }

    pub(crate) fn get(&self, key: K) -> bool {
        self.bits.get(key.as_dense()).copied().unwrap_or(false)
    }

    pub(crate) fn positions_set_at_least_once(&self) -> impl Iterator<Item = K> + '_ {
        self.set_positions.iter().map(|&pos| K::from_dense(pos))
    }

    #[cfg(test)]
    pub(crate) fn universe_size(&self) -> usize {
        self.bits.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::literal::Var;

    #[test]
    fn set_and_clear() {
        let mut set = SparseBitset::<Var>::default();
        set.clear_and_resize(5);
        set.set(Var::from_index(1));
        set.set(Var::from_index(3));
        set.set(Var::from_index(3));
        assert!(set.get(Var::from_index(1)));
        assert!(!set.get(Var::from_index(2)));
        assert_eq!(set.positions_set_at_least_once().count(), 2);

        set.clear(Var::from_index(1));
        assert!(!set.get(Var::from_index(1)));
        assert_eq!(set.positions_set_at_least_once().count(), 2);

        set.clear_and_resize(10);
        assert!(!set.get(Var::from_index(3)));
        assert_eq!(set.positions_set_at_least_once().count(), 0);
        assert_eq!(set.universe_size(), 10);
    }

    #[test]
    fn out_of_universe_is_unset() {
        let set = SparseBitset::<usize>::default();
        assert!(!set.get(42));
    }
}
