use crate::literal::{Lit, Var};
use std::ops::{Index, IndexMut};

pub(crate) mod bitset;
pub(crate) mod heap;

/// Types that map one-to-one onto a dense range of `usize` indices.
pub(crate) trait DenseIndex: Copy {
    fn as_dense(self) -> usize;
    fn from_dense(index: usize) -> Self;
}

impl DenseIndex for Var {
    fn as_dense(self) -> usize {
        self.as_index()
    }

    fn from_dense(index: usize) -> Self {
        Var::from_index(index.try_into().expect("variable index fits in u32"))
    }
}

impl DenseIndex for Lit {
    fn as_dense(self) -> usize {
        self.as_index()
    }

    fn from_dense(index: usize) -> Self {
        Lit::from_index(index)
    }
}

impl DenseIndex for usize {
    fn as_dense(self) -> usize {
        self
    }

    fn from_dense(index: usize) -> Self {
        index
    }
}

/// Wrapper around a `Vec` that is indexed by [`Var`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VarVec<T>(Vec<T>);

impl<T: Default> VarVec<T> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.0.resize_with(count, Default::default);
    }
}

impl<T> Default for VarVec<T> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

impl<T> VarVec<T> {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }

    pub(crate) fn capacity_bytes(&self) -> usize {
        self.0.capacity() * std::mem::size_of::<T>()
    }
}

impl<T> Index<Var> for VarVec<T> {
    type Output = T;

    fn index(&self, index: Var) -> &Self::Output {
        &self.0[index.as_index()]
    }
}

impl<T> IndexMut<Var> for VarVec<T> {
    fn index_mut(&mut self, index: Var) -> &mut Self::Output {
        &mut self.0[index.as_index()]
    }
}

/// Wrapper around a `Vec` that is indexed by [`Lit`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LitVec<T>(Vec<T>);

impl<T: Default> LitVec<T> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.0.resize_with(count * 2, Default::default);
    }
}

impl<T> Default for LitVec<T> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

impl<T> LitVec<Vec<T>> {
    /// Approximate heap usage of all inner vectors.
    pub(crate) fn nested_capacity_bytes(&self) -> usize {
        self.0.iter().map(|list| list.capacity() * std::mem::size_of::<T>()).sum::<usize>()
            + self.0.capacity() * std::mem::size_of::<Vec<T>>()
    }
}

impl<T> LitVec<T> {
    /// Number of literal slots, i.e., twice the number of variables.
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Lit, &T)> {
        self.0.iter().enumerate().map(|(idx, value)| (Lit::from_dense(idx), value))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<Lit> for LitVec<T> {
    type Output = T;

    fn index(&self, index: Lit) -> &Self::Output {
        &self.0[index.as_index()]
    }
}

impl<T> IndexMut<Lit> for LitVec<T> {
    fn index_mut(&mut self, index: Lit) -> &mut Self::Output {
        &mut self.0[index.as_index()]
    }
}
