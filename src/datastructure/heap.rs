//! A priority heap for variables.

use super::VarVec;
use crate::literal::Var;

#[derive(Debug, Default, Clone)]
pub(crate) struct VarHeap<T> {
    /// The value for each variable
    values: VarVec<T>,
    /// The binary max-heap containing the variables
    heap: Vec<Var>,
    /// The positions of the variables in the heap
    positions: VarVec<Option<usize>>,
}

impl<T> VarHeap<T>
where
    T: Default + Copy + Ord,
{
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.values.set_var_count(count);
        self.positions.set_var_count(count);
    }

    /// Returns the variable with the highest value.
    pub(crate) fn peek(&self) -> Option<Var> {
        self.heap.first().copied()
    }

    pub(crate) fn pop(&mut self) -> Option<Var> {
        let var = *self.heap.first()?;
        self.remove(var);
        Some(var)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The variable stored at heap position `pos`, used for uniform random picks.
    pub(crate) fn var_at(&self, pos: usize) -> Var {
        self.heap[pos]
    }

    pub(crate) fn update_value<F>(&mut self, var: Var, update_fn: F) -> T
    where
        F: FnOnce(T) -> T,
    {
        let value = &mut self.values[var];
        let orig_value = *value;
        *value = update_fn(orig_value);
        let new_value = *value;
        if let Some(pos) = self.positions[var] {
            if new_value >= orig_value {
                self.sift_up(pos);
            } else {
                self.sift_down(pos);
            }
        }
        new_value
    }

    #[cfg(test)]
    pub(crate) fn value(&self, var: Var) -> T {
        self.values[var]
    }

    /// Adds the provided variable to the heap.
    pub(crate) fn add(&mut self, var: Var) {
        if self.positions[var].is_some() {
            return;
        }
        let idx = self.heap.len();
        self.heap.push(var);
        self.positions[var] = Some(idx);
        self.sift_up(idx);
    }

    /// Removes the provided variable from the heap.
    pub(crate) fn remove(&mut self, var: Var) {
        let Some(pos) = self.positions[var].take() else {
            return;
        };
        self.heap.swap_remove(pos);
        if pos >= self.heap.len() {
            // the removed variable was the last element
            return;
        }
        let moved_var = self.heap[pos];
        self.positions[moved_var] = Some(pos);
        // the moved variable may have to go in either direction
        self.sift_up(pos);
        if let Some(pos) = self.positions[moved_var] {
            self.sift_down(pos);
        }
    }

    #[cfg(test)]
    pub(crate) fn contained(&self, var: Var) -> bool {
        self.positions[var].is_some()
    }

    /// Empties the heap and resets every value to the default.
    pub(crate) fn clear(&mut self) {
        self.values.values_mut().for_each(|val| *val = T::default());
        self.heap.clear();
        self.positions.values_mut().for_each(|pos| *pos = None);
    }

    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        while let Some(parent) = Self::parent(pos) {
            let parent_var = self.heap[parent];
            if self.values[var] <= self.values[parent_var] {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let mut largest_idx = pos;
            if let Some(left_idx) = self
                .left(pos)
                .filter(|&idx| self.values[self.heap[idx]] > self.values[self.heap[largest_idx]])
            {
                largest_idx = left_idx;
            }
            if let Some(right_idx) = self
                .right(pos)
                .filter(|&idx| self.values[self.heap[idx]] > self.values[self.heap[largest_idx]])
            {
                largest_idx = right_idx;
            }
            if largest_idx == pos {
                return;
            }
            self.swap(pos, largest_idx);
            pos = largest_idx;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        let var_a = self.heap[a];
        let var_b = self.heap[b];
        self.heap.swap(a, b);
        self.positions[var_a] = Some(b);
        self.positions[var_b] = Some(a);
    }

    /// Return the left child position, if it is in the heap
    fn left(&self, pos: usize) -> Option<usize> {
        Some(2 * pos + 1).filter(|&pos| pos < self.heap.len())
    }

    /// Return the right child position, if it is in the heap
    fn right(&self, pos: usize) -> Option<usize> {
        Some(2 * pos + 2).filter(|&pos| pos < self.heap.len())
    }

    fn parent(pos: usize) -> Option<usize> {
        (pos > 0).then(|| (pos - 1) / 2)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn heap() {
        let mut heap = VarHeap::<i32>::default();
        heap.set_var_count(4);
        let vars: Vec<_> = (0..4).map(Var::from_index).collect();
        for &var in &vars {
            heap.add(var);
        }

        heap.update_value(vars[2], |_| 2);
        heap.update_value(vars[1], |_| 6);

        assert_eq!(heap.peek(), Some(vars[1]));
        heap.remove(vars[1]);
        assert!(!heap.contained(vars[1]));

        assert_eq!(heap.peek(), Some(vars[2]));

        heap.add(vars[1]);
        assert_eq!(heap.peek(), Some(vars[1]));
        assert_eq!(heap.len(), 4);
    }

    proptest! {
        #[test]
        fn pops_in_descending_order(values in proptest::collection::vec(0..100i32, 1..40), removed in 0usize..40) {
            let mut heap = VarHeap::<i32>::default();
            heap.set_var_count(values.len());
            for (idx, &value) in values.iter().enumerate() {
                let var = Var::from_index(idx.try_into().unwrap());
                heap.add(var);
                heap.update_value(var, |_| value);
            }
            let removed = Var::from_index((removed % values.len()).try_into().unwrap());
            heap.remove(removed);

            let mut popped = Vec::new();
            while let Some(var) = heap.pop() {
                popped.push(heap.value(var));
            }
            prop_assert_eq!(popped.len(), values.len() - 1);
            prop_assert!(popped.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}
