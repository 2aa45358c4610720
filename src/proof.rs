//! Resolution DAG used to extract an unsatisfiable core.
//!
//! Every problem constraint gets a root node. Derived facts (learned clauses, fixed variables,
//! the final conflict) get a node whose parents are the nodes of the facts they were derived
//! from. Nodes are reference counted: a node is released when its count drops to zero, which in
//! turn releases its parents.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

#[derive(Debug)]
struct ResolutionNode {
    parents: Vec<NodeId>,
    /// Index of the problem constraint for root nodes.
    constraint_index: Option<usize>,
    ref_count: u32,
}

#[derive(Debug, Default)]
pub(crate) struct UnsatProof {
    nodes: Vec<Option<ResolutionNode>>,
    free: Vec<usize>,
}

impl UnsatProof {
    /// Creates a locked root node for the problem constraint with the given index.
    pub(crate) fn create_root_node(&mut self, constraint_index: usize) -> NodeId {
        self.allocate(ResolutionNode {
            parents: Vec::new(),
            constraint_index: Some(constraint_index),
            ref_count: 1,
        })
    }

    /// Creates a locked node derived from `parents`; each parent gets locked once more.
    /// A single parent is returned directly instead of creating a new node.
    pub(crate) fn create_node(&mut self, parents: &[NodeId]) -> NodeId {
        if let [parent] = parents {
            self.lock(*parent);
            return *parent;
        }
        for &parent in parents {
            self.lock(parent);
        }
        self.allocate(ResolutionNode {
            parents: parents.to_vec(),
            constraint_index: None,
            ref_count: 1,
        })
    }

    pub(crate) fn lock(&mut self, node: NodeId) {
        self.node_mut(node).ref_count += 1;
    }

    /// Decrements the reference count and releases the node (and transitively its parents)
    /// once nobody holds it anymore.
    pub(crate) fn unlock(&mut self, node: NodeId) {
        let mut to_release = vec![node];
        while let Some(node) = to_release.pop() {
            let entry = self.node_mut(node);
            entry.ref_count -= 1;
            if entry.ref_count > 0 {
                continue;
            }
            if let Some(entry) = self.nodes[node.0].take() {
                to_release.extend(entry.parents);
                self.free.push(node.0);
            }
        }
    }

    /// Returns the sorted constraint indices of all root nodes reachable from `node`.
    pub(crate) fn compute_unsat_core(&self, node: NodeId) -> Vec<usize> {
        let mut visited = BTreeSet::new();
        let mut core = BTreeSet::new();
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let entry = self.node(node);
            if let Some(index) = entry.constraint_index {
                core.insert(index);
            }
            stack.extend(entry.parents.iter().copied());
        }
        core.into_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn num_live_nodes(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Option<ResolutionNode>>()
            + self
                .nodes
                .iter()
                .flatten()
                .map(|node| node.parents.capacity() * std::mem::size_of::<NodeId>())
                .sum::<usize>()
    }

    fn allocate(&mut self, node: ResolutionNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            NodeId(index)
        } else {
            self.nodes.push(Some(node));
            NodeId(self.nodes.len() - 1)
        }
    }

    fn node(&self, node: NodeId) -> &ResolutionNode {
        self.nodes[node.0].as_ref().expect("resolution node was already released")
    }

    fn node_mut(&mut self, node: NodeId) -> &mut ResolutionNode {
        self.nodes[node.0].as_mut().expect("resolution node was already released")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn core_follows_parents() {
        let mut proof = UnsatProof::default();
        let a = proof.create_root_node(0);
        let _b = proof.create_root_node(1);
        let c = proof.create_root_node(2);
        let derived = proof.create_node(&[a, c]);
        let last = proof.create_node(&[derived, c]);
        assert_eq!(proof.compute_unsat_core(last), vec![0, 2]);
    }

    #[test]
    fn release_on_zero() {
        let mut proof = UnsatProof::default();
        let a = proof.create_root_node(0);
        let b = proof.create_root_node(1);
        let derived = proof.create_node(&[a, b]);
        assert_eq!(proof.num_live_nodes(), 3);

        proof.unlock(a);
        proof.unlock(b);
        // still held by `derived`
        assert_eq!(proof.num_live_nodes(), 3);

        proof.unlock(derived);
        assert_eq!(proof.num_live_nodes(), 0);

        // freed slots are reused
        let c = proof.create_root_node(7);
        assert_eq!(proof.num_live_nodes(), 1);
        assert_eq!(proof.compute_unsat_core(c), vec![7]);
    }

    #[test]
    fn single_parent_is_shared() {
        let mut proof = UnsatProof::default();
        let a = proof.create_root_node(3);
        let same = proof.create_node(&[a]);
        assert_eq!(a, same);
        proof.unlock(same);
        assert_eq!(proof.num_live_nodes(), 1);
        proof.unlock(a);
        assert_eq!(proof.num_live_nodes(), 0);
    }
}
