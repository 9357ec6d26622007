use std::collections::{BTreeMap, BTreeSet};
use std::mem;

/// A trie node: the values reachable through the path from the root to
/// this node, and the child nodes keyed by the next byte.
///
/// Every value held by a child is also held by its parent, since writes add
/// the value to each node they pass through.
///
/// Tokens can be arbitrarily long, so nothing here recurses over depth:
/// removal, counting and dropping all walk with an explicit stack.
pub(crate) struct Node<V> {
    pub(crate) children: BTreeMap<u8, Node<V>>,
    pub(crate) values: BTreeSet<V>,
}

/// A node detached from its parent while removal walks below it.
struct Frame<V> {
    byte: u8,
    node: Node<V>,
    /// Children still to visit, all of which hold the value being removed.
    pending: Vec<u8>,
}

impl<V: Ord> Node<V> {
    pub(crate) fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            values: BTreeSet::new(),
        }
    }

    pub(crate) fn child(&self, byte: u8) -> Option<&Node<V>> {
        self.children.get(&byte)
    }

    pub(crate) fn child_or_insert(&mut self, byte: u8) -> &mut Node<V> {
        self.children.entry(byte).or_insert_with(Node::new)
    }

    /// Remove `value` from this node and every descendant holding it,
    /// detaching children that end up empty. Returns `true` if this node is
    /// left without values.
    ///
    /// A node that never held `value` cannot have descendants holding it, so
    /// the walk stops there. Each visited child is taken out of its parent,
    /// and put back once its own subtree is done only if it still holds
    /// values.
    pub(crate) fn remove(&mut self, value: &V) -> bool {
        if !self.values.remove(value) {
            return false;
        }

        let mut root_pending = self.children_holding(value);
        let mut stack: Vec<Frame<V>> = Vec::new();
        loop {
            let (parent, pending) = match stack.last_mut() {
                Some(frame) => (&mut frame.node, &mut frame.pending),
                None => (&mut *self, &mut root_pending),
            };

            if let Some(byte) = pending.pop() {
                if let Some(mut child) = parent.children.remove(&byte) {
                    child.values.remove(value);
                    let pending = child.children_holding(value);
                    stack.push(Frame {
                        byte,
                        node: child,
                        pending,
                    });
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            if done.node.values.is_empty() {
                continue;
            }
            let parent = match stack.last_mut() {
                Some(frame) => &mut frame.node,
                None => &mut *self,
            };
            parent.children.insert(done.byte, done.node);
        }

        self.values.is_empty()
    }

    /// Number of nodes in this subtree, this one included.
    pub(crate) fn count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.values());
        }
        count
    }

    fn children_holding(&self, value: &V) -> Vec<u8> {
        self.children
            .iter()
            .filter(|(_, child)| child.values.contains(value))
            .map(|(byte, _)| *byte)
            .collect()
    }
}

impl<V> Drop for Node<V> {
    fn drop(&mut self) {
        let mut stack: Vec<Node<V>> = mem::take(&mut self.children).into_values().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(mem::take(&mut node.children).into_values());
        }
    }
}
