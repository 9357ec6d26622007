//! The byte-wise prefix trie behind token-prefix search.

use crate::node::Node;

/// Maps token prefixes to the set of values (record ids) whose tokens start
/// with them.
///
/// Search is **prefix** matching: a query matches a value iff the query is a
/// prefix of at least one of the value's tokens. A query is never matched
/// against the middle of a token. The root holds every indexed value, so the
/// empty query returns everything that has been indexed ("browse all").
///
/// `SearchIndex` is not internally synchronized. Mutation needs `&mut self`,
/// so sharing one index between threads requires an external lock that
/// serializes writers against readers; the provider layer supplies that lock.
pub struct SearchIndex<V> {
    root: Node<V>,
}

impl<V: Ord + Clone> SearchIndex<V> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Index `value` under every token in `tokens`.
    ///
    /// Each token is walked from the root, creating missing nodes, and
    /// `value` is added to every node visited including the root. Writing the
    /// same token and value twice is a no-op.
    pub fn write<I, T>(&mut self, tokens: I, value: &V)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for token in tokens {
            self.write_token(token.as_ref(), value);
        }
    }

    /// Values indexed under a token starting with `query`, in ascending order.
    ///
    /// Returns an empty result as soon as the walk runs off the trie.
    pub fn search(&self, query: &[u8]) -> Vec<&V> {
        let mut node = &self.root;
        for &byte in query {
            match node.child(byte) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        node.values.iter().collect()
    }

    /// Remove `value` from every node holding it and detach the nodes that
    /// become empty.
    pub fn delete(&mut self, value: &V) {
        // The root is never detached, even when emptied.
        self.root.remove(value);
    }

    /// Returns `true` if `value` is indexed under at least one token.
    pub fn contains(&self, value: &V) -> bool {
        self.root.values.contains(value)
    }

    /// Number of indexed values.
    pub fn len(&self) -> usize {
        self.root.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.values.is_empty()
    }

    /// Number of trie nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.root.count()
    }

    /// Drop every node and value.
    pub fn clear(&mut self) {
        self.root = Node::new();
    }

    fn write_token(&mut self, token: &[u8], value: &V) {
        let mut node = &mut self.root;
        node.values.insert(value.clone());
        for &byte in token {
            node = node.child_or_insert(byte);
            node.values.insert(value.clone());
        }
    }
}

impl<V: Ord + Clone> std::fmt::Debug for SearchIndex<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("values", &self.len())
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl<V: Ord + Clone> Default for SearchIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}
