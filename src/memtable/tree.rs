//! Balanced Tree
//!
//! AVL tree used as the MemTable's ordered index.
//!
//! Nodes live in an arena and reference their children by index, so dropping
//! or walking a tree never recurses through node ownership. Insertion recurses
//! only along one root-to-leaf path, which the height invariant keeps at
//! O(log n).

use std::cmp::Ordering;
use std::mem::size_of;

/// Index of a node in the arena
type NodeId = usize;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    left: Option<NodeId>,
    right: Option<NodeId>,
    /// Height of the subtree rooted here (leaf = 1, empty = 0)
    height: u32,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V) -> Self {
        Self {
            key,
            value,
            left: None,
            right: None,
            height: 1,
        }
    }
}

/// Self-balancing ordered map.
///
/// ## Duplicate keys
/// Putting a key that is already present replaces its value in place, so a
/// lookup always returns the most recent write and in-order traversal never
/// yields the same key twice. Every put is still charged to `data_size`.
///
/// Behavioral change: an equal key replaces the stored value instead of being
/// inserted as a second node in the left subtree.
#[derive(Debug, Clone)]
pub struct BalancedTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<NodeId>,
    /// Sum of `size_of::<K>() + size_of::<V>()` over every put since the last clear
    data_size: usize,
}

impl<K, V> BalancedTree<K, V> {
    const ENTRY_SIZE: usize = size_of::<K>() + size_of::<V>();

    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            data_size: 0,
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Total logical bytes written (duplicates included)
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Height of the tree (empty = 0)
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Release all nodes and reset the counters
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.data_size = 0;
    }

    /// In-order iterator over `(key, value)` references
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self)
    }

    // =========================================================================
    // Rebalancing
    // =========================================================================

    fn height_of(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |id| self.nodes[id].height)
    }

    fn balance_of(&self, id: NodeId) -> i64 {
        let node = &self.nodes[id];
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    fn update_height(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[id].height = height;
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes[id].right else {
            return id;
        };
        self.nodes[id].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(id);

        // Old root first: the pivot's height is computed from it
        self.update_height(id);
        self.update_height(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes[id].left else {
            return id;
        };
        self.nodes[id].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(id);

        self.update_height(id);
        self.update_height(pivot);
        pivot
    }

    /// Restore the AVL invariant at `id`, returning the new subtree root
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        let balance = self.balance_of(id);

        if balance > 1 {
            // Left-right: straighten the left child first
            if let Some(left) = self.nodes[id].left {
                if self.balance_of(left) < 0 {
                    let new_left = self.rotate_left(left);
                    self.nodes[id].left = Some(new_left);
                }
            }
            return self.rotate_right(id);
        }

        if balance < -1 {
            // Right-left: straighten the right child first
            if let Some(right) = self.nodes[id].right {
                if self.balance_of(right) > 0 {
                    let new_right = self.rotate_right(right);
                    self.nodes[id].right = Some(new_right);
                }
            }
            return self.rotate_left(id);
        }

        id
    }
}

impl<K: Ord, V> BalancedTree<K, V> {
    /// Insert a key-value pair, replacing the value if the key exists.
    ///
    /// Does no budget check of its own; the MemTable enforces its size limit
    /// before delegating here.
    pub fn put(&mut self, key: K, value: V) {
        let root = self.root;
        let new_root = self.insert_at(root, key, value);
        self.root = Some(new_root);
        self.data_size += Self::ENTRY_SIZE;
    }

    /// Point lookup, O(log n)
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            match key.cmp(&node.key) {
                Ordering::Less => cursor = node.left,
                Ordering::Greater => cursor = node.right,
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// All entries with `start <= key <= end`, ascending.
    ///
    /// Walks in order from the smallest key and stops at the first key past
    /// `end`; subtrees left of `start` are visited, not pruned, so the cost is
    /// O(n) even for a narrow range.
    pub fn scan(&self, start: &K, end: &K) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter()
            .skip_while(|(key, _)| *key < start)
            .take_while(|(key, _)| *key <= end)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn insert_at(&mut self, at: Option<NodeId>, key: K, value: V) -> NodeId {
        let Some(id) = at else {
            self.nodes.push(Node::leaf(key, value));
            return self.nodes.len() - 1;
        };

        match key.cmp(&self.nodes[id].key) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                let new_left = self.insert_at(left, key, value);
                self.nodes[id].left = Some(new_left);
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                let new_right = self.insert_at(right, key, value);
                self.nodes[id].right = Some(new_right);
            }
            Ordering::Equal => {
                self.nodes[id].value = value;
                return id;
            }
        }

        self.update_height(id);
        self.rebalance(id)
    }
}

impl<K, V> Default for BalancedTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, V> IntoIterator for &'a BalancedTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over a BalancedTree, driven by an explicit stack
pub struct Iter<'a, K, V> {
    tree: &'a BalancedTree<K, V>,
    /// Nodes whose left subtree is done but which are not yet yielded
    stack: Vec<NodeId>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(tree: &'a BalancedTree<K, V>) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::with_capacity(tree.height() as usize),
            remaining: tree.len(),
        };
        iter.push_left_spine(tree.root);
        iter
    }

    fn push_left_spine(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.tree.nodes[id].left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let tree = self.tree;
        let node = &tree.nodes[id];
        self.push_left_spine(node.right);
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
