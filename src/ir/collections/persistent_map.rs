//! An immutable ordered map with structural sharing.
//!
//! Every edit copies only the path from the root to the edited node, so an
//! edit costs O(log n) allocations and every older version stays valid.
//! Flow graphs keep all of their indices in these maps, which is what makes
//! "modify and keep the old graph" cheap.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    height: u8,
    left: Link<K, V>,
    right: Link<K, V>,
}

/// A persistent AVL tree. Cloning is O(1).
pub struct PersistentMap<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        PersistentMap {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        PersistentMap { root: None, len: 0 }
    }
}

impl<K: Ord + Clone, V: Clone> PersistentMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns a new map with `key` bound to `value`. Replaces any existing binding.
    pub fn insert(&self, key: K, value: V) -> Self {
        let (root, added) = insert_node(&self.root, key, value);
        PersistentMap {
            root: Some(root),
            len: if added { self.len + 1 } else { self.len },
        }
    }

    /// Returns a new map without `key`. Absent keys return a cheap clone.
    pub fn remove(&self, key: &K) -> Self {
        match remove_node(&self.root, key) {
            Some(root) => PersistentMap {
                root,
                len: self.len - 1,
            },
            None => self.clone(),
        }
    }

    /// In-order iteration.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::with_capacity(usize::from(height(&self.root))),
            remaining: self.len,
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// True when both maps are the very same version (no edit separates them).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PersistentMap::new(), |map, (key, value)| map.insert(key, value))
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && (self.ptr_eq(other)
                || self
                    .iter()
                    .zip(other.iter())
                    .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2))
    }
}

impl<K: Ord + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = current.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

// ------------------------------------------------------------
// Tree surgery
// ------------------------------------------------------------

fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |node| node.height)
}

fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    let height = 1 + height(&left).max(height(&right));
    Arc::new(Node {
        key,
        value,
        height,
        left,
        right,
    })
}

fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    let left_height = height(&left);
    let right_height = height(&right);

    if left_height > right_height + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                return make(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    Some(make(key, value, l.right.clone(), right)),
                );
            }
            if let Some(lr) = &l.right {
                return make(
                    lr.key.clone(),
                    lr.value.clone(),
                    Some(make(
                        l.key.clone(),
                        l.value.clone(),
                        l.left.clone(),
                        lr.left.clone(),
                    )),
                    Some(make(key, value, lr.right.clone(), right)),
                );
            }
        }
    } else if right_height > left_height + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                return make(
                    r.key.clone(),
                    r.value.clone(),
                    Some(make(key, value, left, r.left.clone())),
                    r.right.clone(),
                );
            }
            if let Some(rl) = &r.left {
                return make(
                    rl.key.clone(),
                    rl.value.clone(),
                    Some(make(key, value, left, rl.left.clone())),
                    Some(make(
                        r.key.clone(),
                        r.value.clone(),
                        rl.right.clone(),
                        r.right.clone(),
                    )),
                );
            }
        }
    }

    make(key, value, left, right)
}

/// Returns the new subtree and whether a new key was added.
fn insert_node<K: Ord + Clone, V: Clone>(
    link: &Link<K, V>,
    key: K,
    value: V,
) -> (Arc<Node<K, V>>, bool) {
    let Some(node) = link else {
        return (make(key, value, None, None), true);
    };

    match key.cmp(&node.key) {
        Ordering::Less => {
            let (left, added) = insert_node(&node.left, key, value);
            (
                balance(
                    node.key.clone(),
                    node.value.clone(),
                    Some(left),
                    node.right.clone(),
                ),
                added,
            )
        }
        Ordering::Greater => {
            let (right, added) = insert_node(&node.right, key, value);
            (
                balance(
                    node.key.clone(),
                    node.value.clone(),
                    node.left.clone(),
                    Some(right),
                ),
                added,
            )
        }
        Ordering::Equal => (
            make(key, value, node.left.clone(), node.right.clone()),
            false,
        ),
    }
}

/// Returns `None` if the key was absent, otherwise the new subtree.
fn remove_node<K: Ord + Clone, V: Clone>(link: &Link<K, V>, key: &K) -> Option<Link<K, V>> {
    let node = link.as_ref()?;

    match key.cmp(&node.key) {
        Ordering::Less => {
            let left = remove_node(&node.left, key)?;
            Some(Some(balance(
                node.key.clone(),
                node.value.clone(),
                left,
                node.right.clone(),
            )))
        }
        Ordering::Greater => {
            let right = remove_node(&node.right, key)?;
            Some(Some(balance(
                node.key.clone(),
                node.value.clone(),
                node.left.clone(),
                right,
            )))
        }
        Ordering::Equal => match (&node.left, &node.right) {
            (None, right) => Some(right.clone()),
            (left, None) => Some(left.clone()),
            (left, Some(right)) => {
                let (rest, min_key, min_value) = remove_min(right);
                Some(Some(balance(min_key, min_value, left.clone(), rest)))
            }
        },
    }
}

fn remove_min<K: Clone, V: Clone>(node: &Arc<Node<K, V>>) -> (Link<K, V>, K, V) {
    match &node.left {
        None => (node.right.clone(), node.key.clone(), node.value.clone()),
        Some(left) => {
            let (rest, key, value) = remove_min(left);
            (
                Some(balance(
                    node.key.clone(),
                    node.value.clone(),
                    rest,
                    node.right.clone(),
                )),
                key,
                value,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn is_balanced<K, V>(link: &Link<K, V>) -> bool {
        match link {
            None => true,
            Some(node) => {
                let (l, r) = (height(&node.left), height(&node.right));
                l.abs_diff(r) <= 1
                    && node.height == 1 + l.max(r)
                    && is_balanced(&node.left)
                    && is_balanced(&node.right)
            }
        }
    }

    #[test]
    fn old_versions_survive_edits() {
        let empty: PersistentMap<u32, &str> = PersistentMap::new();
        let one = empty.insert(1, "one");
        let two = one.insert(2, "two");
        let back_to_one = two.remove(&2);

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(two.get(&2), Some(&"two"));
        assert_eq!(back_to_one.get(&2), None);
        assert_eq!(back_to_one, one);
    }

    #[test]
    fn removing_missing_key_keeps_the_same_version() {
        let map: PersistentMap<u32, u32> = (0..10).map(|i| (i, i * i)).collect();
        let same = map.remove(&42);
        assert!(same.ptr_eq(&map));
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        let map: PersistentMap<u32, ()> = (0..1024).map(|i| (i, ())).collect();
        assert!(is_balanced(&map.root));
        assert!(height(&map.root) <= 11);
        assert!(map.keys().copied().eq(0..1024));
    }

    proptest! {
        #[test]
        fn behaves_like_btree_map(ops in prop::collection::vec((any::<bool>(), 0u8..64, any::<u16>()), 0..200)) {
            let mut model = BTreeMap::new();
            let mut map = PersistentMap::new();
            for (is_insert, key, value) in ops {
                if is_insert {
                    model.insert(key, value);
                    map = map.insert(key, value);
                } else {
                    model.remove(&key);
                    map = map.remove(&key);
                }
                prop_assert!(is_balanced(&map.root));
            }
            prop_assert_eq!(map.len(), model.len());
            prop_assert!(map.iter().map(|(k, v)| (*k, *v)).eq(model.into_iter()));
        }
    }
}
