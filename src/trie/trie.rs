use std::any::Any;
use std::collections::HashMap;
use std::str::Chars;
use std::sync::Arc;

/// Type-erased value payload stored at a value node.
/// Callers recover the concrete type through a runtime downcast in [`Trie::get`].
pub(crate) type TrieValue = Arc<dyn Any + Send + Sync>;

/// A single trie node. Nodes are immutable after construction; mutation is
/// expressed by building a replacement node that aliases unchanged children.
#[derive(Default)]
struct TrieNode {
    /// One outgoing edge per character, shared with every trie that contains
    /// this subtree
    children: HashMap<char, Arc<TrieNode>>,
    /// Present iff this node terminates a stored key
    value: Option<TrieValue>,
}

/// A persistent character-keyed trie with structural sharing.
///
/// A `Trie` is a cheap handle to an immutable root node. `put` and `remove`
/// never modify the receiver; they return a new `Trie` whose untouched
/// subtrees alias the old one, so any number of snapshots can coexist and be
/// read without synchronization.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Returns true if the trie stores no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up `key` and returns a reference to its value if the key is
    /// present and the stored value is a `T`. A type mismatch yields `None`,
    /// never an error.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.walk(key)?.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie in which `key` maps to `value`. The receiver is
    /// unchanged; every subtree off the rewritten spine is shared.
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) -> Trie {
        self.put_value(key, Arc::new(value))
    }

    /// Returns a new trie with `key` removed. If the key is absent the
    /// original trie is returned (same root). Interior nodes left with no
    /// value and no children are pruned bottom-up.
    pub fn remove(&self, key: &str) -> Trie {
        let Some(root) = self.root.as_deref() else {
            return self.clone();
        };
        match Self::erase(root, &mut key.chars()) {
            // key absent, hand back the same root
            None => self.clone(),
            Some(None) => Trie { root: None },
            Some(root) => Trie { root },
        }
    }

    pub(crate) fn put_value(&self, key: &str, value: TrieValue) -> Trie {
        let root = Self::insert(self.root.as_deref(), &mut key.chars(), value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Type-erased lookup used by the concurrent store facade.
    pub(crate) fn get_value(&self, key: &str) -> Option<TrieValue> {
        self.walk(key)?.value.clone()
    }

    /// Follows `key` one character per edge down from the root.
    fn walk(&self, key: &str) -> Option<&TrieNode> {
        let mut node = self.root.as_deref()?;
        for ch in key.chars() {
            node = node.children.get(&ch)?.as_ref();
        }
        Some(node)
    }

    /// Rebuilds the spine for `key`, aliasing everything else. `node` is the
    /// existing node at this position, if any.
    fn insert(node: Option<&TrieNode>, key: &mut Chars<'_>, value: TrieValue) -> TrieNode {
        let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
        match key.next() {
            // terminal: a value node that keeps whatever children were here
            None => TrieNode {
                children,
                value: Some(value),
            },
            Some(ch) => {
                let below = node.and_then(|n| n.children.get(&ch)).map(|a| a.as_ref());
                let child = Self::insert(below, key, value);
                children.insert(ch, Arc::new(child));
                TrieNode {
                    children,
                    value: node.and_then(|n| n.value.clone()),
                }
            }
        }
    }

    /// Removes `key` below `node`, pruning emptied interior nodes on the way
    /// back up.
    ///
    /// Returns `None` when the key is absent (no new nodes are built),
    /// `Some(None)` when this node vanishes entirely, and `Some(Some(n))`
    /// when this node is replaced by `n`.
    fn erase(node: &TrieNode, key: &mut Chars<'_>) -> Option<Option<Arc<TrieNode>>> {
        match key.next() {
            None => {
                // not a value node: nothing stored under this exact key
                node.value.as_ref()?;
                if node.children.is_empty() {
                    Some(None)
                } else {
                    Some(Some(Arc::new(TrieNode {
                        children: node.children.clone(),
                        value: None,
                    })))
                }
            }
            Some(ch) => {
                let child = node.children.get(&ch)?;
                let replacement = Self::erase(child, key)?;
                let mut children = node.children.clone();
                match replacement {
                    Some(child) => {
                        children.insert(ch, child);
                    }
                    None => {
                        children.remove(&ch);
                    }
                }
                if children.is_empty() && node.value.is_none() {
                    Some(None)
                } else {
                    Some(Some(Arc::new(TrieNode {
                        children,
                        value: node.value.clone(),
                    })))
                }
            }
        }
    }
}

/// Two tries are equal when they are the same snapshot, i.e. share a root.
impl PartialEq for Trie {
    fn eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Trie {}
