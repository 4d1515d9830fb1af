use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt::{self, Debug},
    iter::{FromIterator, FusedIterator},
    mem,
};

use log::{debug, error, info, trace};
use rand::Rng;

use crate::depth::Depth;
use crate::error::Error;

/// Llrb manage a single instance of in-memory ordered map using
/// [left-leaning-red-black][llrb] tree. Every node carries the number
/// of entries in its subtree, so the entry count is read from the root
/// in constant time.
///
/// [llrb]: https://en.wikipedia.org/wiki/Left-leaning_red-black_tree
#[derive(Clone)]
pub struct Llrb<K, V> {
    name: String,
    root: Option<Box<Node<K, V>>>,
}

/// Different ways to construct a new Llrb instance.
impl<K, V> Llrb<K, V>
where
    K: Ord,
{
    /// Create an empty instance of Llrb, identified by `name`.
    /// Applications can choose unique names.
    pub fn new<S>(name: S) -> Llrb<K, V>
    where
        S: AsRef<str>,
    {
        Llrb {
            name: name.as_ref().to_string(),
            root: Default::default(),
        }
    }

    /// Create a new instance of Llrb tree and load it with entries
    /// from `iter`. Duplicate keys follow [`Llrb::put`], the last value
    /// for a key wins.
    pub fn load_from<S, I>(name: S, iter: I) -> Llrb<K, V>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut llrb = Llrb::new(name);
        for (key, value) in iter {
            llrb.put(key, value);
        }
        info!("{}: loaded {} entries", llrb.name, llrb.len());
        llrb
    }
}

/// Maintenance API.
impl<K, V> Llrb<K, V>
where
    K: Ord,
{
    /// Identify this instance. Applications can choose unique names while
    /// creating Llrb instances.
    #[inline]
    pub fn id(&self) -> String {
        self.name.clone()
    }

    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        size(self.root.as_deref())
    }

    /// Check whether this index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return quickly with basic statisics, only entries() and
    /// node_size() are valid with this statisics.
    pub fn stats(&self) -> Stats {
        Stats::new(self.len(), mem::size_of::<Node<K, V>>())
    }
}

type Upsert<K, V> = (Box<Node<K, V>>, Option<V>);

type Delete<K, V> = (Option<Box<Node<K, V>>>, Option<V>);

type Delmin<K, V> = (Option<Box<Node<K, V>>>, Option<(K, V)>);

/// Write operations on Llrb instance.
impl<K, V> Llrb<K, V>
where
    K: Ord,
{
    /// Set value for key. If there is an existing entry for key,
    /// overwrite the old value with new value and return the old value.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let (mut root, old_value) = Llrb::upsert(self.root.take(), key, value);
        root.set_black();
        self.root = Some(root);
        trace!("{}: put, replaced:{}", self.name, old_value.is_some());
        old_value
    }

    /// Create a new {key, value} entry in the index. If key is already
    /// present return error and leave the index untouched.
    pub fn create(&mut self, key: K, value: V) -> Result<(), Error<K>>
    where
        K: Debug,
    {
        if self.contains_key(&key) {
            return Err(Error::OverwriteKey);
        }
        self.put(key, value);
        Ok(())
    }

    /// Delete key from this instance and return its value. If key is
    /// not present, then delete is a no-op and returns None, the tree is
    /// left untouched.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // do_delete() must only see keys that are present, see below.
        if !self.contains_key(key) {
            debug!("{}: delete, key not found", self.name);
            return None;
        }

        let mut root = self.root.take();
        if let Some(root) = root.as_mut() {
            if !is_red(root.left_deref()) && !is_red(root.right_deref()) {
                root.set_red();
            }
        }
        let (root, old_value) = Llrb::do_delete(root, key);
        self.root = root.map(|mut root| {
            root.set_black();
            root
        });
        trace!("{}: delete, len:{}", self.name, self.len());
        old_value
    }

    /// Delete the entry with the smallest key and return it. On an
    /// empty index this is a no-op and returns None.
    pub fn delete_min(&mut self) -> Option<(K, V)> {
        let mut root = match self.root.take() {
            Some(root) => root,
            None => {
                debug!("{}: delete_min on empty index", self.name);
                return None;
            }
        };
        if !is_red(root.left_deref()) && !is_red(root.right_deref()) {
            root.set_red();
        }
        let (root, entry) = Llrb::do_delete_min(Some(root));
        self.root = root.map(|mut root| {
            root.set_black();
            root
        });
        trace!("{}: delete_min, len:{}", self.name, self.len());
        entry
    }

    /// Validate LLRB tree with following rules:
    ///
    /// * Root is black.
    /// * From root to any leaf, no consecutive reds allowed in its path.
    /// * Red links lean left.
    /// * Number of blacks should be same under left child and right child.
    /// * Subtree size matches the nodes under it.
    /// * Make sure keys are in sorted order.
    ///
    /// Additionally return full statistics on the tree. Refer to [`Stats`]
    /// for more information.
    pub fn validate(&self) -> Result<Stats, Error<K>>
    where
        K: Clone + Debug,
    {
        self.do_validate().map_err(|err| {
            error!("{}: validate, {}", self.name, err);
            err
        })
    }

    fn do_validate(&self) -> Result<Stats, Error<K>>
    where
        K: Clone + Debug,
    {
        let root = self.root.as_deref();
        if is_red(root) {
            return Err(Error::RedRoot);
        }

        let mut depths = Depth::new();
        let blacks = Llrb::validate_tree(root, false, 0, 0, &mut depths)?;

        let mut iter = self.iter();
        if let Some((mut prev, _)) = iter.next() {
            for (key, _) in iter {
                if key.le(prev) {
                    return Err(Error::SortError(key.clone(), prev.clone()));
                }
                prev = key;
            }
        }

        let mut stats = self.stats();
        stats.set_blacks(blacks);
        stats.set_depths(depths);
        Ok(stats)
    }
}

/// Read operations on Llrb instance.
impl<K, V> Llrb<K, V>
where
    K: Ord,
{
    /// Get the value for key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).map(|node| &node.value)
    }

    /// Check whether key is present in this index.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Return the smallest key in this index.
    pub fn min(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left_deref() {
            node = left;
        }
        Some(&node.key)
    }

    /// Return the largest key in this index.
    pub fn max(&self) -> Option<&K> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right_deref() {
            node = right;
        }
        Some(&node.key)
    }

    /// Return a random entry from this index.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<(&K, &V)> {
        let mut node = self.root.as_deref()?;

        let mut at_depth = rng.gen::<u8>() % 40;
        loop {
            let next = if rng.gen::<bool>() {
                node.left_deref()
            } else {
                node.right_deref()
            };
            match next {
                Some(next) if at_depth > 0 => {
                    at_depth -= 1;
                    node = next;
                }
                _ => break Some((&node.key, &node.value)),
            }
        }
    }

    /// Return an iterator over all entries in this instance, in key order.
    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.root.as_deref())
    }

    fn find<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self.root.as_deref();
        while let Some(nref) = node {
            node = match nref.key.borrow().cmp(key) {
                Ordering::Less => nref.right_deref(),
                Ordering::Greater => nref.left_deref(),
                Ordering::Equal => return Some(nref),
            };
        }
        None
    }
}

impl<K, V> Llrb<K, V>
where
    K: Ord,
{
    fn upsert(node: Option<Box<Node<K, V>>>, key: K, value: V) -> Upsert<K, V> {
        let mut node = match node {
            None => return (Node::new(key, value), None),
            Some(node) => node,
        };

        let old_value = match node.key.cmp(&key) {
            Ordering::Greater => {
                let (left, o) = Llrb::upsert(node.left.take(), key, value);
                node.left = Some(left);
                o
            }
            Ordering::Less => {
                let (right, o) = Llrb::upsert(node.right.take(), key, value);
                node.right = Some(right);
                o
            }
            Ordering::Equal => Some(mem::replace(&mut node.value, value)),
        };
        (Llrb::walkup_rot23(node), old_value)
    }

    // PRECONDITION: key is present under node. delete() probes for it
    // before the first call.
    //
    // Borrowing a red link with move_red_left/move_red_right flips both
    // children of node. For a present key those children always exist:
    // the key lies below the child we descend into, and black balance
    // gives it a sibling. For a missing key the descent can reach a
    // node with one empty side and flip() panics.
    fn do_delete<Q>(node: Option<Box<Node<K, V>>>, key: &Q) -> Delete<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = match node {
            None => return (None, None),
            Some(node) => node,
        };

        let old_value = if node.key.borrow().gt(key) {
            if !is_red(node.left_deref()) && !is_red(left_of(node.left_deref())) {
                node = Llrb::move_red_left(node);
            }
            let (left, old_value) = Llrb::do_delete(node.left.take(), key);
            node.left = left;
            old_value
        } else {
            if is_red(node.left_deref()) {
                node = Llrb::rotate_right(node);
            }

            if node.key.borrow().eq(key) && node.right.is_none() {
                let Node { value, .. } = *node;
                return (None, Some(value));
            }

            if !is_red(node.right_deref()) && !is_red(left_of(node.right_deref())) {
                node = Llrb::move_red_right(node);
            }

            if node.key.borrow().eq(key) {
                // splice in the successor, the smallest entry on the right.
                let (right, entry) = Llrb::do_delete_min(node.right.take());
                node.right = right;
                match entry {
                    Some((key, value)) => {
                        node.key = key;
                        Some(mem::replace(&mut node.value, value))
                    }
                    None => panic!("do_delete(): missing successor, call the programmer"),
                }
            } else {
                let (right, old_value) = Llrb::do_delete(node.right.take(), key);
                node.right = right;
                old_value
            }
        };
        (Some(Llrb::walkup_rot23(node)), old_value)
    }

    fn do_delete_min(node: Option<Box<Node<K, V>>>) -> Delmin<K, V> {
        let mut node = match node {
            None => return (None, None),
            Some(node) => node,
        };
        if node.left.is_none() {
            // a left-leaning node without left child is a leaf.
            let Node {
                key, value, right, ..
            } = *node;
            return (right, Some((key, value)));
        }

        if !is_red(node.left_deref()) && !is_red(left_of(node.left_deref())) {
            node = Llrb::move_red_left(node);
        }
        let (left, entry) = Llrb::do_delete_min(node.left.take());
        node.left = left;
        (Some(Llrb::walkup_rot23(node)), entry)
    }

    fn validate_tree(
        node: Option<&Node<K, V>>,
        fromred: bool,
        mut nb: usize,
        depth: usize,
        depths: &mut Depth,
    ) -> Result<usize, Error<K>>
    where
        K: Clone + Debug,
    {
        let node = match node {
            None => {
                depths.sample(depth);
                return Ok(nb);
            }
            Some(node) => node,
        };

        let red = !node.is_black();
        if fromred && red {
            return Err(Error::ConsecutiveReds);
        }
        if is_red(node.right_deref()) {
            return Err(Error::RedRightLink);
        }
        if !red {
            nb += 1;
        }

        let (left, right) = (node.left_deref(), node.right_deref());
        let lblacks = Llrb::validate_tree(left, red, nb, depth + 1, depths)?;
        let rblacks = Llrb::validate_tree(right, red, nb, depth + 1, depths)?;
        if lblacks != rblacks {
            let err = format!("left: {} right: {}", lblacks, rblacks);
            return Err(Error::UnbalancedBlacks(err));
        }

        let expected = 1 + size(left) + size(right);
        if node.size != expected {
            return Err(Error::SizeMismatch {
                key: node.key.clone(),
                expected,
                found: node.size,
            });
        }
        Ok(lblacks)
    }

    //--------- rotation routines for 2-3 algorithm ----------------

    // Restore the left-leaning shape on the way up, both after insert and
    // after delete, and recount the subtree.
    fn walkup_rot23(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if is_red(node.right_deref()) && !is_red(node.left_deref()) {
            node = Llrb::rotate_left(node);
        }
        if is_red(node.left_deref()) && is_red(left_of(node.left_deref())) {
            node = Llrb::rotate_right(node);
        }
        if is_red(node.left_deref()) && is_red(node.right_deref()) {
            Llrb::flip(&mut *node);
        }
        node.update_size();
        node
    }

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    (r)                 (r)  \
    //            /       \                 /     \
    //          left       x             node      xr
    //                    / \            /  \
    //                  xl   xr       left   xl
    //
    fn rotate_left(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        let mut x = match node.right.take() {
            Some(x) if !x.is_black() => x,
            _ => panic!("rotate_left(): rotating a black link, call the programmer"),
        };
        node.right = x.left.take();
        x.black = node.black;
        x.size = node.size;
        node.set_red();
        node.update_size();
        x.left = Some(node);
        x
    }

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //            (r)   \                   (r)  \
    //           /       \                 /      \
    //          x       right             xl      node
    //         / \                                / \
    //       xl   xr                             xr  right
    //
    fn rotate_right(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        let mut x = match node.left.take() {
            Some(x) if !x.is_black() => x,
            _ => panic!("rotate_right(): rotating a black link, call the programmer"),
        };
        node.left = x.right.take();
        x.black = node.black;
        x.size = node.size;
        node.set_red();
        node.update_size();
        x.right = Some(node);
        x
    }

    //        (x)                   (!x)
    //         |                     |
    //        node                  node
    //        / \                   / \
    //      (y) (z)              (!y) (!z)
    //     /      \              /      \
    //   left    right         left    right
    //
    fn flip(node: &mut Node<K, V>) {
        match (node.left.as_mut(), node.right.as_mut()) {
            (Some(left), Some(right)) => {
                left.toggle_link();
                right.toggle_link();
            }
            _ => panic!("flip(): missing child, call the programmer"),
        }
        node.toggle_link();
    }

    // Borrow a red link from the right sibling, so that the walk down
    // the left spine always lands on a 3-node or 4-node.
    fn move_red_left(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        Llrb::flip(&mut *node);
        if is_red(left_of(node.right_deref())) {
            node.right = node.right.take().map(Llrb::rotate_right);
            node = Llrb::rotate_left(node);
            Llrb::flip(&mut *node);
        }
        node
    }

    // Mirror of move_red_left, borrowing from the left sibling.
    fn move_red_right(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        Llrb::flip(&mut *node);
        if is_red(left_of(node.left_deref())) {
            node = Llrb::rotate_right(node);
            Llrb::flip(&mut *node);
        }
        node
    }
}

impl<K, V> Default for Llrb<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Llrb::new("")
    }
}

impl<K, V> Debug for Llrb<K, V>
where
    K: Ord + Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Extend<(K, V)> for Llrb<K, V>
where
    K: Ord,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Llrb<K, V>
where
    K: Ord,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Llrb::load_from("", iter)
    }
}

impl<'a, K, V> IntoIterator for &'a Llrb<K, V>
where
    K: Ord,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[inline]
fn is_red<K, V>(node: Option<&Node<K, V>>) -> bool {
    node.map_or(false, |node| !node.is_black())
}

#[inline]
fn left_of<K, V>(node: Option<&Node<K, V>>) -> Option<&Node<K, V>> {
    node.and_then(Node::left_deref)
}

#[inline]
fn size<K, V>(node: Option<&Node<K, V>>) -> usize {
    node.map_or(0, |node| node.size)
}

/// In-order iterator over [`Llrb`] entries, created by [`Llrb::iter`].
/// Iterates from both ends.
pub struct Iter<'a, K, V> {
    front: Vec<&'a Node<K, V>>,
    back: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(root: Option<&'a Node<K, V>>) -> Iter<'a, K, V> {
        let mut iter = Iter {
            front: vec![],
            back: vec![],
            remaining: size(root),
        };
        iter.push_lefts(root);
        iter.push_rights(root);
        iter
    }

    fn push_lefts(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(nref) = node {
            self.front.push(nref);
            node = nref.left_deref();
        }
    }

    fn push_rights(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(nref) = node {
            self.back.push(nref);
            node = nref.right_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.front.pop()?;
        self.push_lefts(node.right_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.back.pop()?;
        self.push_rights(node.left_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Node corresponds to a single entry in Llrb instance.
#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    black: bool,                    // store: black or red
    size: usize,                    // number of entries in this subtree
    left: Option<Box<Node<K, V>>>,  // store: left child
    right: Option<Box<Node<K, V>>>, // store: right child
}

// Primary operations on a single node.
impl<K, V> Node<K, V> {
    // new nodes always join the tree over a red link.
    fn new(key: K, value: V) -> Box<Node<K, V>> {
        Box::new(Node {
            key,
            value,
            black: false,
            size: 1,
            left: None,
            right: None,
        })
    }

    #[inline]
    fn left_deref(&self) -> Option<&Node<K, V>> {
        self.left.as_deref()
    }

    #[inline]
    fn right_deref(&self) -> Option<&Node<K, V>> {
        self.right.as_deref()
    }

    #[inline]
    fn update_size(&mut self) {
        self.size = 1 + size(self.left_deref()) + size(self.right_deref());
    }

    #[inline]
    fn set_red(&mut self) {
        self.black = false
    }

    #[inline]
    fn set_black(&mut self) {
        self.black = true
    }

    #[inline]
    fn toggle_link(&mut self) {
        self.black = !self.black
    }

    #[inline]
    fn is_black(&self) -> bool {
        self.black
    }
}

/// Statistics on [`Llrb`] tree. Serves two purpose:
///
/// * To get partial but quick statistics via [`Llrb::stats`] method.
/// * To get full statisics via [`Llrb::validate`] method.
#[derive(Default, Debug)]
pub struct Stats {
    entries: usize, // number of entries in the tree.
    node_size: usize,
    blacks: Option<usize>,
    depths: Option<Depth>,
}

impl Stats {
    fn new(entries: usize, node_size: usize) -> Stats {
        Stats {
            entries,
            node_size,
            blacks: Default::default(),
            depths: Default::default(),
        }
    }

    #[inline]
    fn set_blacks(&mut self, blacks: usize) {
        self.blacks = Some(blacks)
    }

    #[inline]
    fn set_depths(&mut self, depths: Depth) {
        self.depths = Some(depths)
    }

    /// Return number entries in [`Llrb`] instance.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Return node-size, including over-head for `Llrb<k,V>`. Although
    /// the node overhead is constant, the node size varies based on
    /// key and value types. EG:
    ///
    /// ```
    /// use llrb_sized::Llrb;
    /// let llrb: Llrb<u64, u64> = Llrb::new("myinstance");
    ///
    /// // size of key: 8 bytes
    /// // size of value: 8 bytes
    /// // overhead is 32 bytes
    /// assert_eq!(llrb.stats().node_size(), 48);
    /// ```
    #[inline]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return number of black links from root to any leaf.
    #[inline]
    pub fn blacks(&self) -> Option<usize> {
        self.blacks
    }

    /// Return [`Depth`] statistics.
    pub fn depths(&self) -> Option<Depth> {
        self.depths.clone().filter(|depths| depths.samples() > 0)
    }
}
