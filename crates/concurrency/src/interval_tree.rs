//! An augmented red-black tree over `(start, end, value)` triples,
//! ordered by `(start, end, value)` and carrying `min_start`/`max_end`
//! aggregates so overlap queries can prune whole subtrees.
//!
//! Backs [`crate::range_lock::RangeLock`]'s overlap index. Stored as an
//! arena of nodes addressed by index rather than `Rc<RefCell<_>>` or raw
//! pointers, which keeps rotations and the delete fixup free of unsafe
//! code.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node<K, V> {
    start: K,
    end: K,
    value: V,
    color: Color,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    min_start: K,
    max_end: K,
}

/// An augmented interval tree mapping `(start, end)` ranges to values.
///
/// Multiple entries may share the same `(start, end)` range; they are
/// ordered against each other by `V`'s own [`Ord`] implementation, and
/// [`IntervalTreeMap::find`] / [`IntervalTreeMap::remove`] disambiguate
/// between them by value.
#[derive(Debug, Clone)]
pub struct IntervalTreeMap<K, V> {
    arena: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl<K, V> Default for IntervalTreeMap<K, V>
where
    K: Ord + Clone,
    V: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> IntervalTreeMap<K, V>
where
    K: Ord + Clone,
    V: Ord,
{
    /// An empty tree.
    pub fn new() -> Self {
        IntervalTreeMap {
            arena: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` iff the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, i: usize) -> &Node<K, V> {
        self.arena[i].as_ref().expect("arena slot must be occupied")
    }

    fn node_mut(&mut self, i: usize) -> &mut Node<K, V> {
        self.arena[i].as_mut().expect("arena slot must be occupied")
    }

    fn color_of(&self, i: Option<usize>) -> Color {
        i.map(|i| self.node(i).color).unwrap_or(Color::Black)
    }

    fn key_of(&self, i: usize) -> (&K, &K, &V) {
        let n = self.node(i);
        (&n.start, &n.end, &n.value)
    }

    fn order(&self, i: usize, start: &K, end: &K, value: &V) -> Ordering {
        let n = self.node(i);
        n.start
            .cmp(start)
            .then_with(|| n.end.cmp(end))
            .then_with(|| n.value.cmp(value))
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        if let Some(i) = self.free.pop() {
            self.arena[i] = Some(node);
            i
        } else {
            self.arena.push(Some(node));
            self.arena.len() - 1
        }
    }

    fn recompute_aggregate(&mut self, i: usize) {
        let (left, right) = (self.node(i).left, self.node(i).right);
        let mut min_start = self.node(i).start.clone();
        let mut max_end = self.node(i).end.clone();
        if let Some(l) = left {
            if self.node(l).min_start < min_start {
                min_start = self.node(l).min_start.clone();
            }
            if self.node(l).max_end > max_end {
                max_end = self.node(l).max_end.clone();
            }
        }
        if let Some(r) = right {
            if self.node(r).min_start < min_start {
                min_start = self.node(r).min_start.clone();
            }
            if self.node(r).max_end > max_end {
                max_end = self.node(r).max_end.clone();
            }
        }
        let n = self.node_mut(i);
        n.min_start = min_start;
        n.max_end = max_end;
    }

    /// Recompute aggregates from `i` up to the root. Rotations and
    /// structural edits only ever invalidate ancestors of the changed
    /// node.
    fn recompute_up(&mut self, mut i: Option<usize>) {
        while let Some(idx) = i {
            self.recompute_aggregate(idx);
            i = self.node(idx).parent;
        }
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.node(x).right.expect("rotate_left needs a right child");
        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if let Some(yl) = y_left {
            self.node_mut(yl).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) if self.node(p).left == Some(x) => self.node_mut(p).left = Some(y),
            Some(p) => self.node_mut(p).right = Some(y),
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
        self.recompute_aggregate(x);
        self.recompute_aggregate(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.node(x).left.expect("rotate_right needs a left child");
        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if let Some(yr) = y_right {
            self.node_mut(yr).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) if self.node(p).right == Some(x) => self.node_mut(p).right = Some(y),
            Some(p) => self.node_mut(p).left = Some(y),
        }
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
        self.recompute_aggregate(x);
        self.recompute_aggregate(y);
    }

    /// Insert `(start, end) -> value` if no triple-equal entry already
    /// exists. Returns `true` on insert, `false` if the exact triple was
    /// already present.
    pub fn put(&mut self, start: K, end: K, value: V) -> bool {
        let new = Node {
            min_start: start.clone(),
            max_end: end.clone(),
            start,
            end,
            value,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        };

        let Some(mut cur) = self.root else {
            let i = self.alloc(new);
            self.node_mut(i).color = Color::Black;
            self.root = Some(i);
            self.len += 1;
            return true;
        };

        loop {
            let ord = self.order(cur, &new.start, &new.end, &new.value);
            if ord == Ordering::Equal {
                return false;
            }
            let go_left = ord == Ordering::Greater;
            let next = if go_left {
                self.node(cur).left
            } else {
                self.node(cur).right
            };
            match next {
                Some(n) => cur = n,
                None => {
                    let i = self.alloc(new);
                    self.node_mut(i).parent = Some(cur);
                    if go_left {
                        self.node_mut(cur).left = Some(i);
                    } else {
                        self.node_mut(cur).right = Some(i);
                    }
                    self.recompute_up(Some(cur));
                    self.len += 1;
                    self.insert_fixup(i);
                    return true;
                }
            }
        }
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while self.color_of(self.node(z).parent) == Color::Red {
            let parent = self.node(z).parent.unwrap();
            let grandparent = self.node(parent).parent.unwrap();
            if Some(parent) == self.node(grandparent).left {
                let uncle = self.node(grandparent).right;
                if self.color_of(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle.unwrap()).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    z = grandparent;
                } else {
                    if Some(z) == self.node(parent).right {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.node(z).parent.unwrap();
                    let grandparent = self.node(parent).parent.unwrap();
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.node(grandparent).left;
                if self.color_of(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle.unwrap()).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    z = grandparent;
                } else {
                    if Some(z) == self.node(parent).left {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.node(z).parent.unwrap();
                    let grandparent = self.node(parent).parent.unwrap();
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.rotate_left(grandparent);
                }
            }
            if Some(z) == self.root {
                break;
            }
        }
        if let Some(r) = self.root {
            self.node_mut(r).color = Color::Black;
        }
    }

    fn minimum(&self, mut i: usize) -> usize {
        while let Some(l) = self.node(i).left {
            i = l;
        }
        i
    }

    /// Locate the node matching `(start, end, value)` exactly.
    fn locate(&self, start: &K, end: &K, value: &V) -> Option<usize> {
        let mut cur = self.root;
        while let Some(i) = cur {
            match self.order(i, start, end, value) {
                Ordering::Equal => return Some(i),
                Ordering::Greater => cur = self.node(i).left,
                Ordering::Less => cur = self.node(i).right,
            }
        }
        None
    }

    /// `true` iff `(start, end, value)` is present.
    pub fn contains(&self, start: &K, end: &K, value: &V) -> bool {
        self.locate(start, end, value).is_some()
    }

    /// `true` iff `i`'s subtree could still hold a node overlapping
    /// `[q_start, q_end]` — the pruning test shared by every probe below.
    fn children_intersect(&self, i: usize, q_start: &K, q_end: &K) -> bool {
        let n = self.node(i);
        n.min_start <= *q_end && n.max_end >= *q_start
    }

    /// A single node whose interval overlaps `[start, end]`, if any exists.
    /// Guided descent (CLRS-style interval search): at each node, take an
    /// overlap found at that node immediately; otherwise follow whichever
    /// child could still contain one, per `min_start`/`max_end`.
    pub fn get(&self, start: &K, end: &K) -> Option<(&K, &K, &V)> {
        let mut cur = self.root;
        while let Some(i) = cur {
            let n = self.node(i);
            if n.start <= *end && n.end >= *start {
                return Some(self.key_of(i));
            }
            cur = match n.left {
                Some(l) if self.children_intersect(l, start, end) => Some(l),
                _ => n.right,
            };
        }
        None
    }

    /// Among nodes overlapping `[start, end]`, the one with the smallest
    /// `(start, end, value)` key. Biases into the left subtree whenever it
    /// could still hold an overlap with a smaller start, backtracking to
    /// this node and then the right subtree only once the left side is
    /// exhausted.
    pub fn get_first(&self, start: &K, end: &K) -> Option<(&K, &K, &V)> {
        self.probe_first(self.root, start, end)
    }

    fn probe_first(&self, i: Option<usize>, q_start: &K, q_end: &K) -> Option<(&K, &K, &V)> {
        let i = i?;
        if let Some(l) = self.node(i).left {
            if self.children_intersect(l, q_start, q_end) {
                if let Some(found) = self.probe_first(Some(l), q_start, q_end) {
                    return Some(found);
                }
            }
        }
        let n = self.node(i);
        if n.start <= *q_end && n.end >= *q_start {
            return Some(self.key_of(i));
        }
        match n.right {
            Some(r) if self.children_intersect(r, q_start, q_end) => {
                self.probe_first(Some(r), q_start, q_end)
            }
            _ => None,
        }
    }

    /// Among nodes overlapping `[start, end]`, the one with the largest
    /// `(start, end, value)` key — symmetric to [`Self::get_first`], biasing
    /// right before this node before left.
    pub fn get_last(&self, start: &K, end: &K) -> Option<(&K, &K, &V)> {
        self.probe_last(self.root, start, end)
    }

    fn probe_last(&self, i: Option<usize>, q_start: &K, q_end: &K) -> Option<(&K, &K, &V)> {
        let i = i?;
        if let Some(r) = self.node(i).right {
            if self.children_intersect(r, q_start, q_end) {
                if let Some(found) = self.probe_last(Some(r), q_start, q_end) {
                    return Some(found);
                }
            }
        }
        let n = self.node(i);
        if n.start <= *q_end && n.end >= *q_start {
            return Some(self.key_of(i));
        }
        match n.left {
            Some(l) if self.children_intersect(l, q_start, q_end) => {
                self.probe_last(Some(l), q_start, q_end)
            }
            _ => None,
        }
    }

    /// Every entry whose `[start, end]` interval overlaps `[q_start,
    /// q_end]`, using the `max_end` aggregate to prune subtrees that
    /// cannot contain an overlap.
    pub fn get_all(&self, q_start: &K, q_end: &K) -> Vec<(&K, &K, &V)> {
        let mut out = Vec::new();
        self.collect_overlaps(self.root, q_start, q_end, &mut out);
        out
    }

    fn collect_overlaps<'a>(
        &'a self,
        i: Option<usize>,
        q_start: &K,
        q_end: &K,
        out: &mut Vec<(&'a K, &'a K, &'a V)>,
    ) {
        let Some(i) = i else { return };
        let n = self.node(i);
        if let Some(l) = n.left {
            if self.node(l).max_end >= *q_start {
                self.collect_overlaps(Some(l), q_start, q_end, out);
            }
        }
        if n.start <= *q_end && n.end >= *q_start {
            out.push((&n.start, &n.end, &n.value));
        }
        if n.start <= *q_end {
            self.collect_overlaps(n.right, q_start, q_end, out);
        }
    }

    /// Remove the entry matching `(start, end, value)` exactly. Returns
    /// `true` if it was present.
    pub fn remove(&mut self, start: &K, end: &K, value: &V) -> bool {
        let Some(z) = self.locate(start, end, value) else {
            return false;
        };
        self.delete_node(z);
        self.len -= 1;
        true
    }

    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let parent = self.node(u).parent;
        match parent {
            None => self.root = v,
            Some(p) if self.node(p).left == Some(u) => self.node_mut(p).left = v,
            Some(p) => self.node_mut(p).right = v,
        }
        if let Some(v) = v {
            self.node_mut(v).parent = parent;
        }
    }

    fn free_node(&mut self, i: usize) {
        self.arena[i] = None;
        self.free.push(i);
    }

    fn delete_node(&mut self, z: usize) {
        let mut y = z;
        let mut y_original_color = self.node(y).color;
        let x_parent;
        let x;

        if self.node(z).left.is_none() {
            x = self.node(z).right;
            x_parent = self.node(z).parent;
            self.transplant(z, self.node(z).right);
        } else if self.node(z).right.is_none() {
            x = self.node(z).left;
            x_parent = self.node(z).parent;
            self.transplant(z, self.node(z).left);
        } else {
            y = self.minimum(self.node(z).right.unwrap());
            y_original_color = self.node(y).color;
            x = self.node(y).right;
            if self.node(y).parent == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = self.node(y).parent;
                self.transplant(y, self.node(y).right);
                let z_right = self.node(z).right;
                self.node_mut(y).right = z_right;
                self.node_mut(self.node(y).right.unwrap()).parent = Some(y);
            }
            self.transplant(z, Some(y));
            let z_left = self.node(z).left;
            self.node_mut(y).left = z_left;
            self.node_mut(self.node(y).left.unwrap()).parent = Some(y);
            self.node_mut(y).color = self.node(z).color;
        }

        self.recompute_up(x_parent);
        self.free_node(z);

        if y_original_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
    }

    fn delete_fixup(&mut self, mut x: Option<usize>, mut x_parent: Option<usize>) {
        while x != self.root && self.color_of(x) == Color::Black {
            let Some(parent) = x_parent else { break };
            if x == self.node(parent).left {
                let mut w = self.node(parent).right.unwrap();
                if self.color_of(Some(w)) == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(parent).color = Color::Red;
                    self.rotate_left(parent);
                    w = self.node(parent).right.unwrap();
                }
                if self.color_of(self.node(w).left) == Color::Black
                    && self.color_of(self.node(w).right) == Color::Black
                {
                    self.node_mut(w).color = Color::Red;
                    x = Some(parent);
                    x_parent = self.node(parent).parent;
                } else {
                    if self.color_of(self.node(w).right) == Color::Black {
                        if let Some(wl) = self.node(w).left {
                            self.node_mut(wl).color = Color::Black;
                        }
                        self.node_mut(w).color = Color::Red;
                        self.rotate_right(w);
                        w = self.node(parent).right.unwrap();
                    }
                    self.node_mut(w).color = self.node(parent).color;
                    self.node_mut(parent).color = Color::Black;
                    if let Some(wr) = self.node(w).right {
                        self.node_mut(wr).color = Color::Black;
                    }
                    self.rotate_left(parent);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let mut w = self.node(parent).left.unwrap();
                if self.color_of(Some(w)) == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(parent).color = Color::Red;
                    self.rotate_right(parent);
                    w = self.node(parent).left.unwrap();
                }
                if self.color_of(self.node(w).right) == Color::Black
                    && self.color_of(self.node(w).left) == Color::Black
                {
                    self.node_mut(w).color = Color::Red;
                    x = Some(parent);
                    x_parent = self.node(parent).parent;
                } else {
                    if self.color_of(self.node(w).left) == Color::Black {
                        if let Some(wr) = self.node(w).right {
                            self.node_mut(wr).color = Color::Black;
                        }
                        self.node_mut(w).color = Color::Red;
                        self.rotate_left(w);
                        w = self.node(parent).left.unwrap();
                    }
                    self.node_mut(w).color = self.node(parent).color;
                    self.node_mut(parent).color = Color::Black;
                    if let Some(wl) = self.node(w).left {
                        self.node_mut(wl).color = Color::Black;
                    }
                    self.rotate_right(parent);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        if let Some(x) = x {
            self.node_mut(x).color = Color::Black;
        }
    }

    /// Every `(start, end, value)` in ascending order; used by tests to
    /// check tree shape invariants.
    #[cfg(test)]
    fn in_order(&self) -> Vec<(K, K, &V)> {
        let mut out = Vec::new();
        self.in_order_from(self.root, &mut out);
        out
    }

    #[cfg(test)]
    fn in_order_from<'a>(&'a self, i: Option<usize>, out: &mut Vec<(K, K, &'a V)>) {
        let Some(i) = i else { return };
        let n = self.node(i);
        self.in_order_from(n.left, out);
        out.push((n.start.clone(), n.end.clone(), &n.value));
        self.in_order_from(n.right, out);
    }

    #[cfg(test)]
    fn black_height(&self, i: Option<usize>) -> usize {
        match i {
            None => 1,
            Some(i) => {
                let left = self.black_height(self.node(i).left);
                let right = self.black_height(self.node(i).right);
                assert_eq!(left, right, "black heights diverge under a red-black tree");
                left + if self.node(i).color == Color::Black {
                    1
                } else {
                    0
                }
            }
        }
    }

    #[cfg(test)]
    fn no_red_red(&self, i: Option<usize>) -> bool {
        let Some(i) = i else { return true };
        let n = self.node(i);
        if n.color == Color::Red
            && (self.color_of(n.left) == Color::Red || self.color_of(n.right) == Color::Red)
        {
            return false;
        }
        self.no_red_red(n.left) && self.no_red_red(n.right)
    }

    /// `true` iff every node's `min_start`/`max_end` equal the min/max of
    /// its own interval and both children's aggregates.
    #[cfg(test)]
    fn aggregates_match_subtree(&self, i: Option<usize>) -> bool {
        let Some(i) = i else { return true };
        let n = self.node(i);
        let mut min_start = n.start.clone();
        let mut max_end = n.end.clone();
        if let Some(l) = n.left {
            min_start = min_start.min(self.node(l).min_start.clone());
            max_end = max_end.max(self.node(l).max_end.clone());
        }
        if let Some(r) = n.right {
            min_start = min_start.min(self.node(r).min_start.clone());
            max_end = max_end.max(self.node(r).max_end.clone());
        }
        n.min_start == min_start
            && n.max_end == max_end
            && self.aggregates_match_subtree(n.left)
            && self.aggregates_match_subtree(n.right)
    }
}
