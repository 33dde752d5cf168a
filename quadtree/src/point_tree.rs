use std::fmt::Display;
use std::io;

use smallvec::{smallvec, SmallVec};

use common::scalar::Scalar;
use common::shapes::{Aabb, QueryAll, QueryShape, Vec2};

use crate::config::Config;
use crate::error::{TreeError, TreeResult};
use crate::extract::{Locate, SelfPosition};
use crate::index::TreeIndex;
use crate::pool::Pool;

/// Reference to an element slot in a [`PointTree`]. Ordered by node id,
/// then slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle<I = u32> {
    pub node: I,
    pub slot: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    /// Slots are being filled; no children.
    Leaf,
    /// Four children; slots unused.
    Stem,
    /// Slots are full and `children[0]` continues this node's list.
    Link,
}

struct PointNode<T, I> {
    slots: Vec<T>,
    children: [I; 4],
    state: NodeState,
    hash: u64,
}

impl<T, I: TreeIndex> PointNode<T, I> {
    fn empty(capacity: usize) -> Self {
        PointNode {
            slots: Vec::with_capacity(capacity),
            children: [I::from_usize(0); 4],
            state: NodeState::Leaf,
            hash: 0,
        }
    }
}

/// XOR-accumulated coordinate signature. Identical positions cancel, so
/// a full leaf with a zero hash is (almost certainly) all-coincident and
/// must not be split.
fn point_hash<F: Scalar>(p: Vec2<F>) -> u64 {
    (fxhash::hash64(&p.x.to_bits()) << 1) ^ fxhash::hash64(&p.y.to_bits())
}

/// Bucketed point quadtree with an overflow chain for coincident points.
///
/// Payload positions are read through the `L` extractor; `I` is the
/// integer kind used for node links.
pub struct PointTree<T, F: Scalar, L = SelfPosition, I: TreeIndex = u32> {
    nodes: Pool<PointNode<T, I>>,
    root: I,
    bounds: Aabb<F>,
    locate: L,
    node_capacity: usize,
    len: usize,
}

fn nid<I: TreeIndex>(id: I) -> u32 {
    id.to_usize() as u32
}

impl<T, F: Scalar, L: Locate<T, F> + Default, I: TreeIndex> PointTree<T, F, L, I> {
    pub fn new(bounds: Aabb<F>) -> TreeResult<Self, F> {
        Self::with_extractor(bounds, L::default(), Config::default())
    }

    pub fn new_with_config(bounds: Aabb<F>, config: Config) -> TreeResult<Self, F> {
        Self::with_extractor(bounds, L::default(), config)
    }
}

impl<T, F: Scalar, L: Locate<T, F>, I: TreeIndex> PointTree<T, F, L, I> {
    pub fn with_extractor(bounds: Aabb<F>, locate: L, config: Config) -> TreeResult<Self, F> {
        if !(bounds.half.x > F::zero()) || !(bounds.half.y > F::zero()) {
            return Err(TreeError::InvalidBounds { bounds });
        }
        if config.node_capacity == 0 {
            return Err(TreeError::InvalidCapacity { capacity: 0 });
        }
        let mut tree = PointTree {
            nodes: match config.seed {
                Some(seed) => Pool::with_seed(seed),
                None => Pool::new(),
            },
            root: I::from_usize(0),
            bounds,
            locate,
            node_capacity: config.node_capacity,
            len: 0,
        };
        tree.root = tree.create_node();
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> Aabb<F> {
        self.bounds
    }

    /// Move `value` into the tree and return a handle to its slot.
    ///
    /// The position must lie inside the world box (boundary included).
    pub fn insert(&mut self, value: T) -> TreeResult<Handle<I>, F> {
        let p = self.locate.position(&value);
        if !self.bounds.contains_point(p) {
            return Err(TreeError::OutOfBounds {
                point: p,
                bounds: self.bounds,
            });
        }
        let handle = self.insert_at(value, p, self.root, self.bounds);
        if self.nodes.capacity() > I::MAX {
            return Err(TreeError::NodeLimitExceeded {
                nodes: self.nodes.capacity(),
                max: I::MAX,
            });
        }
        self.len += 1;
        Ok(handle)
    }

    fn insert_at(&mut self, value: T, p: Vec2<F>, node: I, region: Aabb<F>) -> Handle<I> {
        let mut node = node;
        let mut region = region;
        loop {
            let state = self.nodes.get(nid(node)).state;
            match state {
                NodeState::Stem => {
                    let q = region.quadrant_of(p);
                    node = self.nodes.get(nid(node)).children[q];
                    region = region.quadrant(q);
                }
                NodeState::Link => {
                    // The region does not shrink along an overflow chain.
                    node = self.nodes.get(nid(node)).children[0];
                }
                NodeState::Leaf => {
                    let count = self.nodes.get(nid(node)).slots.len();
                    if count < self.node_capacity {
                        let n = self.nodes.get_mut(nid(node));
                        n.slots.push(value);
                        n.hash ^= point_hash(p);
                        return Handle {
                            node,
                            slot: count as u32,
                        };
                    }
                    if self.nodes.get(nid(node)).hash != 0 {
                        self.split(node, region);
                    } else {
                        // Every slot holds the same position; splitting
                        // would recurse forever. Chain a fresh leaf on.
                        let next = self.create_node();
                        let n = self.nodes.get_mut(nid(node));
                        n.state = NodeState::Link;
                        n.children[0] = next;
                    }
                }
            }
        }
    }

    /// Turn a full leaf into a stem and redistribute its slots.
    fn split(&mut self, node: I, region: Aabb<F>) {
        let children = [
            self.create_node(),
            self.create_node(),
            self.create_node(),
            self.create_node(),
        ];
        let drained = {
            let n = self.nodes.get_mut(nid(node));
            n.children = children;
            n.state = NodeState::Stem;
            n.hash = 0;
            std::mem::take(&mut n.slots)
        };
        for value in drained {
            let p = self.locate.position(&value);
            self.insert_at(value, p, node, region);
        }
    }

    fn create_node(&mut self) -> I {
        let id = self.nodes.allocate(PointNode::empty(self.node_capacity));
        I::from_usize(id as usize)
    }

    /// Constant-time lookup of a handle produced by `insert` or `query`.
    pub fn deref(&self, handle: Handle<I>) -> &T {
        &self.nodes.get(nid(handle.node)).slots[handle.slot as usize]
    }

    pub fn deref_mut(&mut self, handle: Handle<I>) -> &mut T {
        &mut self.nodes.get_mut(nid(handle.node)).slots[handle.slot as usize]
    }

    /// Append a handle for every element whose position the shape
    /// contains. Emission order is unspecified.
    pub fn query(&self, shape: &impl QueryShape<F>, out: &mut Vec<Handle<I>>) {
        let mut stack: SmallVec<[(I, Aabb<F>); 32]> = smallvec![(self.root, self.bounds)];
        while let Some((id, region)) = stack.pop() {
            if !shape.intersects_aabb(&region) {
                continue;
            }
            let n = self.nodes.get(nid(id));
            match n.state {
                NodeState::Stem => {
                    for q in 0..4 {
                        stack.push((n.children[q], region.quadrant(q)));
                    }
                }
                NodeState::Leaf | NodeState::Link => {
                    for (slot, value) in n.slots.iter().enumerate() {
                        if shape.contains_point(self.locate.position(value)) {
                            out.push(Handle {
                                node: id,
                                slot: slot as u32,
                            });
                        }
                    }
                    if n.state == NodeState::Link {
                        stack.push((n.children[0], region));
                    }
                }
            }
        }
    }

    /// Visit every matching element by reference.
    pub fn query_with(&self, shape: &impl QueryShape<F>, mut callback: impl FnMut(&T)) {
        let mut stack: SmallVec<[(I, Aabb<F>); 32]> = smallvec![(self.root, self.bounds)];
        while let Some((id, region)) = stack.pop() {
            if !shape.intersects_aabb(&region) {
                continue;
            }
            let n = self.nodes.get(nid(id));
            match n.state {
                NodeState::Stem => {
                    for q in 0..4 {
                        stack.push((n.children[q], region.quadrant(q)));
                    }
                }
                NodeState::Leaf | NodeState::Link => {
                    for value in n.slots.iter() {
                        if shape.contains_point(self.locate.position(value)) {
                            callback(value);
                        }
                    }
                    if n.state == NodeState::Link {
                        stack.push((n.children[0], region));
                    }
                }
            }
        }
    }

    /// Visit every matching element mutably. Positions must not be
    /// changed through the callback; the tree is not re-indexed.
    pub fn query_with_mut(&mut self, shape: &impl QueryShape<F>, mut callback: impl FnMut(&mut T)) {
        let PointTree {
            nodes,
            root,
            bounds,
            locate,
            ..
        } = self;
        let mut stack: SmallVec<[(I, Aabb<F>); 32]> = smallvec![(*root, *bounds)];
        while let Some((id, region)) = stack.pop() {
            if !shape.intersects_aabb(&region) {
                continue;
            }
            let n = nodes.get_mut(nid(id));
            match n.state {
                NodeState::Stem => {
                    for q in 0..4 {
                        stack.push((n.children[q], region.quadrant(q)));
                    }
                }
                NodeState::Leaf | NodeState::Link => {
                    for value in n.slots.iter_mut() {
                        if shape.contains_point(locate.position(value)) {
                            callback(value);
                        }
                    }
                    if n.state == NodeState::Link {
                        stack.push((n.children[0], region));
                    }
                }
            }
        }
    }

    /// Build a new tree holding `f` of every element.
    pub fn map(&self, f: impl Fn(&T) -> T) -> TreeResult<Self, F>
    where
        L: Clone,
    {
        self.map_if(f, |_| true)
    }

    /// Build a new tree holding `f` of every element matching `pred`.
    pub fn map_if(&self, f: impl Fn(&T) -> T, pred: impl Fn(&T) -> bool) -> TreeResult<Self, F>
    where
        L: Clone,
    {
        let mut mapped = Self::with_extractor(
            self.bounds,
            self.locate.clone(),
            Config {
                node_capacity: self.node_capacity,
                seed: None,
            },
        )?;
        let mut failure = None;
        self.query_with(&QueryAll, |value| {
            if failure.is_none() && pred(value) {
                if let Err(error) = mapped.insert(f(value)) {
                    failure = Some(error);
                }
            }
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(mapped),
        }
    }

    /// Consuming [`Self::map`]: elements are moved through `f`.
    pub fn into_map(self, f: impl FnMut(T) -> T) -> TreeResult<Self, F>
    where
        L: Clone,
    {
        self.into_map_if(f, |_| true)
    }

    /// Consuming [`Self::map_if`]; `pred` sees the untransformed value.
    pub fn into_map_if(
        self,
        mut f: impl FnMut(T) -> T,
        pred: impl Fn(&T) -> bool,
    ) -> TreeResult<Self, F>
    where
        L: Clone,
    {
        let mut mapped = Self::with_extractor(
            self.bounds,
            self.locate.clone(),
            Config {
                node_capacity: self.node_capacity,
                seed: None,
            },
        )?;
        for (_, node) in self.nodes {
            for value in node.slots {
                if pred(&value) {
                    mapped.insert(f(value))?;
                }
            }
        }
        Ok(mapped)
    }

    /// Render the tree to stderr.
    pub fn dump(&self)
    where
        F: Display,
    {
        let _ = self.dump_to(&mut io::stderr());
    }

    /// Render the tree as indented `Stem`/`Leaf` lines.
    pub fn dump_to<W: io::Write>(&self, out: &mut W) -> io::Result<()>
    where
        F: Display,
    {
        self.dump_node(out, self.root, self.bounds, 0)
    }

    fn dump_node<W: io::Write>(
        &self,
        out: &mut W,
        id: I,
        region: Aabb<F>,
        depth: usize,
    ) -> io::Result<()>
    where
        F: Display,
    {
        let mut end = id;
        while self.nodes.get(nid(end)).state == NodeState::Link {
            end = self.nodes.get(nid(end)).children[0];
        }
        let end_state = self.nodes.get(nid(end)).state;
        if end_state == NodeState::Stem {
            if end == id {
                write!(out, "Stem ")?;
            } else {
                write!(out, "Stem (with overflow nodes) ")?;
            }
        } else {
            write!(out, "Leaf ")?;
        }
        write_aabb(out, &region)?;
        write!(out, ":")?;

        let mut current = id;
        loop {
            let n = self.nodes.get(nid(current));
            for value in n.slots.iter() {
                let p = self.locate.position(value);
                write!(out, " ({}, {})", p.x, p.y)?;
            }
            if n.state != NodeState::Link {
                break;
            }
            current = n.children[0];
        }
        writeln!(out)?;

        if end_state == NodeState::Stem {
            let n = self.nodes.get(nid(end));
            let children = n.children;
            for (q, label) in ["NW", "NE", "SW", "SE"].iter().enumerate() {
                for _ in 0..=depth {
                    write!(out, " ")?;
                }
                write!(out, "{} ", label)?;
                self.dump_node(out, children[q], region.quadrant(q), depth + 1)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn write_aabb<W: io::Write, F: Scalar + Display>(
    out: &mut W,
    region: &Aabb<F>,
) -> io::Result<()> {
    write!(
        out,
        "[{}, {}; {}, {}]",
        region.left(),
        region.top(),
        region.right(),
        region.bottom()
    )
}
