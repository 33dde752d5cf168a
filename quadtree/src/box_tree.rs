use std::fmt::Display;
use std::io;

use smallvec::{smallvec, SmallVec};

use common::scalar::Scalar;
use common::shapes::{Aabb, QueryShape};

use crate::config::Config;
use crate::error::{TreeError, TreeResult};
use crate::extract::{Extent, SelfExtent};
use crate::index::TreeIndex;
use crate::point_tree::write_aabb;
use crate::pool::Pool;
use crate::sort::sort_handles;

/// Reference to a canonical payload in a [`BoxTree`].
///
/// The index survives `apply`; handles captured from queries before an
/// `apply` keep pointing at the same payload afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxHandle(pub u32);

/// `link` and `stem` are never both set. A plain leaf has neither. A
/// stem may still carry slots: straddlers are stamped at the lowest stem
/// whose sub-boxes they span, instead of being copied into each child.
struct BoxNode<I> {
    slots: Vec<u32>,
    children: [I; 4],
    link: bool,
    stem: bool,
    hash: u64,
}

impl<I: TreeIndex> BoxNode<I> {
    fn empty(capacity: usize) -> Self {
        BoxNode {
            slots: Vec::with_capacity(capacity),
            children: [I::from_usize(0); 4],
            link: false,
            stem: false,
            hash: 0,
        }
    }
}

/// XOR-accumulated box signature; zero on a full node is read as "all
/// boxes identical", which routes growth through the overflow chain.
fn box_hash<F: Scalar>(b: &Aabb<F>) -> u64 {
    (fxhash::hash64(&b.center.x.to_bits()) << 3)
        ^ (fxhash::hash64(&b.center.y.to_bits()) << 2)
        ^ (fxhash::hash64(&b.half.x.to_bits()) << 1)
        ^ fxhash::hash64(&b.half.y.to_bits())
}

fn nid<I: TreeIndex>(id: I) -> u32 {
    id.to_usize() as u32
}

/// Bucketed AABB quadtree over canonical payload storage.
///
/// Payloads live in their own pool; tree nodes hold indices into it.
/// An object whose box straddles several child quadrants is kept at the
/// stem spanning them, so each payload is referenced by exactly one
/// slot and queries cannot report duplicates.
pub struct BoxTree<T, F: Scalar, E = SelfExtent, I: TreeIndex = u32> {
    nodes: Pool<BoxNode<I>>,
    items: Pool<T>,
    root: I,
    bounds: Aabb<F>,
    extract: E,
    node_capacity: usize,
    len: usize,
}

impl<T, F: Scalar, E: Extent<T, F> + Default, I: TreeIndex> BoxTree<T, F, E, I> {
    pub fn new(bounds: Aabb<F>) -> TreeResult<Self, F> {
        Self::with_extractor(bounds, E::default(), Config::default())
    }

    pub fn new_with_config(bounds: Aabb<F>, config: Config) -> TreeResult<Self, F> {
        Self::with_extractor(bounds, E::default(), config)
    }
}

impl<T, F: Scalar, E: Extent<T, F>, I: TreeIndex> BoxTree<T, F, E, I> {
    pub fn with_extractor(bounds: Aabb<F>, extract: E, config: Config) -> TreeResult<Self, F> {
        if !(bounds.half.x > F::zero()) || !(bounds.half.y > F::zero()) {
            return Err(TreeError::InvalidBounds { bounds });
        }
        if config.node_capacity == 0 {
            return Err(TreeError::InvalidCapacity { capacity: 0 });
        }
        let mut tree = BoxTree {
            nodes: match config.seed {
                Some(seed) => Pool::with_seed(seed),
                None => Pool::new(),
            },
            items: match config.seed {
                Some(seed) => Pool::with_seed(seed.wrapping_add(1)),
                None => Pool::new(),
            },
            root: I::from_usize(0),
            bounds,
            extract,
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

    /// Move `value` into the canonical pool and index it by its box,
    /// which must be fully contained in the world box.
    pub fn insert(&mut self, value: T) -> TreeResult<BoxHandle, F> {
        let item_box = self.extract.bounds(&value);
        if !self.bounds.contains_aabb(&item_box) {
            return Err(TreeError::BoxOutOfBounds {
                aabb: item_box,
                bounds: self.bounds,
            });
        }
        let idx = self.items.allocate(value);
        self.insert_idx(idx, item_box, self.root, self.bounds, false);
        if self.nodes.capacity() > I::MAX {
            return Err(TreeError::NodeLimitExceeded {
                nodes: self.nodes.capacity(),
                max: I::MAX,
            });
        }
        self.len += 1;
        Ok(BoxHandle(idx))
    }

    /// Core placement walk. `force_here` pins the payload to the current
    /// node (used for straddlers), possibly growing an overflow chain.
    fn insert_idx(&mut self, idx: u32, item_box: Aabb<F>, node: I, region: Aabb<F>, force: bool) {
        let mut node = node;
        let mut region = region;
        let mut force_here = force;
        loop {
            loop {
                let n = self.nodes.get(nid(node));
                if !n.link {
                    break;
                }
                node = n.children[0];
            }
            let (is_stem, count, hash) = {
                let n = self.nodes.get(nid(node));
                (n.stem, n.slots.len(), n.hash)
            };
            if is_stem && !force_here {
                debug_assert!(region.intersects(&item_box));
                let mut hits = 0;
                let mut lone = 0;
                for q in 0..4 {
                    if region.quadrant(q).intersects(&item_box) {
                        hits += 1;
                        lone = q;
                    }
                }
                if hits == 1 {
                    node = self.nodes.get(nid(node)).children[lone];
                    region = region.quadrant(lone);
                    continue;
                }
                // Two or more sub-boxes hit: a straddler, stamped at this
                // stem. Zero hits can occur when halving rounds the
                // sub-boxes away from the parent; keep it here as well.
                force_here = true;
                continue;
            }
            if count < self.node_capacity {
                let n = self.nodes.get_mut(nid(node));
                n.slots.push(idx);
                n.hash ^= box_hash(&item_box);
                return;
            }
            if hash != 0 && !is_stem && !force_here {
                self.split(node, region);
                continue;
            }
            // Overflow: chain a continuation node, handing any children
            // over to it so the chain stays walkable.
            let next = self.create_node();
            let (was_stem, children) = {
                let n = self.nodes.get(nid(node));
                (n.stem, n.children)
            };
            if was_stem {
                let continuation = self.nodes.get_mut(nid(next));
                continuation.stem = true;
                continuation.children = children;
            }
            let n = self.nodes.get_mut(nid(node));
            n.link = true;
            n.stem = false;
            n.children[0] = next;
            node = next;
            force_here = false;
        }
    }

    /// Turn a full leaf into a stem and push its payloads back down.
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
            n.stem = true;
            n.hash = 0;
            std::mem::take(&mut n.slots)
        };
        for idx in drained {
            let item_box = self.extract.bounds(self.items.get(idx));
            self.insert_idx(idx, item_box, node, region, false);
        }
    }

    fn create_node(&mut self) -> I {
        let id = self.nodes.allocate(BoxNode::empty(self.node_capacity));
        I::from_usize(id as usize)
    }

    pub fn deref(&self, handle: BoxHandle) -> &T {
        self.items.get(handle.0)
    }

    pub fn deref_mut(&mut self, handle: BoxHandle) -> &mut T {
        self.items.get_mut(handle.0)
    }

    /// Append a handle for every payload whose box the shape intersects,
    /// in ascending handle order and with no duplicates.
    pub fn query(&self, shape: &impl QueryShape<F>, out: &mut Vec<BoxHandle>) {
        let mut hits: Vec<BoxHandle> = Vec::new();
        let mut stack: SmallVec<[(I, Aabb<F>); 32]> = smallvec![(self.root, self.bounds)];
        while let Some((id, region)) = stack.pop() {
            if !shape.intersects_aabb(&region) {
                continue;
            }
            let mut current = id;
            loop {
                let n = self.nodes.get(nid(current));
                for &idx in &n.slots {
                    if shape.intersects_aabb(&self.extract.bounds(self.items.get(idx))) {
                        hits.push(BoxHandle(idx));
                    }
                }
                if n.link {
                    current = n.children[0];
                    continue;
                }
                if n.stem {
                    for q in 0..4 {
                        stack.push((n.children[q], region.quadrant(q)));
                    }
                }
                break;
            }
        }
        sort_handles(&mut hits);
        hits.dedup();
        out.extend(hits);
    }

    /// Visit every matching payload by reference.
    pub fn query_with(&self, shape: &impl QueryShape<F>, mut callback: impl FnMut(&T)) {
        let mut handles = Vec::new();
        self.query(shape, &mut handles);
        for handle in handles {
            callback(self.items.get(handle.0));
        }
    }

    /// Visit every matching payload mutably. Boxes must not be changed
    /// through the callback; use [`Self::apply`] for that.
    pub fn query_with_mut(&mut self, shape: &impl QueryShape<F>, mut callback: impl FnMut(&mut T)) {
        let mut handles = Vec::new();
        self.query(shape, &mut handles);
        for handle in handles {
            callback(self.items.get_mut(handle.0));
        }
    }

    /// Apply `f` to every payload and rebuild the tree around the
    /// (possibly changed) boxes. Payload indices are preserved, so
    /// existing [`BoxHandle`]s stay valid.
    pub fn apply(&mut self, mut f: impl FnMut(&mut T)) {
        self.nodes.clear();
        self.root = self.create_node();
        let live: Vec<u32> = self.items.iter().map(|(idx, _)| idx).collect();
        for idx in live {
            let item_box = {
                let value = self.items.get_mut(idx);
                f(value);
                self.extract.bounds(value)
            };
            self.insert_idx(idx, item_box, self.root, self.bounds, false);
        }
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
        while self.nodes.get(nid(end)).link {
            end = self.nodes.get(nid(end)).children[0];
        }
        let end_is_stem = self.nodes.get(nid(end)).stem;
        if end_is_stem {
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
            for &idx in &n.slots {
                write!(out, " ")?;
                write_aabb(out, &self.extract.bounds(self.items.get(idx)))?;
            }
            if !n.link {
                break;
            }
            current = n.children[0];
        }
        writeln!(out)?;

        if end_is_stem {
            let children = self.nodes.get(nid(end)).children;
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
