//! Network graph (nodes, directed links, turns) and its builder.
//!
//! # Data layout
//!
//! Ids are assigned in insertion order, so every per-node / per-link /
//! per-turn attribute is a plain `Vec` indexed by id.  Adjacency is stored
//! in **Compressed Sparse Row (CSR)** form over link (or turn) ids:
//!
//! ```text
//! out_links[ node_out_start[n] .. node_out_start[n+1] ]   links leaving n
//! in_links [ node_in_start[n]  .. node_in_start[n+1]  ]   links entering n
//! out_turns[ link_turn_start[l] .. link_turn_start[l+1] ] turns leaving l
//! ```
//!
//! # Turns and intersections
//!
//! A node is an *intersection* when it carries a turn table.  At an
//! intersection the search only moves from one link to the next through a
//! recorded turn; a missing turn is as good as a prohibited one.  A turn's
//! `penalty` of [`PROHIBITED`] marks it as prohibited.
//!
//! The network is immutable once built.  Searches keep their scratch state
//! in side tables and never write back into it.

use tracing::debug;

use tdm_core::{GridConfig, LinkId, Mode, ModeSet, NodeId, Point, TurnId};

use crate::grid::GridIndex;
use crate::range::Rectangle;
use crate::{SpatialError, SpatialResult};

/// Turn penalty value that marks a turn as prohibited.
pub const PROHIBITED: f64 = 0.0;

// ── Network ───────────────────────────────────────────────────────────────────

/// Directed link/node/turn graph in CSR form.
///
/// All fields are `pub` for direct indexed access on hot paths.  Do not
/// construct directly; use [`NetworkBuilder`].
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    // ── Node data ─────────────────────────────────────────────────────────
    /// Position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<Point>,

    /// `true` for nodes with a turn table.
    pub node_is_intersection: Vec<bool>,

    // ── Link data (indexed by LinkId) ─────────────────────────────────────
    pub link_from: Vec<NodeId>,
    pub link_to: Vec<NodeId>,

    /// Link length in network length units.
    pub link_length: Vec<f64>,

    /// Default speed attribute, in length units per time unit.
    pub link_speed: Vec<f64>,

    /// Modes permitted on each link.
    pub link_modes: Vec<ModeSet>,

    // ── Turn data (indexed by TurnId) ─────────────────────────────────────
    pub turn_from: Vec<LinkId>,
    pub turn_to: Vec<LinkId>,

    /// Turn penalty value; [`PROHIBITED`] marks a prohibited turn.
    pub turn_penalty: Vec<f64>,

    // ── CSR adjacency ─────────────────────────────────────────────────────
    node_out_start: Vec<u32>,
    out_links: Vec<LinkId>,
    node_in_start: Vec<u32>,
    in_links: Vec<LinkId>,
    link_turn_start: Vec<u32>,
    out_turns: Vec<TurnId>,
}

impl Network {
    /// Construct an empty network with no nodes or links.
    pub fn empty() -> Self {
        NetworkBuilder::new().build()
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn link_count(&self) -> usize {
        self.link_to.len()
    }

    pub fn turn_count(&self) -> usize {
        self.turn_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    #[inline]
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    #[inline]
    pub fn contains_link(&self, link: LinkId) -> bool {
        link.index() < self.link_count()
    }

    #[inline]
    pub fn is_intersection(&self, node: NodeId) -> bool {
        self.node_is_intersection[node.index()]
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Links leaving `node`.
    #[inline]
    pub fn out_links(&self, node: NodeId) -> &[LinkId] {
        csr_slice(&self.node_out_start, &self.out_links, node.index())
    }

    /// Links entering `node`.
    #[inline]
    pub fn in_links(&self, node: NodeId) -> &[LinkId] {
        csr_slice(&self.node_in_start, &self.in_links, node.index())
    }

    /// Turns from `link` into the links leaving its head node.
    #[inline]
    pub fn out_turns(&self, link: LinkId) -> &[TurnId] {
        csr_slice(&self.link_turn_start, &self.out_turns, link.index())
    }

    /// The turn from `from` into `to`, if one is recorded.
    pub fn turn(&self, from: LinkId, to: LinkId) -> Option<TurnId> {
        self.out_turns(from).iter().copied().find(|t| self.turn_to[t.index()] == to)
    }

    #[inline]
    pub fn is_turn_prohibited(&self, turn: TurnId) -> bool {
        self.turn_penalty[turn.index()] == PROHIBITED
    }

    /// The opposite-direction link (head and tail swapped), if any.
    ///
    /// The two links are independent entities; this is a lookup only.
    pub fn reverse_link(&self, link: LinkId) -> Option<LinkId> {
        let from = self.link_from[link.index()];
        let to = self.link_to[link.index()];
        self.out_links(to).iter().copied().find(|l| self.link_to[l.index()] == from)
    }

    #[inline]
    pub fn link_permits(&self, link: LinkId, mode: Mode) -> bool {
        self.link_modes[link.index()].contains(mode)
    }

    // ── Spatial ───────────────────────────────────────────────────────────

    /// Bounding rectangle of all node positions, or `None` if empty.
    pub fn extent(&self) -> Option<Rectangle> {
        Rectangle::from_points(self.node_pos.iter().copied())
    }

    /// Grid index over the node positions.
    ///
    /// A network whose nodes are collinear has a zero-area extent; give the
    /// config a positive `margin` in that case.
    pub fn node_grid(&self, config: &GridConfig) -> SpatialResult<GridIndex<NodeId>> {
        let extent = self
            .extent()
            .ok_or_else(|| SpatialError::InvalidConfiguration("network has no nodes".into()))?;
        let mut grid = GridIndex::from_config(extent, config)?;
        for (i, p) in self.node_pos.iter().enumerate() {
            grid.insert_point(NodeId(i as u32), p.x, p.y)?;
        }
        Ok(grid)
    }

    /// The node nearest to `pos`, using `grid` (built by
    /// [`node_grid`](Self::node_grid)) to narrow the candidates.
    ///
    /// The ring search gives a first candidate; a circle query at that
    /// candidate's distance then catches any closer node in a neighbouring
    /// ring.  Returns `None` only if the grid is empty.
    pub fn snap_to_node(&self, grid: &GridIndex<NodeId>, pos: Point) -> Option<NodeId> {
        let first = self.closest_of(grid.nearest_to_point(pos.x, pos.y), pos)?;
        let radius = self.node_pos[first.index()].distance(pos);
        self.closest_of(grid.query_circle(pos.x, pos.y, radius), pos).or(Some(first))
    }

    fn closest_of<I: IntoIterator<Item = NodeId>>(&self, candidates: I, pos: Point) -> Option<NodeId> {
        candidates
            .into_iter()
            .filter(|n| self.contains_node(*n))
            .min_by(|a, b| {
                let da = self.node_pos[a.index()].distance_sq(pos);
                let db = self.node_pos[b.index()].distance_sq(pos);
                da.total_cmp(&db).then(a.cmp(b))
            })
    }
}

#[inline]
fn csr_slice<'a, T>(start: &[u32], items: &'a [T], i: usize) -> &'a [T] {
    &items[start[i] as usize..start[i + 1] as usize]
}

/// Build a CSR row-pointer array plus the items grouped by row.
///
/// Counting sort: items keep their input (id) order within a row.
fn build_csr<T: Copy + Default>(rows: usize, items: &[(usize, T)]) -> (Vec<u32>, Vec<T>) {
    let mut start = vec![0u32; rows + 1];
    for &(row, _) in items {
        start[row + 1] += 1;
    }
    for i in 1..=rows {
        start[i] += start[i - 1];
    }
    debug_assert_eq!(start[rows] as usize, items.len());

    let mut fill = start.clone();
    let mut out = vec![T::default(); items.len()];
    for &(row, item) in items {
        out[fill[row] as usize] = item;
        fill[row] += 1;
    }
    (start, out)
}

// ── NetworkBuilder ────────────────────────────────────────────────────────────

/// Construct a [`Network`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use tdm_core::{ModeSet, Point};
/// use tdm_spatial::NetworkBuilder;
///
/// let mut b = NetworkBuilder::new();
/// let a = b.add_node(Point::new(0.0, 0.0));
/// let c = b.add_node(Point::new(1.0, 0.0));
/// let modes: ModeSet = "c".parse().unwrap();
/// b.add_road(a, c, 1.0, 50.0, modes);
/// let net = b.build();
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.link_count(), 2); // bidirectional
/// ```
#[derive(Default)]
pub struct NetworkBuilder {
    nodes: Vec<Point>,
    intersections: Vec<bool>,
    links: Vec<RawLink>,
    turns: Vec<RawTurn>,
}

struct RawLink {
    from: NodeId,
    to: NodeId,
    length: f64,
    speed: f64,
    modes: ModeSet,
}

struct RawTurn {
    from: LinkId,
    to: LinkId,
    penalty: f64,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate for the expected number of nodes and links.
    pub fn with_capacity(nodes: usize, links: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            intersections: Vec::with_capacity(nodes),
            links: Vec::with_capacity(links),
            turns: Vec::new(),
        }
    }

    /// Add a regular node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: Point) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        self.intersections.push(false);
        id
    }

    /// Add a node that carries a turn table.  Until turns are added through
    /// it, every movement across it is prohibited.
    pub fn add_intersection(&mut self, pos: Point) -> NodeId {
        let id = self.add_node(pos);
        self.intersections[id.index()] = true;
        id
    }

    pub fn mark_intersection(&mut self, node: NodeId) {
        self.intersections[node.index()] = true;
    }

    /// Add a **directed** link and return its `LinkId` (sequential from 0).
    pub fn add_link(&mut self, from: NodeId, to: NodeId, length: f64, speed: f64, modes: ModeSet) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(RawLink { from, to, length, speed, modes });
        id
    }

    /// Convenience: add links in **both directions**.  Returns `(a→b, b→a)`.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, length: f64, speed: f64, modes: ModeSet) -> (LinkId, LinkId) {
        let ab = self.add_link(a, b, length, speed, modes.clone());
        let ba = self.add_link(b, a, length, speed, modes);
        (ab, ba)
    }

    /// Record a turn from `from` into `to`.  The shared node becomes an
    /// intersection.
    ///
    /// # Errors
    ///
    /// [`SpatialError::InvalidTurn`] unless `from` ends where `to` starts.
    pub fn add_turn(&mut self, from: LinkId, to: LinkId, penalty: f64) -> SpatialResult<TurnId> {
        let (Some(l_in), Some(l_out)) = (self.links.get(from.index()), self.links.get(to.index())) else {
            return Err(SpatialError::InvalidTurn { from, to });
        };
        if l_in.to != l_out.from {
            return Err(SpatialError::InvalidTurn { from, to });
        }
        let node = l_in.to;
        self.intersections[node.index()] = true;
        let id = TurnId(self.turns.len() as u32);
        self.turns.push(RawTurn { from, to, penalty });
        Ok(id)
    }

    /// Record a prohibited turn.
    pub fn prohibit_turn(&mut self, from: LinkId, to: LinkId) -> SpatialResult<TurnId> {
        self.add_turn(from, to, PROHIBITED)
    }

    pub fn node_pos(&self, id: NodeId) -> Point {
        self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Consume the builder and produce a [`Network`].
    ///
    /// Time complexity: O(N + L + T) (counting sort per adjacency).
    pub fn build(self) -> Network {
        let node_count = self.nodes.len();
        let link_count = self.links.len();

        let by_tail: Vec<_> = self.links.iter().enumerate().map(|(i, l)| (l.from.index(), LinkId(i as u32))).collect();
        let by_head: Vec<_> = self.links.iter().enumerate().map(|(i, l)| (l.to.index(), LinkId(i as u32))).collect();
        let by_in_link: Vec<_> = self.turns.iter().enumerate().map(|(i, t)| (t.from.index(), TurnId(i as u32))).collect();

        let (node_out_start, out_links) = build_csr(node_count, &by_tail);
        let (node_in_start, in_links) = build_csr(node_count, &by_head);
        let (link_turn_start, out_turns) = build_csr(link_count, &by_in_link);

        debug!(
            nodes = node_count,
            links = link_count,
            turns = self.turns.len(),
            "network built"
        );

        Network {
            node_pos: self.nodes,
            node_is_intersection: self.intersections,
            link_from: self.links.iter().map(|l| l.from).collect(),
            link_to: self.links.iter().map(|l| l.to).collect(),
            link_length: self.links.iter().map(|l| l.length).collect(),
            link_speed: self.links.iter().map(|l| l.speed).collect(),
            link_modes: self.links.into_iter().map(|l| l.modes).collect(),
            turn_from: self.turns.iter().map(|t| t.from).collect(),
            turn_to: self.turns.iter().map(|t| t.to).collect(),
            turn_penalty: self.turns.iter().map(|t| t.penalty).collect(),
            node_out_start,
            out_links,
            node_in_start,
            in_links,
            link_turn_start,
            out_turns,
        }
    }
}
