//! Turn-restricted, hop-bounded A* path search over links.
//!
//! # Link-based search
//!
//! Frontier entries are *links*, not nodes.  That is what makes turn
//! penalties and prohibitions expressible: the cost of leaving an
//! intersection depends on the link you arrived on.  A link's
//! `pending_cost` is the cost to reach its tail; its own traversal cost is
//! added when it is expanded.
//!
//! At an **intersection** the search only follows the arriving link's
//! recorded, non-prohibited turns.  At any other node it follows every
//! outgoing link except the immediate U-turn, then closes the node like
//! ordinary Dijkstra.
//!
//! Arrival is modelled by one synthetic *destination* entry: links entering
//! the end node are flagged as egress links and, when expanded, relax the
//! destination instead of continuing.  Popping the destination ends the
//! search.
//!
//! # Hop cutoff
//!
//! Every link carries its hop count (`degree`) from the start.  A link
//! popped with `degree > max_degrees` is discarded, so paths longer than
//! `max_degrees + 1` links are never found.
//!
//! # Re-expansion
//!
//! The frontier key is the cost to a link's *tail* plus the estimate at its
//! *head*, which is not a consistent heuristic.  A link may therefore pop
//! before its cheapest tail cost is known.  Popped links stay open: a later
//! cheaper arrival re-queues and re-expands them.  Only outdated frontier
//! entries (cost above the link's current `pending_cost`) are skipped.
//!
//! # Scratch state
//!
//! All per-link/per-node search state lives in side tables owned by the
//! [`Search`] and indexed by id; the [`Network`] is only ever borrowed
//! shared.  Several searches may run over one network at once.
//!
//! # Tie-breaking
//!
//! Entries with equal `pending_cost + estimate` pop in insertion order.
//! Which of several equal-cost paths is returned is otherwise unspecified.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use tracing::{debug, trace};

use tdm_core::{LinkId, Mode, NodeId, Point, SearchConfig, TurnId};

use crate::network::Network;
use crate::{SpatialError, SpatialResult};

/// Per-link cost or speed callback.
pub type LinkFn<'a> = Box<dyn Fn(&Network, LinkId) -> f64 + 'a>;
/// Per-turn cost callback.
pub type TurnFn<'a> = Box<dyn Fn(&Network, TurnId) -> f64 + 'a>;
/// Link acceptance predicate.
pub type LinkFilter<'a> = Box<dyn Fn(&Network, LinkId) -> bool + 'a>;

// ── Route ─────────────────────────────────────────────────────────────────────

/// A found path: links in travel order plus total generalised cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub links: Vec<LinkId>,
    pub cost: f64,
}

// ── Scratch state ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct LinkState {
    pending_cost: f64,
    previous_link: Option<LinkId>,
    degree: u32,
    is_egress: bool,
}

impl LinkState {
    const INIT: Self = Self {
        pending_cost: f64::INFINITY,
        previous_link: None,
        degree: 0,
        is_egress: false,
    };
}

#[derive(Copy, Clone, Debug, Default)]
struct NodeState {
    estimate: Option<f64>,
    is_closed: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Entry {
    Link(LinkId),
    Destination,
}

/// Frontier element.  `BinaryHeap` is a max-heap, so `Ord` is reversed on
/// priority, then on insertion sequence (earlier first).
#[derive(Copy, Clone, Debug)]
struct Candidate {
    priority: f64,
    cost: f64,
    seq: u64,
    entry: Entry,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

#[derive(Default)]
struct Frontier {
    heap: BinaryHeap<Candidate>,
    seq: u64,
}

impl Frontier {
    fn push(&mut self, entry: Entry, cost: f64, estimate: f64) {
        self.heap.push(Candidate { priority: cost + estimate, cost, seq: self.seq, entry });
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop()
    }
}

/// Straight-line lower bound on the remaining cost to `goal`.
#[derive(Copy, Clone)]
struct Heuristic {
    goal: Point,
    /// `coord_to_length_factor / max_observed_speed`, or 0 when no speed is
    /// known (degrades to Dijkstra).
    scale: f64,
}

impl Heuristic {
    #[inline]
    fn estimate(self, p: Point) -> f64 {
        if self.scale > 0.0 { p.distance(self.goal) * self.scale } else { 0.0 }
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

/// Reusable turn-restricted path search over one [`Network`].
///
/// ```
/// use tdm_core::{ModeSet, Point};
/// use tdm_spatial::{NetworkBuilder, Search};
///
/// let mut b = NetworkBuilder::new();
/// let a = b.add_node(Point::new(0.0, 0.0));
/// let c = b.add_node(Point::new(1.0, 0.0));
/// let ac = b.add_link(a, c, 1.0, 10.0, "c".parse::<ModeSet>().unwrap());
/// let net = b.build();
///
/// let mut search = Search::new(&net);
/// assert_eq!(search.calc_path(a, c, None, false).unwrap(), vec![ac]);
/// ```
pub struct Search<'a> {
    network: &'a Network,
    config: SearchConfig,
    link_speed_fn: LinkFn<'a>,
    link_penalty_fn: LinkFn<'a>,
    turn_penalty_fn: TurnFn<'a>,
    link_filter: LinkFilter<'a>,
    max_observed_speed: Option<f64>,
    links: Vec<LinkState>,
    nodes: Vec<NodeState>,
    destination: LinkState,
}

impl<'a> Search<'a> {
    /// Search with default parameters: link speed from
    /// [`Network::link_speed`], no link or turn penalties, all links
    /// accepted.
    pub fn new(network: &'a Network) -> Self {
        Self::build(network, SearchConfig::default())
    }

    /// # Errors
    ///
    /// [`SpatialError::InvalidConfiguration`] if `config` fails
    /// [`SearchConfig::validate`].
    pub fn with_config(network: &'a Network, config: SearchConfig) -> SpatialResult<Self> {
        config.validate().map_err(|e| SpatialError::InvalidConfiguration(e.to_string()))?;
        Ok(Self::build(network, config))
    }

    fn build(network: &'a Network, config: SearchConfig) -> Self {
        Self {
            network,
            config,
            link_speed_fn: Box::new(|net: &Network, l: LinkId| net.link_speed[l.index()]),
            link_penalty_fn: Box::new(|_: &Network, _: LinkId| 0.0),
            turn_penalty_fn: Box::new(|_: &Network, _: TurnId| 0.0),
            link_filter: Box::new(|_: &Network, _: LinkId| true),
            max_observed_speed: None,
            links: vec![LinkState::INIT; network.link_count()],
            nodes: vec![NodeState::default(); network.node_count()],
            destination: LinkState::INIT,
        }
    }

    pub fn with_link_speed_fn(mut self, f: impl Fn(&Network, LinkId) -> f64 + 'a) -> Self {
        self.link_speed_fn = Box::new(f);
        self.max_observed_speed = None;
        self
    }

    pub fn with_link_penalty_fn(mut self, f: impl Fn(&Network, LinkId) -> f64 + 'a) -> Self {
        self.link_penalty_fn = Box::new(f);
        self
    }

    pub fn with_turn_penalty_fn(mut self, f: impl Fn(&Network, TurnId) -> f64 + 'a) -> Self {
        self.turn_penalty_fn = Box::new(f);
        self
    }

    // ── Properties ────────────────────────────────────────────────────────

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn max_degrees(&self) -> u32 {
        self.config.max_degrees
    }

    pub fn set_max_degrees(&mut self, max_degrees: u32) {
        self.config.max_degrees = max_degrees;
    }

    pub fn coord_to_length_factor(&self) -> f64 {
        self.config.coord_to_length_factor
    }

    /// # Errors
    ///
    /// [`SpatialError::InvalidConfiguration`] unless `factor` is finite and
    /// positive.  The previous value is kept.
    pub fn set_coord_to_length_factor(&mut self, factor: f64) -> SpatialResult<()> {
        let config = SearchConfig { coord_to_length_factor: factor, ..self.config.clone() };
        config.validate().map_err(|e| SpatialError::InvalidConfiguration(e.to_string()))?;
        self.config = config;
        Ok(())
    }

    pub fn speed_unit_factor(&self) -> f64 {
        self.config.speed_unit_factor
    }

    /// Replace the link acceptance predicate.
    pub fn set_link_filter(&mut self, f: impl Fn(&Network, LinkId) -> bool + 'a) {
        self.link_filter = Box::new(f);
    }

    /// Maximum effective speed found by the last search, if any.
    pub fn max_observed_speed(&self) -> Option<f64> {
        self.max_observed_speed
    }

    // ── Costs ─────────────────────────────────────────────────────────────

    /// `length / (speed * speed_unit_factor) + penalty`; infinite when the
    /// effective speed is not positive.
    pub fn link_cost(&self, link: LinkId) -> f64 {
        let speed = self.effective_speed(link);
        if !(speed > 0.0) {
            return f64::INFINITY;
        }
        self.network.link_length[link.index()] / speed + (self.link_penalty_fn)(self.network, link)
    }

    pub fn turn_cost(&self, turn: TurnId) -> f64 {
        (self.turn_penalty_fn)(self.network, turn)
    }

    #[inline]
    fn effective_speed(&self, link: LinkId) -> f64 {
        (self.link_speed_fn)(self.network, link) * self.config.speed_unit_factor
    }

    #[inline]
    fn accepts(&self, link: LinkId) -> bool {
        (self.link_filter)(self.network, link)
    }

    fn compute_max_speed(&self) -> f64 {
        (0..self.network.link_count())
            .map(|i| LinkId(i as u32))
            .filter(|&l| self.accepts(l))
            .map(|l| self.effective_speed(l))
            .filter(|s| s.is_finite())
            .fold(0.0, f64::max)
    }

    // ── Entry points ──────────────────────────────────────────────────────

    /// Least-cost link sequence from `start` to `end`.
    ///
    /// An empty vector means no path exists within `max_degrees` hops (or
    /// `start == end`).  `mode`, when given, replaces the link filter with
    /// "link permits `mode`" for this and later calls.  Pass
    /// `reuse_cached_max_speed = true` only if neither the filter nor the
    /// speed function changed since the previous call.
    ///
    /// # Errors
    ///
    /// - [`SpatialError::NodeNotFound`] if either node is not in the network.
    /// - [`SpatialError::NegativeCost`] / [`SpatialError::NegativeTurnCost`]
    ///   if a cost callback yields a negative value.
    pub fn calc_path(
        &mut self,
        start: NodeId,
        end: NodeId,
        mode: Option<Mode>,
        reuse_cached_max_speed: bool,
    ) -> SpatialResult<Vec<LinkId>> {
        Ok(self
            .calc_route(start, end, mode, reuse_cached_max_speed)?
            .map(|r| r.links)
            .unwrap_or_default())
    }

    /// As [`calc_path`](Self::calc_path), also reporting the path cost.
    /// `None` means no path.
    pub fn calc_route(
        &mut self,
        start: NodeId,
        end: NodeId,
        mode: Option<Mode>,
        reuse_cached_max_speed: bool,
    ) -> SpatialResult<Option<Route>> {
        let net = self.network;
        for node in [start, end] {
            if !net.contains_node(node) {
                return Err(SpatialError::NodeNotFound(node));
            }
        }

        self.reset();
        if let Some(mode) = mode {
            self.link_filter = Box::new(move |net: &Network, l: LinkId| net.link_permits(l, mode));
        }
        if start == end {
            return Ok(None);
        }

        let max_speed = match self.max_observed_speed {
            Some(s) if reuse_cached_max_speed => s,
            _ => {
                let s = self.compute_max_speed();
                self.max_observed_speed = Some(s);
                s
            }
        };
        let heuristic = Heuristic {
            goal: net.node_pos[end.index()],
            scale: if max_speed > 0.0 { self.config.coord_to_length_factor / max_speed } else { 0.0 },
        };

        debug!(%start, %end, max_speed, max_degrees = self.config.max_degrees, "path search started");

        let mut frontier = Frontier::default();

        self.nodes[start.index()].is_closed = true;
        let mut seeded = false;
        for &link in net.out_links(start) {
            if !self.accepts(link) {
                continue;
            }
            let state = &mut self.links[link.index()];
            state.degree = 0;
            state.pending_cost = 0.0;
            let estimate = self.estimate(net.link_to[link.index()], heuristic);
            frontier.push(Entry::Link(link), 0.0, estimate);
            seeded = true;
        }
        if !seeded {
            debug!(%start, "no traversable link leaves the start node");
            return Ok(None);
        }

        let mut has_egress = false;
        for &link in net.in_links(end) {
            if self.accepts(link) {
                self.links[link.index()].is_egress = true;
                has_egress = true;
            }
        }
        self.nodes[end.index()].estimate = Some(0.0);
        if !has_egress {
            debug!(%end, "no traversable link enters the end node");
            return Ok(None);
        }

        let mut pops = 0usize;
        while let Some(cand) = frontier.pop() {
            pops += 1;
            let link = match cand.entry {
                Entry::Destination => {
                    if cand.cost > self.destination.pending_cost {
                        continue;
                    }
                    let route = self.reconstruct();
                    debug!(pops, links = route.links.len(), cost = route.cost, "path found");
                    return Ok(Some(route));
                }
                Entry::Link(link) => link,
            };

            let state = self.links[link.index()];
            if cand.cost > state.pending_cost {
                continue; // stale
            }

            if state.degree > self.config.max_degrees {
                trace!(%link, degree = state.degree, "hop limit reached, link discarded");
                continue;
            }

            let link_cost = self.link_cost(link);
            if link_cost < 0.0 {
                return Err(SpatialError::NegativeCost { link, cost: link_cost });
            }
            let base = state.pending_cost + link_cost;
            let head = net.link_to[link.index()];

            if state.is_egress {
                if base < self.destination.pending_cost {
                    self.destination.pending_cost = base;
                    self.destination.previous_link = Some(link);
                    self.destination.degree = state.degree + 1;
                    frontier.push(Entry::Destination, base, 0.0);
                }
            } else if net.is_intersection(head) {
                for &turn in net.out_turns(link) {
                    if net.is_turn_prohibited(turn) {
                        continue;
                    }
                    let next = net.turn_to[turn.index()];
                    if !self.accepts(next) {
                        continue;
                    }
                    let turn_cost = self.turn_cost(turn);
                    if turn_cost < 0.0 {
                        return Err(SpatialError::NegativeTurnCost { turn, cost: turn_cost });
                    }
                    self.relax(&mut frontier, heuristic, link, next, base + turn_cost);
                }
            } else {
                let tail = net.link_from[link.index()];
                for &next in net.out_links(head) {
                    let next_head = net.link_to[next.index()];
                    if self.nodes[next_head.index()].is_closed || next_head == tail || !self.accepts(next) {
                        continue;
                    }
                    self.relax(&mut frontier, heuristic, link, next, base);
                }
                self.nodes[head.index()].is_closed = true;
            }
        }

        debug!(pops, %start, %end, "no path within hop limit");
        Ok(None)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn reset(&mut self) {
        self.links.fill(LinkState::INIT);
        self.nodes.fill(NodeState::default());
        self.destination = LinkState::INIT;
    }

    /// Cached heuristic for `node`, computed on first use.
    fn estimate(&mut self, node: NodeId, heuristic: Heuristic) -> f64 {
        let net = self.network;
        *self.nodes[node.index()]
            .estimate
            .get_or_insert_with(|| heuristic.estimate(net.node_pos[node.index()]))
    }

    fn relax(&mut self, frontier: &mut Frontier, heuristic: Heuristic, from: LinkId, to: LinkId, cost: f64) {
        let degree = self.links[from.index()].degree + 1;
        let state = &mut self.links[to.index()];
        if !(cost < state.pending_cost) {
            return;
        }
        state.pending_cost = cost;
        state.previous_link = Some(from);
        state.degree = degree;
        let estimate = self.estimate(self.network.link_to[to.index()], heuristic);
        frontier.push(Entry::Link(to), cost, estimate);
    }

    fn reconstruct(&self) -> Route {
        let mut links = Vec::with_capacity(self.destination.degree as usize);
        let mut cur = self.destination.previous_link;
        while let Some(link) = cur {
            links.push(link);
            cur = self.links[link.index()].previous_link;
        }
        links.reverse();
        Route { links, cost: self.destination.pending_cost }
    }
}

impl fmt::Debug for Search<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("config", &self.config)
            .field("max_observed_speed", &self.max_observed_speed)
            .field("links", &self.links.len())
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}
