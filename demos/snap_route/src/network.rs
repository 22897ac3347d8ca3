//! Synthetic street grid used by the demo.
//!
//! `SIDE × SIDE` nodes spaced one block apart (coordinates in km).  The
//! middle row is an arterial open to cars and buses; every other street is
//! cars only.  Nodes where three or more streets meet are intersections
//! with a turn for every movement except the U-turn.  At the centre the
//! left turn from eastbound onto northbound is prohibited.

use tdm_core::{LinkId, ModeSet, NodeId, Point};
use tdm_spatial::{Network, NetworkBuilder, SpatialResult};

pub const SIDE: usize = 5;
pub const BLOCK_KM: f64 = 0.4;

const STREET_KMH:   f64 = 40.0;
const ARTERIAL_KMH: f64 = 60.0;
const TURN_PENALTY: f64 = 1.0;

/// Node id at grid position `(col, row)`.
pub fn node_at(nodes: &[NodeId], col: usize, row: usize) -> NodeId {
    nodes[row * SIDE + col]
}

/// Directed links touching each node, plus link endpoints, kept while
/// building so that turns can be generated afterwards.
#[derive(Default)]
struct Adjacency {
    ends:     Vec<(NodeId, NodeId)>,
    incoming: Vec<Vec<LinkId>>,
    outgoing: Vec<Vec<LinkId>>,
}

impl Adjacency {
    fn new(nodes: usize) -> Self {
        Self {
            ends:     Vec::new(),
            incoming: vec![Vec::new(); nodes],
            outgoing: vec![Vec::new(); nodes],
        }
    }

    fn road(&mut self, b: &mut NetworkBuilder, a: NodeId, z: NodeId, speed: f64, modes: &ModeSet) {
        let (az, za) = b.add_road(a, z, BLOCK_KM, speed, modes.clone());
        for (link, from, to) in [(az, a, z), (za, z, a)] {
            debug_assert_eq!(link.index(), self.ends.len());
            self.ends.push((from, to));
            self.outgoing[from.index()].push(link);
            self.incoming[to.index()].push(link);
        }
    }
}

/// Build the grid.  Returns the network and its nodes in row-major order.
pub fn build_network() -> SpatialResult<(Network, Vec<NodeId>)> {
    let all_modes: ModeSet = "cb".parse()?;
    let cars_only: ModeSet = "c".parse()?;

    let mut b = NetworkBuilder::with_capacity(SIDE * SIDE, 4 * SIDE * (SIDE - 1));
    let nodes: Vec<NodeId> = (0..SIDE * SIDE)
        .map(|i| b.add_node(Point::new((i % SIDE) as f64 * BLOCK_KM, (i / SIDE) as f64 * BLOCK_KM)))
        .collect();

    let arterial_row = SIDE / 2;
    let mut adj = Adjacency::new(nodes.len());
    for row in 0..SIDE {
        for col in 0..SIDE {
            let here = node_at(&nodes, col, row);
            if col + 1 < SIDE {
                let (speed, modes) = if row == arterial_row {
                    (ARTERIAL_KMH, &all_modes)
                } else {
                    (STREET_KMH, &cars_only)
                };
                adj.road(&mut b, here, node_at(&nodes, col + 1, row), speed, modes);
            }
            if row + 1 < SIDE {
                adj.road(&mut b, here, node_at(&nodes, col, row + 1), STREET_KMH, &cars_only);
            }
        }
    }

    let centre = node_at(&nodes, SIDE / 2, SIDE / 2);
    let west_of_centre = node_at(&nodes, SIDE / 2 - 1, SIDE / 2);
    let north_of_centre = node_at(&nodes, SIDE / 2, SIDE / 2 + 1);

    for &node in &nodes {
        if adj.outgoing[node.index()].len() < 3 {
            continue;
        }
        for &l_in in &adj.incoming[node.index()] {
            let (came_from, _) = adj.ends[l_in.index()];
            for &l_out in &adj.outgoing[node.index()] {
                let (_, going_to) = adj.ends[l_out.index()];
                if going_to == came_from {
                    continue;
                }
                if node == centre && came_from == west_of_centre && going_to == north_of_centre {
                    b.prohibit_turn(l_in, l_out)?;
                } else {
                    b.add_turn(l_in, l_out, TURN_PENALTY)?;
                }
            }
        }
    }

    Ok((b.build(), nodes))
}
