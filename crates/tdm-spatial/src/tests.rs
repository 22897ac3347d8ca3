//! Unit tests for tdm-spatial.
//!
//! All tests use hand-crafted grids and networks.

#[cfg(test)]
mod helpers {
    use tdm_core::{LinkId, ModeSet, NodeId, Point};

    use crate::{GridIndex, Network, NetworkBuilder, Rectangle};

    pub fn modes(s: &str) -> ModeSet {
        s.parse().unwrap()
    }

    /// 10 × 10 grid of unit cells over `[0, 10] × [0, 10]`.
    pub fn unit_grid() -> GridIndex<u32> {
        GridIndex::new(Rectangle::new(0.0, 0.0, 10.0, 10.0), 10, 10, 0.0).unwrap()
    }

    /// Every handle in a cell is booked to that cell and vice versa.
    pub fn assert_consistent(grid: &GridIndex<u32>, objects: &[u32]) {
        let (cols, rows) = grid.dimensions();
        for row in 0..rows {
            for col in 0..cols {
                let cell = crate::Cell::new(col, row);
                for obj in grid.cell_contents(cell) {
                    let booked = grid.cells_of(obj).expect("object in a cell must be booked");
                    assert!(booked.contains(&cell), "{obj} in {cell:?} but not booked there");
                }
            }
        }
        for &obj in objects {
            if let Some(cells) = grid.cells_of(obj) {
                for &cell in cells {
                    assert!(grid.cell_contents(cell).any(|o| o == obj), "{obj} booked to {cell:?} but missing");
                }
            }
        }
    }

    /// Directed diamond, speed 1 everywhere.
    ///
    /// ```text
    ///         A(1,1)
    ///       ↗       ↘
    ///  S(0,0)          E(3,0)
    ///       ↘         ↗
    ///   B(1,-1) → M(2,-1)
    /// ```
    ///
    /// Upper S→A→E: 2.5 + 2.5 = 5.0.  Lower S→B→M→E: 1.5 + 1.0 + 1.5 = 4.0.
    pub struct Diamond {
        pub net: Network,
        pub s: NodeId,
        pub e: NodeId,
        pub upper: [LinkId; 2],
        pub lower: [LinkId; 3],
    }

    pub fn diamond() -> Diamond {
        let mut b = NetworkBuilder::new();
        let s = b.add_node(Point::new(0.0, 0.0));
        let a = b.add_node(Point::new(1.0, 1.0));
        let e = b.add_node(Point::new(3.0, 0.0));
        let bb = b.add_node(Point::new(1.0, -1.0));
        let m = b.add_node(Point::new(2.0, -1.0));
        let sa = b.add_link(s, a, 2.5, 1.0, modes("c"));
        let ae = b.add_link(a, e, 2.5, 1.0, modes("c"));
        let sb = b.add_link(s, bb, 1.5, 1.0, modes("cb"));
        let bm = b.add_link(bb, m, 1.0, 1.0, modes("c"));
        let me = b.add_link(m, e, 1.5, 1.0, modes("cb"));
        Diamond { net: b.build(), s, e, upper: [sa, ae], lower: [sb, bm, me] }
    }

    /// One intersection X with a straight movement and a detour.
    ///
    /// ```text
    ///            R(1,1)
    ///          ↗       ↘ l3 (1.5)
    ///      l2 (1)        ↘
    ///  P(0,0) → X(1,0) → Q(2,0)
    ///       l0 (1)   l1 (1)
    /// ```
    ///
    /// X is an intersection with turns l0→l1 and l0→l2.
    pub struct Junction {
        pub net: Network,
        pub p: NodeId,
        pub q: NodeId,
        pub r: NodeId,
        pub links: [LinkId; 4],
    }

    pub fn junction(straight_penalty: f64) -> Junction {
        let mut b = NetworkBuilder::new();
        let p = b.add_node(Point::new(0.0, 0.0));
        let x = b.add_node(Point::new(1.0, 0.0));
        let q = b.add_node(Point::new(2.0, 0.0));
        let r = b.add_node(Point::new(1.0, 1.0));
        let l0 = b.add_link(p, x, 1.0, 1.0, modes("c"));
        let l1 = b.add_link(x, q, 1.0, 1.0, modes("c"));
        let l2 = b.add_link(x, r, 1.0, 1.0, modes("c"));
        let l3 = b.add_link(r, q, 1.5, 1.0, modes("c"));
        b.add_turn(l0, l1, straight_penalty).unwrap();
        b.add_turn(l0, l2, 1.0).unwrap();
        Junction { net: b.build(), p, q, r, links: [l0, l1, l2, l3] }
    }

    /// Straight chain N0 → N1 → … of `n` links, each of length 1.
    pub fn chain(n: usize) -> (Network, Vec<NodeId>, Vec<LinkId>) {
        let mut b = NetworkBuilder::new();
        let nodes: Vec<NodeId> = (0..=n).map(|i| b.add_node(Point::new(i as f64, 0.0))).collect();
        let links = nodes.windows(2).map(|w| b.add_link(w[0], w[1], 1.0, 1.0, modes("c"))).collect();
        (b.build(), nodes, links)
    }
}

// ── Range primitives ──────────────────────────────────────────────────────────

#[cfg(test)]
mod range {
    use tdm_core::Point;

    use crate::{Range, Rectangle};

    #[test]
    fn half_open_containment() {
        let r = Range::new(0.0, 10.0);
        assert!(r.contains(0.0));
        assert!(!r.contains(10.0));
        assert!(r.contains_inclusive(10.0));
        assert_eq!(Range::new(5.0, 1.0), Range { min: 1.0, max: 5.0 });
    }

    #[test]
    fn overlap_is_half_open() {
        let a = Range::new(0.0, 5.0);
        assert!(a.overlaps(Range::new(4.0, 8.0)));
        assert!(!a.overlaps(Range::new(5.0, 8.0)));
        assert!(a.contains_range(Range::new(1.0, 5.0)));
    }

    #[test]
    fn rectangle_from_points() {
        let pts = [Point::new(1.0, 5.0), Point::new(-2.0, 3.0), Point::new(4.0, -1.0)];
        let r = Rectangle::from_points(pts).unwrap();
        assert_eq!(r, Rectangle::new(-2.0, -1.0, 4.0, 5.0));
        assert_eq!(r.width(), 6.0);
        assert!(Rectangle::from_points(std::iter::empty::<Point>()).is_none());
    }

    #[test]
    fn rectangle_expand_and_contain() {
        let r = Rectangle::new(0.0, 0.0, 2.0, 2.0).expanded(1.0);
        assert_eq!(r, Rectangle::new(-1.0, -1.0, 3.0, 3.0));
        assert!(r.contains_point(Point::new(-1.0, 2.5)));
        assert!(r.contains_rect(Rectangle::new(0.0, 0.0, 2.0, 2.0)));
        assert!(r.overlaps(Rectangle::new(2.5, 2.5, 9.0, 9.0)));
    }
}

// ── Grid construction ─────────────────────────────────────────────────────────

#[cfg(test)]
mod grid_construction {
    use tdm_core::GridConfig;

    use crate::{GridIndex, Rectangle, SpatialError};

    #[test]
    fn zero_cells_rejected() {
        let r = GridIndex::<u32>::new(Rectangle::new(0.0, 0.0, 1.0, 1.0), 0, 10, 0.0);
        assert!(matches!(r, Err(SpatialError::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_area_extent_rejected_unless_margin() {
        let flat = Rectangle::new(0.0, 5.0, 10.0, 5.0);
        assert!(GridIndex::<u32>::new(flat, 10, 10, 0.0).is_err());
        assert!(GridIndex::<u32>::new(flat, 10, 10, 0.5).is_ok());
    }

    #[test]
    fn margin_expands_before_cell_size() {
        let g = GridIndex::<u32>::new(Rectangle::new(0.0, 0.0, 10.0, 10.0), 12, 6, 1.0).unwrap();
        assert_eq!(g.extent(), Rectangle::new(-1.0, -1.0, 11.0, 11.0));
        assert_eq!(g.cell_size(), (1.0, 2.0));
        assert_eq!(g.dimensions(), (12, 6));
    }

    #[test]
    fn cell_count_overflow_rejected() {
        let r = GridIndex::<u32>::new(Rectangle::new(0.0, 0.0, 1.0, 1.0), usize::MAX, 2, 0.0);
        assert!(matches!(r, Err(SpatialError::InvalidConfiguration(_))));
    }

    #[test]
    fn from_config_uses_defaults() {
        let g = GridIndex::<u32>::from_config(Rectangle::new(0.0, 0.0, 100.0, 50.0), &GridConfig::default()).unwrap();
        assert_eq!(g.dimensions(), (100, 100));
        assert_eq!(g.cell_size(), (1.0, 0.5));
        assert!(g.is_empty());
    }
}

// ── Grid insertion & rasterisation ────────────────────────────────────────────

#[cfg(test)]
mod grid_insert {
    use rustc_hash::FxHashSet;
    use tdm_core::Point;

    use super::helpers::{assert_consistent, unit_grid};
    use crate::{Cell, SpatialError};

    fn cells(list: &[(usize, usize)]) -> FxHashSet<Cell> {
        list.iter().map(|&(c, r)| Cell::new(c, r)).collect()
    }

    #[test]
    fn point_lands_in_its_cell() {
        let mut g = unit_grid();
        g.insert_point(1, 3.5, 7.2).unwrap();
        assert_eq!(g.cells_of(1), Some(&cells(&[(3, 7)])));
        assert_eq!(g.cell_at(3.5, 7.2), Some(Cell::new(3, 7)));
    }

    #[test]
    fn point_on_far_edge_uses_last_cell() {
        let mut g = unit_grid();
        g.insert_point(1, 10.0, 10.0).unwrap();
        assert_eq!(g.cells_of(1), Some(&cells(&[(9, 9)])));
    }

    #[test]
    fn point_outside_fails_and_leaves_grid_untouched() {
        let mut g = unit_grid();
        let r = g.insert_point(1, 10.5, 3.0);
        assert!(matches!(r, Err(SpatialError::OutOfBounds { .. })));
        assert!(g.is_empty());
    }

    #[test]
    fn vertical_segment() {
        let mut g = unit_grid();
        g.insert_polyline(1, &[Point::new(2.5, 1.5), Point::new(2.5, 7.5)]).unwrap();
        let expected: FxHashSet<Cell> = (1..=7).map(|r| Cell::new(2, r)).collect();
        assert_eq!(g.cells_of(1), Some(&expected));
    }

    #[test]
    fn horizontal_segment() {
        let mut g = unit_grid();
        g.insert_polyline(1, &[Point::new(6.5, 3.5), Point::new(1.5, 3.5)]).unwrap();
        let expected: FxHashSet<Cell> = (1..=6).map(|c| Cell::new(c, 3)).collect();
        assert_eq!(g.cells_of(1), Some(&expected));
    }

    #[test]
    fn diagonal_segment_covers_every_crossed_cell() {
        let mut g = unit_grid();
        g.insert_polyline(1, &[Point::new(0.5, 0.5), Point::new(9.5, 9.5)]).unwrap();
        let booked = g.cells_of(1).unwrap();
        for i in 0..10 {
            assert!(booked.contains(&Cell::new(i, i)), "diagonal cell {i} missing");
        }
        assert!(!booked.contains(&Cell::new(0, 9)));
        assert!(!booked.contains(&Cell::new(9, 0)));
    }

    #[test]
    fn shallow_segment_rows_per_column() {
        // y = 1 + 0.25 * (x - 0.5)
        let mut g = unit_grid();
        g.insert_polyline(1, &[Point::new(0.5, 1.0), Point::new(8.5, 3.0)]).unwrap();
        let booked = g.cells_of(1).unwrap();
        assert!(booked.contains(&Cell::new(0, 1)));
        assert!(booked.contains(&Cell::new(8, 3)));
        assert!(booked.iter().all(|c| (1..=3).contains(&c.row)));
        assert!(booked.iter().all(|c| c.col <= 8));
    }

    #[test]
    fn polyline_with_vertex_outside_fails() {
        let mut g = unit_grid();
        let r = g.insert_polyline(1, &[Point::new(1.0, 1.0), Point::new(11.0, 1.0)]);
        assert!(matches!(r, Err(SpatialError::OutOfBounds { x, .. }) if x == 11.0));
        assert!(g.cells_of(1).is_none());
    }

    #[test]
    fn empty_polyline_rejected() {
        let mut g = unit_grid();
        assert!(matches!(g.insert_polyline(1, &[]), Err(SpatialError::EmptyGeometry(_))));
    }

    #[test]
    fn box_is_clamped() {
        let mut g = unit_grid();
        g.insert_box(1, 8.5, 8.5, 20.0, 20.0).unwrap();
        assert_eq!(g.cells_of(1), Some(&cells(&[(8, 8), (9, 8), (8, 9), (9, 9)])));
    }

    #[test]
    fn box_fully_outside_fails() {
        let mut g = unit_grid();
        assert!(matches!(g.insert_box(1, 20.0, 20.0, 30.0, 30.0), Err(SpatialError::OutOfBounds { .. })));
    }

    #[test]
    fn circle_rows_follow_the_disc() {
        let mut g = unit_grid();
        g.insert_circle(1, 5.0, 5.0, 2.0).unwrap();
        let booked = g.cells_of(1).unwrap();
        // Centre columns span the full diameter.
        assert!(booked.contains(&Cell::new(4, 3)));
        assert!(booked.contains(&Cell::new(5, 6)));
        // Outer columns are narrower: x in [3, 4] reaches only |dy| <= sqrt(3).
        assert!(booked.contains(&Cell::new(3, 3)));
        assert!(!booked.contains(&Cell::new(3, 2)));
        assert!(!booked.contains(&Cell::new(2, 5)));
        assert!(!booked.contains(&Cell::new(0, 0)));
    }

    #[test]
    fn reinsert_moves_object() {
        let mut g = unit_grid();
        g.insert_point(1, 1.5, 1.5).unwrap();
        g.insert_point(1, 8.5, 8.5).unwrap();
        assert_eq!(g.len(), 1);
        assert!(g.query_point(1.5, 1.5).is_empty());
        assert_eq!(g.cells_of(1), Some(&cells(&[(8, 8)])));
        assert_consistent(&g, &[1]);
    }

    #[test]
    fn mixed_inserts_stay_consistent() {
        let mut g = unit_grid();
        g.insert_point(1, 0.5, 0.5).unwrap();
        g.insert_polyline(2, &[Point::new(0.5, 0.5), Point::new(4.0, 9.0), Point::new(9.0, 2.0)]).unwrap();
        g.insert_box(3, 2.0, 2.0, 6.0, 3.0).unwrap();
        g.insert_circle(4, 7.0, 7.0, 1.5).unwrap();
        g.remove(3).unwrap();
        assert_consistent(&g, &[1, 2, 3, 4]);
    }
}

// ── Grid queries ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod grid_query {
    use tdm_core::Point;

    use super::helpers::unit_grid;
    use crate::{Rectangle, SpatialError};

    #[test]
    fn crossing_polylines_find_each_other() {
        let mut g = unit_grid();
        g.insert_polyline(1, &[Point::new(0.5, 0.5), Point::new(9.5, 9.5)]).unwrap();
        let hits = g.query_polyline(&[Point::new(0.5, 9.5), Point::new(9.5, 0.5)]);
        assert!(hits.contains(&1));
    }

    #[test]
    fn box_and_rectangle_agree() {
        let mut g = unit_grid();
        g.insert_point(1, 2.5, 2.5).unwrap();
        g.insert_point(2, 7.5, 7.5).unwrap();
        let a = g.query_box(2.0, 2.0, 3.0, 3.0);
        let b = g.query_rectangle(Rectangle::new(2.0, 2.0, 3.0, 3.0));
        assert_eq!(a, b);
        assert!(a.contains(&1));
        assert!(!a.contains(&2));
    }

    #[test]
    fn circle_query() {
        let mut g = unit_grid();
        g.insert_point(1, 1.0, 1.0).unwrap();
        g.insert_point(2, 8.0, 8.0).unwrap();
        let hits = g.query_circle(1.2, 1.2, 0.5);
        assert!(hits.contains(&1));
        assert!(!hits.contains(&2));
    }

    #[test]
    fn queries_outside_extent_degrade() {
        let mut g = unit_grid();
        g.insert_point(1, 0.5, 0.5).unwrap();
        // Point queries clamp to the nearest edge cell.
        assert!(g.query_point(-50.0, -50.0).contains(&1));
        // A polyline running outside still sees the edge cells it clamps to.
        assert!(g.query_polyline(&[Point::new(-5.0, 0.5), Point::new(-1.0, 0.5)]).contains(&1));
        // Boxes and circles that miss the extent entirely see nothing.
        assert!(g.query_box(20.0, 20.0, 30.0, 30.0).is_empty());
        assert!(g.query_circle(-10.0, -10.0, 1.0).is_empty());
    }

    #[test]
    fn remove_keeps_colocated_objects() {
        let mut g = unit_grid();
        g.insert_point(1, 4.2, 4.2).unwrap();
        g.insert_point(2, 4.7, 4.7).unwrap();
        g.remove(1).unwrap();
        let hits = g.query_point(4.5, 4.5);
        assert!(!hits.contains(&1));
        assert!(hits.contains(&2));
        assert!(!g.contains(1));
        assert!(matches!(g.remove(1), Err(SpatialError::ObjectNotFound)));
    }

    #[test]
    fn nearest_on_empty_grid_is_empty() {
        let g = unit_grid();
        assert!(g.nearest_to_point(5.0, 5.0).is_empty());
    }

    #[test]
    fn nearest_prefers_containing_cell() {
        let mut g = unit_grid();
        g.insert_point(1, 5.5, 5.5).unwrap();
        g.insert_point(2, 6.5, 5.5).unwrap();
        let hits = g.nearest_to_point(5.1, 5.9);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&1));
    }

    #[test]
    fn nearest_expands_rings_until_hit() {
        let mut g = unit_grid();
        g.insert_point(1, 3.5, 0.5).unwrap(); // ring 3 from (0, 0)
        g.insert_point(2, 0.5, 5.5).unwrap(); // ring 5
        let hits = g.nearest_to_point(0.5, 0.5);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&1));
    }

    #[test]
    fn nearest_reaches_far_corner() {
        let mut g = unit_grid();
        g.insert_point(7, 9.9, 9.9).unwrap();
        assert!(g.nearest_to_point(0.0, 0.0).contains(&7));
        assert!(g.nearest_to_point(-100.0, 0.0).contains(&7));
    }

    #[test]
    fn clear_empties_everything() {
        let mut g = unit_grid();
        g.insert_box(1, 0.0, 0.0, 10.0, 10.0).unwrap();
        g.clear();
        assert!(g.is_empty());
        assert!(g.query_box(0.0, 0.0, 10.0, 10.0).is_empty());
    }
}

// ── Grid properties ───────────────────────────────────────────────────────────

#[cfg(test)]
mod grid_props {
    use proptest::prelude::*;
    use tdm_core::Point;

    use crate::{GridIndex, Rectangle};

    fn grid() -> GridIndex<usize> {
        GridIndex::new(Rectangle::new(0.0, 0.0, 100.0, 100.0), 17, 13, 0.0).unwrap()
    }

    fn coords() -> impl Strategy<Value = (f64, f64)> {
        (0.0f64..=100.0, 0.0f64..=100.0)
    }

    proptest! {
        #[test]
        fn point_queries_are_conservative(pts in prop::collection::vec(coords(), 1..40)) {
            let mut g = grid();
            for (i, &(x, y)) in pts.iter().enumerate() {
                g.insert_point(i, x, y).unwrap();
            }
            for (i, &(x, y)) in pts.iter().enumerate() {
                prop_assert!(g.query_point(x, y).contains(&i));
                prop_assert!(g.query_circle(x, y, 0.0).contains(&i));
                prop_assert!(g.query_box(x - 1.0, y - 1.0, x + 1.0, y + 1.0).contains(&i));
                prop_assert!(!g.nearest_to_point(x, y).is_empty());
            }
        }

        #[test]
        fn polyline_vertices_are_booked(pts in prop::collection::vec(coords(), 1..8)) {
            let line: Vec<Point> = pts.iter().map(|&(x, y)| Point::new(x, y)).collect();
            let mut g = grid();
            g.insert_polyline(0, &line).unwrap();
            let booked = g.cells_of(0).unwrap().clone();
            for p in &line {
                prop_assert!(booked.contains(&g.cell_at(p.x, p.y).unwrap()));
                prop_assert!(g.query_point(p.x, p.y).contains(&0));
            }
            prop_assert!(g.query_polyline(&line).contains(&0));
        }

        #[test]
        fn removal_clears_only_removed(pts in prop::collection::vec(coords(), 2..40)) {
            let mut g = grid();
            for (i, &(x, y)) in pts.iter().enumerate() {
                g.insert_point(i, x, y).unwrap();
            }
            for i in (0..pts.len()).step_by(2) {
                g.remove(i).unwrap();
            }
            let all = g.query_box(0.0, 0.0, 100.0, 100.0);
            for i in 0..pts.len() {
                prop_assert_eq!(all.contains(&i), i % 2 == 1);
            }
            prop_assert_eq!(g.len(), pts.len() / 2);
        }

        #[test]
        fn nearest_non_empty_iff_grid_non_empty(
            obj in coords(),
            probe in (-50.0f64..150.0, -50.0f64..150.0),
        ) {
            let mut g = grid();
            prop_assert!(g.nearest_to_point(probe.0, probe.1).is_empty());
            g.insert_point(0, obj.0, obj.1).unwrap();
            prop_assert!(g.nearest_to_point(probe.0, probe.1).contains(&0));
        }
    }
}

// ── Network & builder ─────────────────────────────────────────────────────────

#[cfg(test)]
mod network {
    use tdm_core::{GridConfig, Mode, Point};

    use super::helpers::{diamond, junction, modes};
    use crate::{NetworkBuilder, SpatialError};

    #[test]
    fn empty_build() {
        let net = NetworkBuilder::new().build();
        assert_eq!(net.node_count(), 0);
        assert_eq!(net.link_count(), 0);
        assert!(net.is_empty());
        assert!(net.extent().is_none());
    }

    #[test]
    fn csr_adjacency() {
        let d = diamond();
        let out: Vec<_> = d.net.out_links(d.s).to_vec();
        assert_eq!(out, vec![d.upper[0], d.lower[0]]);
        let into: Vec<_> = d.net.in_links(d.e).to_vec();
        assert_eq!(into, vec![d.upper[1], d.lower[2]]);
        assert!(d.net.in_links(d.s).is_empty());
    }

    #[test]
    fn ids_follow_insertion_order() {
        let d = diamond();
        for (i, l) in [d.upper[0], d.upper[1], d.lower[0], d.lower[1], d.lower[2]].iter().enumerate() {
            assert_eq!(l.index(), i);
        }
    }

    #[test]
    fn reverse_link_lookup() {
        let mut b = NetworkBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        let (ac, ca) = b.add_road(a, c, 1.0, 1.0, modes("c"));
        let net = b.build();
        assert_eq!(net.reverse_link(ac), Some(ca));
        assert_eq!(net.reverse_link(ca), Some(ac));
        assert_eq!(diamond().net.reverse_link(diamond().upper[0]), None);
    }

    #[test]
    fn turns_mark_intersections() {
        let j = junction(1.0);
        let [l0, l1, l2, l3] = j.links;
        let x = j.net.link_to[l0.index()];
        assert!(j.net.is_intersection(x));
        assert!(!j.net.is_intersection(j.p));
        assert_eq!(j.net.out_turns(l0).len(), 2);
        assert!(j.net.turn(l0, l1).is_some());
        assert!(j.net.turn(l0, l3).is_none());
        assert!(j.net.out_turns(l2).is_empty());
    }

    #[test]
    fn prohibited_turn_flagged() {
        let j = junction(crate::PROHIBITED);
        let [l0, l1, l2, _] = j.links;
        assert!(j.net.is_turn_prohibited(j.net.turn(l0, l1).unwrap()));
        assert!(!j.net.is_turn_prohibited(j.net.turn(l0, l2).unwrap()));
    }

    #[test]
    fn non_adjacent_turn_rejected() {
        let mut b = NetworkBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        let d = b.add_node(Point::new(2.0, 0.0));
        let ac = b.add_link(a, c, 1.0, 1.0, modes("c"));
        let ad = b.add_link(a, d, 1.0, 1.0, modes("c"));
        assert!(matches!(b.add_turn(ac, ad, 1.0), Err(SpatialError::InvalidTurn { .. })));
    }

    #[test]
    fn link_modes() {
        let d = diamond();
        let bus = Mode::new('b').unwrap();
        assert!(d.net.link_permits(d.lower[0], bus));
        assert!(!d.net.link_permits(d.upper[0], bus));
    }

    #[test]
    fn snap_exact_and_nearest() {
        let d = diamond();
        let grid = d.net.node_grid(&GridConfig { x_cells: 6, y_cells: 4, margin: 0.1 }).unwrap();
        assert_eq!(grid.len(), d.net.node_count());
        assert_eq!(d.net.snap_to_node(&grid, Point::new(0.0, 0.0)), Some(d.s));
        assert_eq!(d.net.snap_to_node(&grid, Point::new(2.9, 0.2)), Some(d.e));
        assert_eq!(d.net.snap_to_node(&grid, Point::new(40.0, 0.0)), Some(d.e));
    }

    #[test]
    fn snap_refines_ring_candidate() {
        // Chebyshev ring 3 holds A, but B in ring 4 is closer in euclidean terms.
        let mut b = NetworkBuilder::new();
        let a = b.add_node(Point::new(3.9, 3.9));
        let near = b.add_node(Point::new(4.1, 0.5));
        b.add_node(Point::new(0.0, 10.0));
        b.add_node(Point::new(10.0, 0.0));
        let net = b.build();
        let grid = net.node_grid(&GridConfig { x_cells: 10, y_cells: 10, margin: 0.0 }).unwrap();

        let ring = grid.nearest_to_point(0.5, 0.5);
        assert!(ring.contains(&a));
        assert!(!ring.contains(&near));
        assert_eq!(net.snap_to_node(&grid, Point::new(0.5, 0.5)), Some(near));
    }

    #[test]
    fn node_grid_on_empty_network_fails() {
        let net = NetworkBuilder::new().build();
        assert!(net.node_grid(&GridConfig::default()).is_err());
    }
}

// ── Turn-restricted search ────────────────────────────────────────────────────

#[cfg(test)]
mod search {
    use tdm_core::{Mode, NodeId, Point, SearchConfig};

    use super::helpers::{chain, diamond, junction, modes};
    use crate::{NetworkBuilder, PROHIBITED, Search, SpatialError};

    #[test]
    fn diamond_takes_cheaper_branch() {
        let d = diamond();
        let mut search = Search::new(&d.net);
        let route = search.calc_route(d.s, d.e, None, false).unwrap().unwrap();
        assert_eq!(route.links, d.lower.to_vec());
        assert_eq!(route.cost, 4.0);
    }

    #[test]
    fn link_penalty_flips_branch() {
        let d = diamond();
        let penalised = d.lower[1];
        let mut search = Search::new(&d.net).with_link_penalty_fn(move |_, l| if l == penalised { 10.0 } else { 0.0 });
        let route = search.calc_route(d.s, d.e, None, false).unwrap().unwrap();
        assert_eq!(route.links, d.upper.to_vec());
        assert_eq!(route.cost, 5.0);
    }

    #[test]
    fn zero_speed_link_is_impassable() {
        let d = diamond();
        let blocked = d.lower[0];
        let mut search = Search::new(&d.net)
            .with_link_speed_fn(move |net, l| if l == blocked { 0.0 } else { net.link_speed[l.index()] });
        assert_eq!(search.calc_path(d.s, d.e, None, false).unwrap(), d.upper.to_vec());
    }

    #[test]
    fn speed_unit_factor_scales_cost() {
        let d = diamond();
        let cfg = SearchConfig { speed_unit_factor: 2.0, ..SearchConfig::default() };
        let mut search = Search::with_config(&d.net, cfg).unwrap();
        let route = search.calc_route(d.s, d.e, None, false).unwrap().unwrap();
        assert_eq!(route.cost, 2.0);
        assert_eq!(search.max_observed_speed(), Some(2.0));
    }

    #[test]
    fn invalid_config_rejected() {
        let d = diamond();
        let cfg = SearchConfig { speed_unit_factor: f64::NAN, ..SearchConfig::default() };
        assert!(matches!(Search::with_config(&d.net, cfg), Err(SpatialError::InvalidConfiguration(_))));
        let cfg = SearchConfig { speed_unit_factor: -1.0, ..SearchConfig::default() };
        assert!(Search::with_config(&d.net, cfg).is_err());

        let mut search = Search::new(&d.net);
        assert!(search.set_coord_to_length_factor(-2.0).is_err());
        assert_eq!(search.coord_to_length_factor(), 1.0);
        search.set_coord_to_length_factor(0.5).unwrap();
        assert_eq!(search.coord_to_length_factor(), 0.5);
    }

    #[test]
    fn cheaper_late_arrival_reexpands_link() {
        // S→X is popped first and reaches X→Y at cost 8.  The detour through
        // W reaches X at 1.2 only after X→Y has been expanded once.
        //
        //  S(10,1) ─0.6→ W(10,0.5) ─0.6→ X(10,0)
        //     └──────────── 8 ───────────┘ │ 9
        //                 G(0,0) ←1─ Y(1,0)┘
        let mut b = NetworkBuilder::new();
        let s = b.add_node(Point::new(10.0, 1.0));
        let w = b.add_node(Point::new(10.0, 0.5));
        let x = b.add_intersection(Point::new(10.0, 0.0));
        let y = b.add_intersection(Point::new(1.0, 0.0));
        let g = b.add_node(Point::new(0.0, 0.0));
        let sx = b.add_link(s, x, 8.0, 1.0, modes("c"));
        let sw = b.add_link(s, w, 0.6, 1.0, modes("c"));
        let wx = b.add_link(w, x, 0.6, 1.0, modes("c"));
        let xy = b.add_link(x, y, 9.0, 1.0, modes("c"));
        let yg = b.add_link(y, g, 1.0, 1.0, modes("c"));
        b.add_turn(sx, xy, 1.0).unwrap();
        b.add_turn(wx, xy, 1.0).unwrap();
        b.add_turn(xy, yg, 1.0).unwrap();
        let net = b.build();

        let route = Search::new(&net).calc_route(s, g, None, false).unwrap().unwrap();
        assert_eq!(route.links, vec![sw, wx, xy, yg]);
        assert!((route.cost - 11.2).abs() < 1e-9, "cost {}", route.cost);
    }

    #[test]
    fn mode_restricts_links() {
        let d = diamond();
        let mut search = Search::new(&d.net);
        // Bus may use S→B and M→E but not B→M: no bus path.
        let bus = Mode::new('b').unwrap();
        assert!(search.calc_path(d.s, d.e, Some(bus), false).unwrap().is_empty());
        // The filter set by `mode` persists to later calls.
        assert!(search.calc_path(d.s, d.e, None, false).unwrap().is_empty());
        search.set_link_filter(|_, _| true);
        assert_eq!(search.calc_path(d.s, d.e, None, false).unwrap(), d.lower.to_vec());
    }

    #[test]
    fn cached_max_speed_reused() {
        let d = diamond();
        let mut search = Search::new(&d.net);
        search.calc_path(d.s, d.e, None, false).unwrap();
        assert_eq!(search.max_observed_speed(), Some(1.0));
        let again = search.calc_path(d.s, d.e, None, true).unwrap();
        assert_eq!(again, d.lower.to_vec());
    }

    #[test]
    fn straight_turn_when_allowed() {
        let j = junction(1.0);
        let [l0, l1, _, _] = j.links;
        let mut search = Search::new(&j.net);
        assert_eq!(search.calc_path(j.p, j.q, None, false).unwrap(), vec![l0, l1]);
    }

    #[test]
    fn prohibited_turn_forces_detour() {
        let j = junction(PROHIBITED);
        let [l0, _, l2, l3] = j.links;
        let mut search = Search::new(&j.net);
        let route = search.calc_route(j.p, j.q, None, false).unwrap().unwrap();
        assert_eq!(route.links, vec![l0, l2, l3]);
        assert_eq!(route.cost, 3.5);
    }

    #[test]
    fn turn_penalty_forces_detour() {
        let j = junction(1.0);
        let [l0, l1, l2, l3] = j.links;
        let net = &j.net;
        let straight = net.turn(l0, l1).unwrap();
        let mut search = Search::new(net).with_turn_penalty_fn(move |_, t| if t == straight { 5.0 } else { 0.0 });
        assert_eq!(search.turn_cost(straight), 5.0);
        assert_eq!(search.calc_path(j.p, j.q, None, false).unwrap(), vec![l0, l2, l3]);
    }

    #[test]
    fn prohibited_turn_blocks_only_path() {
        // P → X → Q with X an intersection whose only turn is prohibited.
        let mut b = NetworkBuilder::new();
        let p = b.add_node(Point::new(0.0, 0.0));
        let x = b.add_node(Point::new(1.0, 0.0));
        let q = b.add_node(Point::new(2.0, 0.0));
        let r = b.add_node(Point::new(1.0, 1.0));
        let px = b.add_link(p, x, 1.0, 1.0, modes("c"));
        let xq = b.add_link(x, q, 1.0, 1.0, modes("c"));
        let xr = b.add_link(x, r, 1.0, 1.0, modes("c"));
        b.prohibit_turn(px, xq).unwrap();
        b.add_turn(px, xr, 1.0).unwrap();
        let net = b.build();

        let mut search = Search::new(&net);
        assert!(search.calc_path(p, q, None, false).unwrap().is_empty());
        assert_eq!(search.calc_path(p, r, None, false).unwrap(), vec![px, xr]);
    }

    #[test]
    fn intersection_without_turns_blocks() {
        let mut b = NetworkBuilder::new();
        let p = b.add_node(Point::new(0.0, 0.0));
        let x = b.add_intersection(Point::new(1.0, 0.0));
        let q = b.add_node(Point::new(2.0, 0.0));
        b.add_link(p, x, 1.0, 1.0, modes("c"));
        b.add_link(x, q, 1.0, 1.0, modes("c"));
        let net = b.build();
        assert!(Search::new(&net).calc_path(p, q, None, false).unwrap().is_empty());
    }

    #[test]
    fn hop_cutoff() {
        let (net, nodes, links) = chain(3);
        let mut search = Search::new(&net);
        search.set_max_degrees(1);
        assert!(search.calc_path(nodes[0], nodes[3], None, false).unwrap().is_empty());
        search.set_max_degrees(2);
        assert_eq!(search.calc_path(nodes[0], nodes[3], None, false).unwrap(), links);
        assert_eq!(search.max_degrees(), 2);
    }

    #[test]
    fn single_link_path_with_zero_degrees() {
        let (net, nodes, links) = chain(1);
        let mut search = Search::new(&net);
        search.set_max_degrees(0);
        assert_eq!(search.calc_path(nodes[0], nodes[1], None, false).unwrap(), links);
    }

    #[test]
    fn no_path_cases() {
        let (net, nodes, _) = chain(2);
        let mut search = Search::new(&net);
        // Against the link direction.
        assert!(search.calc_path(nodes[2], nodes[0], None, false).unwrap().is_empty());
        // Same node.
        assert!(search.calc_path(nodes[1], nodes[1], None, false).unwrap().is_empty());
    }

    #[test]
    fn u_turn_not_taken_at_plain_node() {
        // A ⇄ B ⇄ C: reaching A from B must not bounce through C.
        let mut b = NetworkBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let bb = b.add_node(Point::new(1.0, 0.0));
        let c = b.add_node(Point::new(2.0, 0.0));
        let (ab, ba) = b.add_road(a, bb, 1.0, 1.0, modes("c"));
        let (bc, _) = b.add_road(bb, c, 1.0, 1.0, modes("c"));
        let net = b.build();
        let mut search = Search::new(&net);
        assert_eq!(search.calc_path(a, c, None, false).unwrap(), vec![ab, bc]);
        assert_eq!(search.calc_path(bb, a, None, false).unwrap(), vec![ba]);
    }

    #[test]
    fn unknown_node_is_an_error() {
        let d = diamond();
        let mut search = Search::new(&d.net);
        let r = search.calc_path(d.s, NodeId(99), None, false);
        assert!(matches!(r, Err(SpatialError::NodeNotFound(n)) if n == NodeId(99)));
    }

    #[test]
    fn negative_cost_aborts_and_network_is_untouched() {
        let d = diamond();
        let before = d.net.clone();
        {
            let mut search = Search::new(&d.net).with_link_penalty_fn(|_, _| -100.0);
            let r = search.calc_path(d.s, d.e, None, false);
            assert!(matches!(r, Err(SpatialError::NegativeCost { .. })));
        }
        assert_eq!(d.net, before);
    }

    #[test]
    fn negative_turn_cost_aborts() {
        let j = junction(1.0);
        let mut search = Search::new(&j.net).with_turn_penalty_fn(|_, _| -1.0);
        assert!(matches!(
            search.calc_path(j.p, j.q, None, false),
            Err(SpatialError::NegativeTurnCost { .. })
        ));
        let [l0, _, l2, _] = j.links;
        assert!(search.calc_path(j.p, j.r, None, false).is_err());
        // Default turn costs succeed over the same network.
        let mut fresh = Search::new(&j.net);
        assert_eq!(fresh.calc_path(j.p, j.r, None, false).unwrap(), vec![l0, l2]);
    }

    #[test]
    fn independent_searches_share_a_network() {
        let d = diamond();
        let mut first = Search::new(&d.net);
        let mut second = Search::new(&d.net).with_link_penalty_fn(|_, _| 0.5);
        let a = first.calc_route(d.s, d.e, None, false).unwrap().unwrap();
        let b = second.calc_route(d.s, d.e, None, false).unwrap().unwrap();
        assert_eq!(a.links, b.links);
        assert_eq!(b.cost, a.cost + 1.5);
    }

    #[test]
    fn repeated_calls_reset_state() {
        let d = diamond();
        let mut search = Search::new(&d.net);
        let first = search.calc_path(d.s, d.e, None, false).unwrap();
        let second = search.calc_path(d.s, d.e, None, false).unwrap();
        assert_eq!(first, second);
    }
}
