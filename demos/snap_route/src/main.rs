//! snap_route — match a noisy position trace to a street grid and route
//! between the matched nodes.
//!
//! Usage: `snap_route [search_config.json]`
//!
//! The optional argument is a JSON `SearchConfig`; missing fields take their
//! defaults.  Without it, costs are reported in minutes.  Set
//! `RUST_LOG=debug` to see grid, network and search events.

mod network;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tdm_core::{GridConfig, LinkId, Mode, NodeId, Point, SearchConfig};
use tdm_spatial::{Network, Search};

use network::{SIDE, build_network, node_at};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Observed positions in km, a few tens of metres off the streets.
const TRACE: [(f64, f64); 5] = [
    (0.03, -0.02),
    (0.78,  0.04),
    (0.83,  0.79),
    (1.62,  0.85),
    (1.57,  1.22),
];

/// Cost of one unit of stored turn penalty, in minutes.
const TURN_MINUTES: f64 = 0.25;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<SearchConfig> {
    let config = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", p.display()))?
        }
        // km / (km/h / 60) = minutes
        None => SearchConfig { speed_unit_factor: 1.0 / 60.0, ..SearchConfig::default() },
    };
    config.validate()?;
    Ok(config)
}

/// Node sequence visited by `links`, e.g. `0 → 1 → 6`.
fn describe(network: &Network, links: &[LinkId]) -> String {
    let Some(first) = links.first() else {
        return "(none)".into();
    };
    let mut out = network.link_from[first.index()].0.to_string();
    for l in links {
        out.push_str(&format!(" → {}", network.link_to[l.index()].0));
    }
    out
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref().map(Path::new))?;

    println!("=== snap_route ===");

    // 1. Build the street grid and its node index.
    let (network, nodes) = build_network()?;
    println!(
        "Street grid: {SIDE}×{SIDE}, {} nodes, {} links, {} turns",
        network.node_count(),
        network.link_count(),
        network.turn_count()
    );
    let grid = network.node_grid(&GridConfig { x_cells: 8, y_cells: 8, margin: 0.1 })?;
    println!();

    // 2. Snap every observation to its nearest node.
    println!("{:<6} {:<18} {:<6}", "Point", "Observed (km)", "Node");
    println!("{}", "-".repeat(30));
    let mut matched: Vec<NodeId> = Vec::with_capacity(TRACE.len());
    for (i, &(x, y)) in TRACE.iter().enumerate() {
        let node = network
            .snap_to_node(&grid, Point::new(x, y))
            .context("node grid is empty")?;
        println!("{:<6} {:<18} {:<6}", i, format!("({x:.2}, {y:.2})"), node.0);
        if matched.last() != Some(&node) {
            matched.push(node);
        }
    }
    println!();

    // 3. Route between consecutive matched nodes.
    let mut search = Search::with_config(&network, config.clone())?
        .with_turn_penalty_fn(|net, t| net.turn_penalty[t.index()] * TURN_MINUTES);

    let t0 = Instant::now();
    let mut total = 0.0;
    let mut journey: Vec<LinkId> = Vec::new();
    println!("{:<5} {:<22} {:>8}", "Leg", "Nodes", "Cost");
    println!("{}", "-".repeat(37));
    for (leg, pair) in matched.windows(2).enumerate() {
        // The speed function and filter never change, so later legs reuse
        // the first leg's maximum speed.
        match search.calc_route(pair[0], pair[1], None, leg > 0)? {
            Some(route) => {
                println!("{:<5} {:<22} {:>8.2}", leg, describe(&network, &route.links), route.cost);
                total += route.cost;
                journey.extend(route.links);
            }
            None => println!("{:<5} {} → {} unreachable", leg, pair[0].0, pair[1].0),
        }
    }
    info!(
        legs = matched.len().saturating_sub(1),
        links = journey.len(),
        cost = total,
        elapsed_us = t0.elapsed().as_micros() as u64,
        "trace routed"
    );
    println!("Journey: {}  (cost {total:.2})", describe(&network, &journey));
    println!();

    // 4. The left turn at the centre is prohibited; the route goes around it.
    let west = node_at(&nodes, SIDE / 2 - 1, SIDE / 2);
    let north = node_at(&nodes, SIDE / 2, SIDE / 2 + 1);
    let detour = search.calc_path(west, north, None, true)?;
    println!("No left turn at centre: {}", describe(&network, &detour));

    // 5. Buses may only use the arterial.
    let mut bus_search = Search::with_config(&network, config)?;
    let from = node_at(&nodes, 0, SIDE / 2);
    let to = node_at(&nodes, SIDE - 1, SIDE / 2);
    let bus_path = bus_search.calc_path(from, to, Some(Mode::new('b')?), false)?;
    println!("Bus along the arterial:  {}", describe(&network, &bus_path));

    let off_arterial = node_at(&nodes, SIDE - 1, 0);
    let none = bus_search.calc_path(from, off_arterial, None, false)?;
    println!("Bus off the arterial:    {}", describe(&network, &none));

    Ok(())
}
