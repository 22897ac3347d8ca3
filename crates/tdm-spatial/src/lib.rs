//! `tdm-spatial` — grid index, network graph, and turn-restricted routing.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`range`]   | `Range`, `Rectangle`                                        |
//! | [`grid`]    | `GridIndex<T>` (uniform grid + address book), `Cell`        |
//! | [`network`] | `Network` (CSR links/turns), `NetworkBuilder`              |
//! | [`search`]  | `Search` (turn-restricted A*), `Route`                      |
//! | [`error`]   | `SpatialError`, `SpatialResult<T>`                         |
//!
//! # Typical use
//!
//! A map-matching tool builds a `GridIndex<NodeId>` over the network nodes
//! ([`Network::node_grid`]) to snap observed coordinates to nodes, then runs
//! a [`Search`] between consecutive matched nodes.
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `Range`/`Rectangle`.    |

pub mod error;
pub mod grid;
pub mod network;
pub mod range;
pub mod search;

#[cfg(test)]
mod tests;

pub use error::{SpatialError, SpatialResult};
pub use grid::{Cell, GridIndex};
pub use network::{Network, NetworkBuilder, PROHIBITED};
pub use range::{Range, Rectangle};
pub use search::{Route, Search};
