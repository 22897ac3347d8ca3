//! `tdm-core` — foundational types for the `tdm` network toolkit.
//!
//! This crate is a dependency of every other `tdm-*` crate.  It has no
//! `tdm-*` dependencies and minimal external ones (only `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                              |
//! |--------------|-------------------------------------------------------|
//! | [`ids`]      | `NodeId`, `LinkId`, `TurnId`                          |
//! | [`geo`]      | `Point`, euclidean distance                           |
//! | [`mode`]     | `Mode`, `ModeSet`                                     |
//! | [`config`]   | `GridConfig`, `SearchConfig`                          |
//! | [`error`]    | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | `Serialize`/`Deserialize` on all public types (JSON config) |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod mode;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{GridConfig, SearchConfig};
pub use error::{CoreError, CoreResult};
pub use geo::Point;
pub use ids::{LinkId, NodeId, TurnId};
pub use mode::{Mode, ModeSet};
