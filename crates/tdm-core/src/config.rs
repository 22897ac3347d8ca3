//! Tunables for the grid index and the path search.
//!
//! Both structs are plain data.  Applications typically load them from a
//! JSON file (feature `serde`) and pass them to
//! `GridIndex::from_config` / `Search::with_config`.

use crate::{CoreError, CoreResult};

// ── GridConfig ────────────────────────────────────────────────────────────────

/// Dimensions of a uniform grid index.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridConfig {
    /// Number of columns.  Default: 100.
    pub x_cells: usize,

    /// Number of rows.  Default: 100.
    pub y_cells: usize,

    /// Distance added to every side of the extent before the cell size is
    /// computed, in coordinate units.  Default: 0.
    pub margin: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { x_cells: 100, y_cells: 100, margin: 0.0 }
    }
}

impl GridConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.x_cells == 0 || self.y_cells == 0 {
            return Err(CoreError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.x_cells, self.y_cells
            )));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(CoreError::Config(format!(
                "grid margin must be a finite non-negative number, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}

// ── SearchConfig ──────────────────────────────────────────────────────────────

/// Scalar parameters of the turn-restricted path search.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchConfig {
    /// Multiplies link speed so that `length / (speed * factor)` lands in the
    /// desired cost unit.  With km lengths and km/h speeds, `1.0 / 60.0`
    /// yields minutes.  Default: 1.0.
    pub speed_unit_factor: f64,

    /// Hop cutoff.  A frontier link reached after more than this many hops
    /// is discarded.  Default: 20.
    pub max_degrees: u32,

    /// Converts coordinate distance into link-length units for the A*
    /// heuristic.  Default: 1.0.
    pub coord_to_length_factor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            speed_unit_factor: 1.0,
            max_degrees: 20,
            coord_to_length_factor: 1.0,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, v) in [
            ("speed_unit_factor", self.speed_unit_factor),
            ("coord_to_length_factor", self.coord_to_length_factor),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(CoreError::Config(format!(
                    "{name} must be a finite positive number, got {v}"
                )));
            }
        }
        Ok(())
    }
}
