//! Uniform grid index over 2-D geometry.
//!
//! # Layout
//!
//! The extent is split into `x_cells × y_cells` equal cells, stored
//! row-major in one `Vec`:
//!
//! ```text
//! cells[ row * x_cells + col ]
//! ```
//!
//! Each cell holds the set of handles whose geometry touches it.  An
//! **address book** maps every handle back to the cells it occupies, so
//! removal costs O(occupied cells) instead of a full scan.  The two sides are
//! always kept consistent: `obj ∈ cells[c]  ⇔  c ∈ address_book[obj]`.
//!
//! # Conservative results
//!
//! Queries rasterise the query shape onto the same cells and union their
//! contents.  A handle in the result is only known to share a *cell* with
//! the query; the caller runs the exact geometric test.  Conversely, every
//! handle whose geometry truly intersects the query shape is returned.
//!
//! # Out-of-extent geometry
//!
//! Insertion outside the extent fails with [`SpatialError::OutOfBounds`].
//! Queries never fail: coordinates beyond the extent are clamped to the
//! nearest edge cells, and boxes or circles that miss the extent entirely
//! return an empty set.

use std::fmt;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use tdm_core::{GridConfig, Point};

use crate::range::Rectangle;
use crate::{SpatialError, SpatialResult};

// ── Cell ──────────────────────────────────────────────────────────────────────

/// Address of one grid cell.  Both coordinates are 0-based; column 0 / row 0
/// is the cell at the extent's minimum corner.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Cell {
    pub col: usize,
    pub row: usize,
}

impl Cell {
    #[inline]
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

// ── GridIndex ─────────────────────────────────────────────────────────────────

/// Fixed-size uniform grid mapping cells to caller-supplied handles.
///
/// `T` is typically a small id such as `NodeId` or `LinkId`.
pub struct GridIndex<T> {
    extent: Rectangle,
    x_cells: usize,
    y_cells: usize,
    cell_w: f64,
    cell_h: f64,
    cells: Vec<FxHashSet<T>>,
    address_book: FxHashMap<T, FxHashSet<Cell>>,
}

impl<T: Copy + Eq + Hash> GridIndex<T> {
    /// Create an empty grid covering `extent` grown by `margin` on every side.
    ///
    /// # Errors
    ///
    /// [`SpatialError::InvalidConfiguration`] if either cell count is zero,
    /// the cell total overflows `usize`, the margin is negative, or the
    /// grown extent has no area.
    pub fn new(extent: Rectangle, x_cells: usize, y_cells: usize, margin: f64) -> SpatialResult<Self> {
        GridConfig { x_cells, y_cells, margin }
            .validate()
            .map_err(|e| SpatialError::InvalidConfiguration(e.to_string()))?;
        let cell_count = x_cells.checked_mul(y_cells).ok_or_else(|| {
            SpatialError::InvalidConfiguration(format!("grid of {x_cells} x {y_cells} cells is too large"))
        })?;

        let extent = extent.expanded(margin);
        let (width, height) = (extent.width(), extent.height());
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(SpatialError::InvalidConfiguration(format!(
                "grid extent must have positive finite area, got {width} x {height}"
            )));
        }

        let cell_w = width / x_cells as f64;
        let cell_h = height / y_cells as f64;
        debug!(x_cells, y_cells, cell_w, cell_h, "grid index created");

        Ok(Self {
            extent,
            x_cells,
            y_cells,
            cell_w,
            cell_h,
            cells: vec![FxHashSet::default(); cell_count],
            address_book: FxHashMap::default(),
        })
    }

    /// [`new`](Self::new) with dimensions taken from a [`GridConfig`].
    pub fn from_config(extent: Rectangle, config: &GridConfig) -> SpatialResult<Self> {
        Self::new(extent, config.x_cells, config.y_cells, config.margin)
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    /// The covered extent, margin included.
    pub fn extent(&self) -> Rectangle {
        self.extent
    }

    /// `(x_cells, y_cells)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.x_cells, self.y_cells)
    }

    /// `(cell_width, cell_height)` in coordinate units.
    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_w, self.cell_h)
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.address_book.len()
    }

    pub fn is_empty(&self) -> bool {
        self.address_book.is_empty()
    }

    pub fn contains(&self, obj: T) -> bool {
        self.address_book.contains_key(&obj)
    }

    /// Cells occupied by `obj`, or `None` if it is not indexed.
    pub fn cells_of(&self, obj: T) -> Option<&FxHashSet<Cell>> {
        self.address_book.get(&obj)
    }

    /// Handles stored in `cell`.  Out-of-range cells are empty.
    pub fn cell_contents(&self, cell: Cell) -> impl Iterator<Item = T> + '_ {
        let slot = (cell.col < self.x_cells && cell.row < self.y_cells).then(|| self.slot(cell));
        slot.into_iter().flat_map(move |s| self.cells[s].iter().copied())
    }

    /// The cell containing `(x, y)`, or `None` outside the (closed) extent.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<Cell> {
        self.in_extent(x, y).then(|| self.nearest_cell(x, y))
    }

    /// Drop every indexed object.  Dimensions are unchanged.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.address_book.clear();
    }

    // ── Insertion ─────────────────────────────────────────────────────────

    /// Index `obj` at a single point.
    pub fn insert_point(&mut self, obj: T, x: f64, y: f64) -> SpatialResult<()> {
        self.check_in_extent(x, y)?;
        let mut cells = FxHashSet::default();
        cells.insert(self.nearest_cell(x, y));
        self.place(obj, cells);
        Ok(())
    }

    /// Index `obj` along a polyline.  Every vertex must lie inside the extent.
    pub fn insert_polyline(&mut self, obj: T, points: &[Point]) -> SpatialResult<()> {
        if points.is_empty() {
            return Err(SpatialError::EmptyGeometry("polyline has no points"));
        }
        for p in points {
            self.check_in_extent(p.x, p.y)?;
        }
        let cells = self.polyline_cells(points);
        self.place(obj, cells);
        Ok(())
    }

    /// Index `obj` over an axis-aligned box.  The box is clamped to the
    /// extent; it fails only when it lies entirely outside.
    pub fn insert_box(&mut self, obj: T, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SpatialResult<()> {
        let rect = Rectangle::new(min_x, min_y, max_x, max_y);
        if !self.touches_extent(rect) {
            return Err(SpatialError::OutOfBounds { x: rect.x.min, y: rect.y.min });
        }
        let cells = self.box_cells(rect);
        self.place(obj, cells);
        Ok(())
    }

    /// Index `obj` over a disc.  Clamped like [`insert_box`](Self::insert_box).
    pub fn insert_circle(&mut self, obj: T, cx: f64, cy: f64, radius: f64) -> SpatialResult<()> {
        if !(radius >= 0.0) {
            return Err(SpatialError::EmptyGeometry("circle radius must be non-negative"));
        }
        if !self.touches_extent(circle_bounds(cx, cy, radius)) {
            return Err(SpatialError::OutOfBounds { x: cx, y: cy });
        }
        let cells = self.circle_cells(cx, cy, radius);
        self.place(obj, cells);
        Ok(())
    }

    // ── Removal ───────────────────────────────────────────────────────────

    /// Remove `obj` from every cell it occupies.
    ///
    /// # Errors
    ///
    /// [`SpatialError::ObjectNotFound`] if `obj` was never inserted (or was
    /// already removed).
    pub fn remove(&mut self, obj: T) -> SpatialResult<()> {
        let cells = self.address_book.remove(&obj).ok_or(SpatialError::ObjectNotFound)?;
        for cell in cells {
            let slot = self.slot(cell);
            self.cells[slot].remove(&obj);
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Objects sharing the cell under `(x, y)`.
    pub fn query_point(&self, x: f64, y: f64) -> FxHashSet<T> {
        let mut cells = FxHashSet::default();
        cells.insert(self.nearest_cell(x, y));
        self.collect(&cells)
    }

    /// Objects sharing any cell crossed by the polyline.
    pub fn query_polyline(&self, points: &[Point]) -> FxHashSet<T> {
        if points.is_empty() {
            return FxHashSet::default();
        }
        self.collect(&self.polyline_cells(points))
    }

    /// Objects sharing any cell overlapped by the box.
    pub fn query_box(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> FxHashSet<T> {
        self.query_rectangle(Rectangle::new(min_x, min_y, max_x, max_y))
    }

    pub fn query_rectangle(&self, rect: Rectangle) -> FxHashSet<T> {
        if !self.touches_extent(rect) {
            return FxHashSet::default();
        }
        self.collect(&self.box_cells(rect))
    }

    /// Objects sharing any cell overlapped by the disc.
    pub fn query_circle(&self, cx: f64, cy: f64, radius: f64) -> FxHashSet<T> {
        if !(radius >= 0.0) || !self.touches_extent(circle_bounds(cx, cy, radius)) {
            return FxHashSet::default();
        }
        self.collect(&self.circle_cells(cx, cy, radius))
    }

    /// Candidate set for the object nearest to `(x, y)`.
    ///
    /// Returns the contents of the containing cell if it has any; otherwise
    /// grows a square ring of cells one step at a time and returns the first
    /// non-empty ring.  The true nearest object may sit in the next ring out
    /// (ring distance is Chebyshev, not euclidean), so callers that need the
    /// exact answer should follow up with [`query_circle`](Self::query_circle)
    /// at the best candidate's distance.
    ///
    /// Empty only when the whole grid is empty.
    pub fn nearest_to_point(&self, x: f64, y: f64) -> FxHashSet<T> {
        let mut found = FxHashSet::default();
        if self.is_empty() {
            return found;
        }
        let centre = self.nearest_cell(x, y);
        found.extend(self.cell_contents(centre));

        let max_ring = self.x_cells.max(self.y_cells);
        let mut k = 1;
        while found.is_empty() && k <= max_ring {
            for cell in self.ring(centre, k) {
                found.extend(self.cells[self.slot(cell)].iter().copied());
            }
            k += 1;
        }
        found
    }

    // ── Internals ─────────────────────────────────────────────────────────

    #[inline]
    fn slot(&self, cell: Cell) -> usize {
        cell.row * self.x_cells + cell.col
    }

    #[inline]
    fn in_extent(&self, x: f64, y: f64) -> bool {
        self.extent.x.contains_inclusive(x) && self.extent.y.contains_inclusive(y)
    }

    fn check_in_extent(&self, x: f64, y: f64) -> SpatialResult<()> {
        if self.in_extent(x, y) { Ok(()) } else { Err(SpatialError::OutOfBounds { x, y }) }
    }

    /// Closed overlap test against the extent.
    fn touches_extent(&self, r: Rectangle) -> bool {
        r.x.min <= self.extent.x.max
            && r.x.max >= self.extent.x.min
            && r.y.min <= self.extent.y.max
            && r.y.max >= self.extent.y.min
    }

    /// Unclamped column index; may be negative or past the last column.
    #[inline]
    fn col_of(&self, x: f64) -> i64 {
        ((x - self.extent.x.min) / self.cell_w).floor() as i64
    }

    #[inline]
    fn row_of(&self, y: f64) -> i64 {
        ((y - self.extent.y.min) / self.cell_h).floor() as i64
    }

    #[inline]
    fn clamp_col(&self, c: i64) -> usize {
        c.clamp(0, self.x_cells as i64 - 1) as usize
    }

    #[inline]
    fn clamp_row(&self, r: i64) -> usize {
        r.clamp(0, self.y_cells as i64 - 1) as usize
    }

    /// Cell containing `(x, y)`, or the closest edge cell when outside.
    fn nearest_cell(&self, x: f64, y: f64) -> Cell {
        Cell::new(self.clamp_col(self.col_of(x)), self.clamp_row(self.row_of(y)))
    }

    /// Add every cell of column `col` between the rows of `y0` and `y1`.
    fn push_rows(&self, col: usize, y0: f64, y1: f64, out: &mut FxHashSet<Cell>) {
        let (lo, hi) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let r0 = self.clamp_row(self.row_of(lo));
        let r1 = self.clamp_row(self.row_of(hi));
        for row in r0..=r1 {
            out.insert(Cell::new(col, row));
        }
    }

    fn polyline_cells(&self, points: &[Point]) -> FxHashSet<Cell> {
        let mut out = FxHashSet::default();
        if let [only] = points {
            out.insert(self.nearest_cell(only.x, only.y));
        }
        for pair in points.windows(2) {
            self.segment_cells(pair[0], pair[1], &mut out);
        }
        out
    }

    /// Column-by-column scan of one segment.
    ///
    /// For each column between the endpoints the segment's y at the column's
    /// left and right boundaries (clipped to the segment) gives the row span
    /// it crosses in that column.
    fn segment_cells(&self, a: Point, b: Point, out: &mut FxHashSet<Cell>) {
        out.insert(self.nearest_cell(a.x, a.y));
        out.insert(self.nearest_cell(b.x, b.y));

        let (a, b) = if a.x <= b.x { (a, b) } else { (b, a) };
        let c0 = self.col_of(a.x);
        let c1 = self.col_of(b.x);

        // Vertical, or both ends in one column: no slope needed.
        if c0 == c1 || a.x == b.x {
            self.push_rows(self.clamp_col(c0), a.y, b.y, out);
            return;
        }

        let slope = (b.y - a.y) / (b.x - a.x);
        let first = c0.max(0);
        let last = c1.min(self.x_cells as i64 - 1);
        for c in first..=last {
            let col_min = self.extent.x.min + c as f64 * self.cell_w;
            let left = col_min.max(a.x);
            let right = (col_min + self.cell_w).min(b.x);
            let y_left = a.y + slope * (left - a.x);
            let y_right = a.y + slope * (right - a.x);
            self.push_rows(c as usize, y_left, y_right, out);
        }
    }

    fn box_cells(&self, r: Rectangle) -> FxHashSet<Cell> {
        let c0 = self.clamp_col(self.col_of(r.x.min));
        let c1 = self.clamp_col(self.col_of(r.x.max));
        let r0 = self.clamp_row(self.row_of(r.y.min));
        let r1 = self.clamp_row(self.row_of(r.y.max));
        let mut out = FxHashSet::default();
        for row in r0..=r1 {
            for col in c0..=c1 {
                out.insert(Cell::new(col, row));
            }
        }
        out
    }

    /// For each column under the disc, the row span comes from the circle
    /// equation evaluated at the column's x closest to the centre, which is
    /// the widest chord the disc has inside that column.
    fn circle_cells(&self, cx: f64, cy: f64, radius: f64) -> FxHashSet<Cell> {
        let c0 = self.clamp_col(self.col_of(cx - radius));
        let c1 = self.clamp_col(self.col_of(cx + radius));
        let mut out = FxHashSet::default();
        for col in c0..=c1 {
            let col_min = self.extent.x.min + col as f64 * self.cell_w;
            let nearest_x = cx.clamp(col_min, col_min + self.cell_w);
            let dx = nearest_x - cx;
            let half = (radius * radius - dx * dx).max(0.0).sqrt();
            self.push_rows(col, cy - half, cy + half, &mut out);
        }
        out
    }

    /// Cells on the square ring at Chebyshev distance `k` from `centre`,
    /// walked top row, right column, bottom row, left column.  Cells outside
    /// the grid are skipped.
    fn ring(&self, centre: Cell, k: usize) -> impl Iterator<Item = Cell> + '_ {
        let (c, r, k) = (centre.col as i64, centre.row as i64, k as i64);
        let top = (c - k..=c + k).map(move |x| (x, r + k));
        let right = (r - k + 1..r + k).rev().map(move |y| (c + k, y));
        let bottom = (c - k..=c + k).rev().map(move |x| (x, r - k));
        let left = (r - k + 1..r + k).map(move |y| (c - k, y));
        top.chain(right)
            .chain(bottom)
            .chain(left)
            .filter(move |&(x, y)| x >= 0 && y >= 0 && x < self.x_cells as i64 && y < self.y_cells as i64)
            .map(|(x, y)| Cell::new(x as usize, y as usize))
    }

    fn collect(&self, cells: &FxHashSet<Cell>) -> FxHashSet<T> {
        let mut out = FxHashSet::default();
        for &cell in cells {
            out.extend(self.cells[self.slot(cell)].iter().copied());
        }
        out
    }

    /// Record `obj` in `cells`, replacing any previous placement.
    fn place(&mut self, obj: T, cells: FxHashSet<Cell>) {
        if let Some(old) = self.address_book.remove(&obj) {
            for cell in old {
                let slot = self.slot(cell);
                self.cells[slot].remove(&obj);
            }
        }
        for &cell in &cells {
            let slot = self.slot(cell);
            self.cells[slot].insert(obj);
        }
        self.address_book.insert(obj, cells);
    }
}

fn circle_bounds(cx: f64, cy: f64, radius: f64) -> Rectangle {
    Rectangle::new(cx - radius, cy - radius, cx + radius, cy + radius)
}

impl<T> fmt::Debug for GridIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridIndex")
            .field("extent", &self.extent)
            .field("x_cells", &self.x_cells)
            .field("y_cells", &self.y_cells)
            .field("cell_w", &self.cell_w)
            .field("cell_h", &self.cell_h)
            .field("objects", &self.address_book.len())
            .finish_non_exhaustive()
    }
}
