//! Interaction heatmaps
//!
//! Two grids per device (movement and clicks), `height` rows by `width`
//! columns, row-major. Cells only ever grow through `ingest`; a server
//! snapshot replaces the grid wholesale.

pub mod color;
pub mod synthetic;

pub use color::{band_of, color_of, ColorBand, Rgba};

use crate::error::ShapeError;
use crate::models::{HeatmapPayload, Resolution};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapKind {
    Movement,
    Click,
}

/// One pre-scaled interaction at grid coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapEvent {
    pub x: i64,
    pub y: i64,
    pub kind: HeatmapKind,
    pub weight: f64,
}

impl HeatmapEvent {
    pub fn movement(x: i64, y: i64, weight: f64) -> Self {
        Self { x, y, kind: HeatmapKind::Movement, weight }
    }

    pub fn click(x: i64, y: i64, weight: f64) -> Self {
        Self { x, y, kind: HeatmapKind::Click, weight }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    width: usize,
    height: usize,
    movement: Vec<f64>,
    clicks: Vec<f64>,
}

/// The grid is its own aggregator: events accumulate in place
pub type HeatmapAggregator = HeatmapGrid;

impl HeatmapGrid {
    /// Zeroed grid; a zero dimension is clamped to 1
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            movement: vec![0.0; width * height],
            clicks: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution { width: self.width, height: self.height }
    }

    fn cells(&self, kind: HeatmapKind) -> &[f64] {
        match kind {
            HeatmapKind::Movement => &self.movement,
            HeatmapKind::Click => &self.clicks,
        }
    }

    fn cells_mut(&mut self, kind: HeatmapKind) -> &mut [f64] {
        match kind {
            HeatmapKind::Movement => &mut self.movement,
            HeatmapKind::Click => &mut self.clicks,
        }
    }

    pub fn cell(&self, kind: HeatmapKind, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cells(kind)[y * self.width + x])
    }

    pub fn max(&self, kind: HeatmapKind) -> f64 {
        self.cells(kind).iter().copied().fold(0.0, f64::max)
    }

    pub fn total(&self, kind: HeatmapKind) -> f64 {
        self.cells(kind).iter().sum()
    }

    /// Add `event.weight` to the clamped cell. Returns false for negative or
    /// non-finite weights, which are dropped.
    pub fn ingest(&mut self, event: HeatmapEvent) -> bool {
        if !event.weight.is_finite() || event.weight < 0.0 {
            return false;
        }
        let x = event.x.clamp(0, self.width as i64 - 1) as usize;
        let y = event.y.clamp(0, self.height as i64 - 1) as usize;
        let width = self.width;
        self.cells_mut(event.kind)[y * width + x] += event.weight;
        true
    }

    /// Rows of the requested grid, top to bottom
    pub fn snapshot(&self, kind: HeatmapKind) -> Vec<Vec<f64>> {
        self.cells(kind).chunks(self.width).map(<[f64]>::to_vec).collect()
    }

    /// Colour every cell of the requested grid
    pub fn colored(&self, kind: HeatmapKind) -> Vec<Vec<Rgba>> {
        self.cells(kind)
            .chunks(self.width)
            .map(|row| row.iter().copied().map(color_of).collect())
            .collect()
    }

    /// Rescale both grids so their largest cell equals `max`, truncating to
    /// whole numbers. Empty grids are left untouched.
    pub fn normalize(&mut self, max: f64) {
        for kind in [HeatmapKind::Movement, HeatmapKind::Click] {
            let peak = self.max(kind);
            if peak <= 0.0 {
                continue;
            }
            for cell in self.cells_mut(kind) {
                *cell = (*cell / peak * max).floor();
            }
        }
    }

    /// Build a grid from a server snapshot. Rows and columns must agree with
    /// the declared resolution; negative cells are clamped to zero.
    pub fn from_payload(payload: &HeatmapPayload) -> Result<Self, ShapeError> {
        let Resolution { width, height } = payload.resolution;
        if width == 0 || height == 0 {
            return Err(ShapeError::EmptyResolution { width, height });
        }

        let movement = flatten("position", &payload.position_heatmap, width, height)?;
        let clicks = flatten("click", &payload.click_heatmap, width, height)?;
        Ok(Self { width, height, movement, clicks })
    }

    pub fn to_payload(&self) -> HeatmapPayload {
        HeatmapPayload {
            position_heatmap: self.snapshot(HeatmapKind::Movement),
            click_heatmap: self.snapshot(HeatmapKind::Click),
            resolution: self.resolution(),
        }
    }
}

fn flatten(grid: &'static str, rows: &[Vec<f64>], width: usize, height: usize) -> Result<Vec<f64>, ShapeError> {
    if rows.len() != height {
        return Err(ShapeError::Rows { grid, expected: height, actual: rows.len() });
    }

    // every row is checked before anything is reserved; the declared
    // resolution alone never sizes an allocation
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(ShapeError::Columns { grid, row: index, expected: width, actual: row.len() });
    }

    Ok(rows
        .iter()
        .flatten()
        .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_accumulates() {
        let mut grid = HeatmapGrid::new(4, 3);
        assert!(grid.ingest(HeatmapEvent::movement(1, 2, 2.5)));
        assert!(grid.ingest(HeatmapEvent::movement(1, 2, 1.5)));
        assert!(grid.ingest(HeatmapEvent::click(1, 2, 7.0)));

        assert_eq!(grid.cell(HeatmapKind::Movement, 1, 2), Some(4.0));
        assert_eq!(grid.cell(HeatmapKind::Click, 1, 2), Some(7.0));
        assert_eq!(grid.total(HeatmapKind::Movement), 4.0);
    }

    #[test]
    fn test_out_of_range_coordinates_are_clamped() {
        let mut grid = HeatmapGrid::new(4, 3);
        grid.ingest(HeatmapEvent::movement(99, 99, 1.0));
        grid.ingest(HeatmapEvent::movement(-5, -1, 1.0));
        assert_eq!(grid.cell(HeatmapKind::Movement, 3, 2), Some(1.0));
        assert_eq!(grid.cell(HeatmapKind::Movement, 0, 0), Some(1.0));
        assert_eq!(grid.cell(HeatmapKind::Movement, 4, 0), None);
    }

    #[test]
    fn test_bad_weights_are_rejected() {
        let mut grid = HeatmapGrid::new(2, 2);
        assert!(!grid.ingest(HeatmapEvent::click(0, 0, -1.0)));
        assert!(!grid.ingest(HeatmapEvent::click(0, 0, f64::NAN)));
        assert!(!grid.ingest(HeatmapEvent::click(0, 0, f64::INFINITY)));
        assert_eq!(grid.total(HeatmapKind::Click), 0.0);
    }

    #[test]
    fn test_snapshot_shape() {
        let mut grid = HeatmapGrid::new(3, 2);
        grid.ingest(HeatmapEvent::movement(2, 0, 5.0));
        let rows = grid.snapshot(HeatmapKind::Movement);
        assert_eq!(rows, vec![vec![0.0, 0.0, 5.0], vec![0.0, 0.0, 0.0]]);
        assert_eq!(grid.colored(HeatmapKind::Movement)[0][2], color_of(5.0));
    }

    #[test]
    fn test_normalize_to_display_range() {
        let mut grid = HeatmapGrid::new(2, 1);
        grid.ingest(HeatmapEvent::movement(0, 0, 10.0));
        grid.ingest(HeatmapEvent::movement(1, 0, 40.0));
        grid.normalize(100.0);
        assert_eq!(grid.snapshot(HeatmapKind::Movement), vec![vec![25.0, 100.0]]);
        assert_eq!(grid.max(HeatmapKind::Click), 0.0);
    }

    #[test]
    fn test_from_payload_validates_shape() {
        let mut payload = HeatmapPayload {
            position_heatmap: vec![vec![1.0, -2.0], vec![3.0, 4.0]],
            click_heatmap: vec![vec![0.0, 0.0], vec![0.0, 9.0]],
            resolution: Resolution { width: 2, height: 2 },
        };
        let grid = HeatmapGrid::from_payload(&payload).unwrap();
        assert_eq!(grid.cell(HeatmapKind::Movement, 1, 0), Some(0.0));
        assert_eq!(grid.cell(HeatmapKind::Click, 1, 1), Some(9.0));
        assert_eq!(grid.to_payload().resolution, payload.resolution);

        payload.click_heatmap[1].pop();
        assert_eq!(
            HeatmapGrid::from_payload(&payload),
            Err(ShapeError::Columns { grid: "click", row: 1, expected: 2, actual: 1 })
        );

        payload.position_heatmap.pop();
        assert!(matches!(HeatmapGrid::from_payload(&payload), Err(ShapeError::Rows { .. })));

        payload.resolution = Resolution { width: 0, height: 2 };
        assert!(matches!(
            HeatmapGrid::from_payload(&payload),
            Err(ShapeError::EmptyResolution { .. })
        ));
    }

    #[test]
    fn test_oversized_declared_resolution_is_rejected() {
        let payload = HeatmapPayload {
            position_heatmap: vec![vec![1.0]],
            click_heatmap: vec![vec![1.0]],
            resolution: Resolution { width: usize::MAX / 8, height: 1 },
        };
        assert_eq!(
            HeatmapGrid::from_payload(&payload),
            Err(ShapeError::Columns { grid: "position", row: 0, expected: usize::MAX / 8, actual: 1 })
        );

        let payload = HeatmapPayload {
            position_heatmap: vec![vec![1.0; 2]; 2],
            click_heatmap: vec![vec![1.0; 2]; 2],
            resolution: Resolution { width: usize::MAX, height: 2 },
        };
        assert!(matches!(HeatmapGrid::from_payload(&payload), Err(ShapeError::Columns { row: 0, .. })));
    }
}
