//! Stroke cleanup transform: grid snapping plus point thinning.
//!
//! Turns scribbles into cleaner, more geometric lines:
//! - every kept coordinate is snapped to a coarse grid;
//! - each stroke keeps its first point, its last point and every Nth point;
//! - strokes without points are dropped.

use serde::{Deserialize, Serialize};

use crate::stroke::{Point, Stroke};

/// Default grid spacing in canvas units.
pub const DEFAULT_GRID: f64 = 40.0;

/// Default thinning stride (keep every 5th point).
pub const DEFAULT_STRIDE: usize = 5;

/// Request and response body of the cleanup exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokeSet {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

/// Tunables for [`cleanup_strokes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupParams {
    pub grid: f64,
    pub stride: usize,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            stride: DEFAULT_STRIDE,
        }
    }
}

/// Snap a single value to the nearest grid line (ties to even).
pub fn snap(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round_ties_even() * grid
}

/// Run the cleanup transform over a stroke set.
pub fn cleanup_strokes(strokes: &[Stroke], params: CleanupParams) -> Vec<Stroke> {
    let stride = params.stride.max(1);

    strokes
        .iter()
        .filter(|s| !s.is_empty())
        .map(|stroke| {
            let last = stroke.len() - 1;
            let simplified = stroke
                .points()
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx == 0 || *idx == last || idx % stride == 0)
                .map(|(_, p)| Point::new(snap(p.x, params.grid), snap(p.y, params.grid)))
                .collect();
            Stroke::from_points(simplified)
        })
        .collect()
}
