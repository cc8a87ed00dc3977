//! Stroke model: points, open strokes being drawn, and frozen strokes.

use serde::{Deserialize, Serialize};

/// A canvas-space coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A finished path. Immutable once built.
///
/// Serializes as `{"points": [{"x": .., "y": ..}, ..]}`, the shape shared by
/// the cleanup and diagram store payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(default)]
    points: Vec<Point>,
}

impl Stroke {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }
}

/// A stroke that is still being drawn. Append-only until [`OpenStroke::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenStroke {
    points: Vec<Point>,
}

impl OpenStroke {
    /// Start a stroke at its first point.
    pub fn begin(start: Point) -> Self {
        Self {
            points: vec![start],
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Last recorded point; the segment origin for the next `push`.
    pub fn last(&self) -> Point {
        // `begin` guarantees at least one point.
        self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Close the stroke. The result can no longer be extended.
    pub fn finish(self) -> Stroke {
        Stroke {
            points: self.points,
        }
    }
}

/// Total number of points across a stroke sequence.
pub fn point_count(strokes: &[Stroke]) -> usize {
    strokes.iter().map(Stroke::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_stroke_keeps_emission_order() {
        let mut open = OpenStroke::begin(Point::new(10.0, 10.0));
        open.push(Point::new(20.0, 20.0));
        open.push(Point::new(30.0, 30.0));
        assert_eq!(open.last(), Point::new(30.0, 30.0));

        let stroke = open.finish();
        assert_eq!(
            stroke.points(),
            &[
                Point::new(10.0, 10.0),
                Point::new(20.0, 20.0),
                Point::new(30.0, 30.0)
            ]
        );
    }

    #[test]
    fn test_stroke_wire_shape() {
        let stroke = Stroke::from_points(vec![Point::new(1.0, 2.5)]);
        let json = serde_json::to_value(&stroke).unwrap();
        assert_eq!(json, serde_json::json!({"points": [{"x": 1.0, "y": 2.5}]}));
    }

    #[test]
    fn test_stroke_missing_points_is_empty() {
        let stroke: Stroke = serde_json::from_str("{}").unwrap();
        assert!(stroke.is_empty());
        assert!(stroke.first().is_none());
    }

    #[test]
    fn test_point_count() {
        let strokes = vec![
            Stroke::from_points(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
            Stroke::from_points(vec![Point::new(5.0, 5.0)]),
        ];
        assert_eq!(point_count(&strokes), 3);
        assert_eq!(point_count(&[]), 0);
    }

    #[test]
    fn test_integer_coordinates_accepted() {
        let point: Point = serde_json::from_str(r#"{"x": 10, "y": -4}"#).unwrap();
        assert_eq!(point, Point::new(10.0, -4.0));
    }
}
