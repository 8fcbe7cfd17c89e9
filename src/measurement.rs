//! On-image measurements in physical units.
//!
//! Points are pixel coordinates on the displayed plane (`x` along columns,
//! `y` along rows). Pixel spacing is given per axis as `(column, row)` in
//! millimeters and scales each axis independently, so anisotropic planes
//! (sagittal and coronal cuts through thick slices) measure correctly.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Distance,
    Angle,
    Area,
}

impl MeasurementKind {
    /// Minimum number of points needed to compute a value.
    pub fn required_points(self) -> usize {
        match self {
            MeasurementKind::Distance => 2,
            MeasurementKind::Angle | MeasurementKind::Area => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "mm")]
    Millimeters,
    #[serde(rename = "pixels")]
    Pixels,
    #[serde(rename = "mm²")]
    SquareMillimeters,
    #[serde(rename = "pixels²")]
    SquarePixels,
    #[serde(rename = "deg")]
    Degrees,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Millimeters => "mm",
            Unit::Pixels => "pixels",
            Unit::SquareMillimeters => "mm²",
            Unit::SquarePixels => "pixels²",
            Unit::Degrees => "deg",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub points: Vec<Point>,
    pub value: f32,
    pub unit: Unit,
}

impl Measurement {
    /// Compute a measurement from a complete point list.
    ///
    /// Returns `None` if the point count does not fit `kind`: distance takes
    /// exactly two points, angle exactly three (ray end, vertex, ray end),
    /// area three or more.
    pub fn compute(
        kind: MeasurementKind,
        points: Vec<Point>,
        spacing: Option<(f32, f32)>,
    ) -> Option<Self> {
        let (value, unit) = match (kind, points.as_slice()) {
            (MeasurementKind::Distance, [p0, p1]) => (
                distance(*p0, *p1, spacing),
                if spacing.is_some() {
                    Unit::Millimeters
                } else {
                    Unit::Pixels
                },
            ),
            (MeasurementKind::Angle, [a, vertex, b]) => {
                (angle(*a, *vertex, *b, spacing), Unit::Degrees)
            }
            (MeasurementKind::Area, polygon) if polygon.len() >= 3 => (
                polygon_area(polygon, spacing),
                if spacing.is_some() {
                    Unit::SquareMillimeters
                } else {
                    Unit::SquarePixels
                },
            ),
            _ => return None,
        };
        Some(Self {
            kind,
            points,
            value,
            unit,
        })
    }
}

fn scale(spacing: Option<(f32, f32)>) -> (f32, f32) {
    spacing.unwrap_or((1.0, 1.0))
}

/// Euclidean distance, each axis scaled by its spacing.
pub fn distance(p0: Point, p1: Point, spacing: Option<(f32, f32)>) -> f32 {
    let (sx, sy) = scale(spacing);
    let dx = (p1.x - p0.x) * sx;
    let dy = (p1.y - p0.y) * sy;
    dx.hypot(dy)
}

/// Angle at `vertex` between the rays to `a` and `b`, in degrees within
/// `[0, 180]`. A zero-length ray gives 0.
pub fn angle(a: Point, vertex: Point, b: Point, spacing: Option<(f32, f32)>) -> f32 {
    let (sx, sy) = scale(spacing);
    let (ax, ay) = ((a.x - vertex.x) * sx, (a.y - vertex.y) * sy);
    let (bx, by) = ((b.x - vertex.x) * sx, (b.y - vertex.y) * sy);
    let cross = ax * by - ay * bx;
    let dot = ax * bx + ay * by;
    cross.abs().atan2(dot).to_degrees()
}

/// Shoelace area of the closed polygon through `points`.
pub fn polygon_area(points: &[Point], spacing: Option<(f32, f32)>) -> f32 {
    let (sx, sy) = scale(spacing);
    let twice_area: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x * q.y - q.x * p.y)
        .sum();
    twice_area.abs() / 2.0 * sx * sy
}

/// Click accumulator and measurement list for one viewport.
#[derive(Debug, Default)]
pub struct MeasurementEngine {
    active_tool: Option<MeasurementKind>,
    pending: Vec<Point>,
    spacing: Option<(f32, f32)>,
    measurements: Vec<Measurement>,
}

impl MeasurementEngine {
    pub fn new(spacing: Option<(f32, f32)>) -> Self {
        Self {
            spacing,
            ..Default::default()
        }
    }

    pub fn active_tool(&self) -> Option<MeasurementKind> {
        self.active_tool
    }

    /// Switch tools. Points collected for the previous tool are dropped.
    pub fn select_tool(&mut self, tool: Option<MeasurementKind>) {
        self.active_tool = tool;
        self.pending.clear();
    }

    pub fn spacing(&self) -> Option<(f32, f32)> {
        self.spacing
    }

    /// Applies to measurements completed after the call.
    pub fn set_spacing(&mut self, spacing: Option<(f32, f32)>) {
        self.spacing = spacing;
    }

    pub fn pending_points(&self) -> &[Point] {
        &self.pending
    }

    /// Record a click. Returns the measurement it completed, if any.
    ///
    /// Distance completes on the second point and angle on the third. Area
    /// keeps collecting until [`MeasurementEngine::close_polygon`]. Clicks
    /// without an active tool and non-finite points are ignored.
    pub fn add_point(&mut self, point: Point) -> Option<&Measurement> {
        let tool = self.active_tool?;
        if !point.is_finite() {
            return None;
        }
        self.pending.push(point);
        match tool {
            MeasurementKind::Distance | MeasurementKind::Angle
                if self.pending.len() == tool.required_points() =>
            {
                self.complete(tool)
            }
            _ => None,
        }
    }

    /// Finish the pending area polygon. Ignored with fewer than three points.
    pub fn close_polygon(&mut self) -> Option<&Measurement> {
        match self.active_tool {
            Some(MeasurementKind::Area)
                if self.pending.len() >= MeasurementKind::Area.required_points() =>
            {
                self.complete(MeasurementKind::Area)
            }
            _ => None,
        }
    }

    pub fn cancel_pending(&mut self) {
        self.pending.clear();
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Drop every recorded measurement and any pending points.
    pub fn clear(&mut self) {
        self.measurements.clear();
        self.pending.clear();
    }

    fn complete(&mut self, tool: MeasurementKind) -> Option<&Measurement> {
        let points = std::mem::take(&mut self.pending);
        let measurement = Measurement::compute(tool, points, self.spacing)?;
        self.measurements.push(measurement);
        self.measurements.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn measure(engine: &mut MeasurementEngine, points: &[(f32, f32)]) -> Option<Measurement> {
        let mut last = None;
        for &(x, y) in points {
            last = engine.add_point(Point::new(x, y)).cloned();
        }
        last
    }

    #[test]
    fn distance_without_spacing_is_in_pixels() {
        let mut engine = MeasurementEngine::new(None);
        engine.select_tool(Some(MeasurementKind::Distance));
        let m = measure(&mut engine, &[(0.0, 0.0), (3.0, 4.0)]).unwrap();
        assert_relative_eq!(m.value, 5.0);
        assert_eq!(m.unit.as_str(), "pixels");
        assert_eq!(m.points.len(), 2);
    }

    #[test]
    fn distance_with_spacing_is_in_mm() {
        let mut engine = MeasurementEngine::new(Some((2.0, 2.0)));
        engine.select_tool(Some(MeasurementKind::Distance));
        let m = measure(&mut engine, &[(0.0, 0.0), (3.0, 4.0)]).unwrap();
        assert_relative_eq!(m.value, 10.0);
        assert_eq!(m.unit, Unit::Millimeters);
    }

    #[test]
    fn anisotropic_spacing_scales_each_axis() {
        let d = distance(Point::new(0.0, 0.0), Point::new(3.0, 2.0), Some((1.0, 2.0)));
        assert_relative_eq!(d, 5.0);
    }

    #[test]
    fn first_point_does_not_complete() {
        let mut engine = MeasurementEngine::new(None);
        engine.select_tool(Some(MeasurementKind::Distance));
        assert!(engine.add_point(Point::new(1.0, 1.0)).is_none());
        assert_eq!(engine.pending_points().len(), 1);
        assert!(engine.measurements().is_empty());
    }

    #[test]
    fn clicks_without_tool_are_ignored() {
        let mut engine = MeasurementEngine::new(None);
        assert!(engine.add_point(Point::new(1.0, 1.0)).is_none());
        assert!(engine.pending_points().is_empty());
        engine.select_tool(Some(MeasurementKind::Distance));
        assert!(engine.add_point(Point::new(f32::NAN, 1.0)).is_none());
        assert!(engine.pending_points().is_empty());
    }

    #[test]
    fn right_angle() {
        let mut engine = MeasurementEngine::new(None);
        engine.select_tool(Some(MeasurementKind::Angle));
        let m = measure(&mut engine, &[(5.0, 0.0), (0.0, 0.0), (0.0, 7.0)]).unwrap();
        assert_relative_eq!(m.value, 90.0, epsilon = 1e-4);
        assert_eq!(m.unit, Unit::Degrees);
    }

    #[test]
    fn angle_accounts_for_spacing() {
        // 45 degrees in pixels, steeper once rows are twice as tall
        let a = angle(
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Some((1.0, 2.0)),
        );
        assert_relative_eq!(a, 2.0_f32.atan().to_degrees(), epsilon = 1e-4);
    }

    #[test]
    fn area_needs_explicit_close() {
        let mut engine = MeasurementEngine::new(Some((0.5, 0.5)));
        engine.select_tool(Some(MeasurementKind::Area));
        assert!(measure(&mut engine, &[(0.0, 0.0), (4.0, 0.0)]).is_none());
        assert!(engine.close_polygon().is_none());
        assert!(measure(&mut engine, &[(4.0, 4.0), (0.0, 4.0)]).is_none());
        let m = engine.close_polygon().cloned().unwrap();
        assert_relative_eq!(m.value, 4.0);
        assert_eq!(m.unit, Unit::SquareMillimeters);
        assert!(engine.pending_points().is_empty());
    }

    #[test]
    fn polygon_area_ignores_winding() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 3.0),
            Point::new(3.0, 3.0),
            Point::new(3.0, 0.0),
        ];
        assert_relative_eq!(polygon_area(&square, None), 9.0);
    }

    #[test]
    fn compute_rejects_wrong_point_count() {
        let points = vec![Point::new(0.0, 0.0); 3];
        assert!(Measurement::compute(MeasurementKind::Distance, points, None).is_none());
        let two = vec![Point::default(); 2];
        assert!(Measurement::compute(MeasurementKind::Area, two, None).is_none());
    }

    #[test]
    fn list_is_append_only_until_cleared() {
        let mut engine = MeasurementEngine::new(None);
        engine.select_tool(Some(MeasurementKind::Distance));
        measure(&mut engine, &[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0), (0.0, 2.0)]);
        assert_eq!(engine.measurements().len(), 2);
        assert_relative_eq!(engine.measurements()[0].value, 1.0);
        engine.select_tool(Some(MeasurementKind::Angle));
        assert_eq!(engine.measurements().len(), 2);
        engine.clear();
        assert!(engine.measurements().is_empty());
    }
}
