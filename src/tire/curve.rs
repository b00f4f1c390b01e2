// ==============================================================================
// curve.rs — PIECEWISE-LINEAR LOOKUP CURVES (TORQUE + TIRE GRIP)
// ------------------------------------------------------------------------------
// A Curve is an immutable list of (x, y) control points sorted by x, plus the x
// domain queries are clamped into:
// - Curve::new(...)        domain [0, 1]   (torque vs rpm/max_rpm, grip vs slip angle)
// - Curve::symmetric(...)  domain [-1, 1]  (grip vs signed slip ratio), built by
//                          mirroring the [0, 1] points through the origin in x
//
// evaluate(x):
// - clamps x into the domain
// - finds the nearest point at/below and at/above x
// - exact hit returns the stored y untouched
// - a missing side or zero-width bracket returns the side that exists
// - otherwise linear interpolation
//
// No error path: an empty curve evaluates to 0.0 (configs reject empty curves).
// ==============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for CurvePoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Vec<CurvePoint>,
    min_x: f32,
    max_x: f32,
}

impl Curve {
    /// Curve over the unit domain [0, 1].
    pub fn new(points: impl IntoIterator<Item = CurvePoint>) -> Self {
        Self::with_domain(points, 0.0, 1.0)
    }

    pub fn with_domain(points: impl IntoIterator<Item = CurvePoint>, min_x: f32, max_x: f32) -> Self {
        let mut points: Vec<CurvePoint> = points.into_iter().collect();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));

        let (min_x, max_x) = if min_x <= max_x { (min_x, max_x) } else { (max_x, min_x) };
        Self { points, min_x, max_x }
    }

    /// Even curve over [-1, 1]: x is reflected through zero, y is kept, since
    /// grip is a magnitude whichever way the tire slips.
    pub fn symmetric(points: impl IntoIterator<Item = CurvePoint>) -> Self {
        let half: Vec<CurvePoint> = points.into_iter().collect();
        let mirrored = half
            .iter()
            .filter(|p| p.x > 0.0)
            .map(|p| CurvePoint::new(-p.x, p.y));

        let all: Vec<CurvePoint> = half.iter().copied().chain(mirrored).collect();
        Self::with_domain(all, -1.0, 1.0)
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn domain(&self) -> (f32, f32) {
        (self.min_x, self.max_x)
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        // NaN input falls to the low end of the domain
        let (min_x, max_x) = self.domain();
        let x = if x.is_nan() { min_x } else { x.clamp(min_x, max_x) };

        let mut lower: Option<CurvePoint> = None;
        let mut upper: Option<CurvePoint> = None;

        for p in &self.points {
            if p.x == x {
                return p.y;
            }
            if p.x < x {
                lower = Some(*p);
            } else {
                upper = Some(*p);
                break;
            }
        }

        match (lower, upper) {
            (Some(lo), Some(hi)) => {
                let span = hi.x - lo.x;
                if span <= f32::EPSILON {
                    return lo.y;
                }
                let t = (x - lo.x) / span;
                lo.y + t * (hi.y - lo.y)
            }
            (Some(only), None) | (None, Some(only)) => only.y,
            (None, None) => 0.0,
        }
    }
}

// ==============================================================================
// Reference curves
// ==============================================================================

/// Normalised engine torque against rpm / max_rpm.
pub fn default_torque_points() -> Vec<CurvePoint> {
    vec![
        CurvePoint::new(0.0, 0.30),
        CurvePoint::new(0.15, 0.55),
        CurvePoint::new(0.30, 0.80),
        CurvePoint::new(0.50, 0.95),
        CurvePoint::new(0.65, 1.00),
        CurvePoint::new(0.80, 0.92),
        CurvePoint::new(0.95, 0.75),
        CurvePoint::new(1.00, 0.60),
    ]
}

/// Pacejka-shaped grip against normalised slip: rises steeply, peaks around
/// 0.15 and settles slightly below peak when fully sliding.
pub fn default_grip_points() -> Vec<CurvePoint> {
    vec![
        CurvePoint::new(0.0, 0.0),
        CurvePoint::new(0.05, 0.8),
        CurvePoint::new(0.1, 0.98),
        CurvePoint::new(0.15, 1.0),
        CurvePoint::new(0.5, 0.935),
        CurvePoint::new(1.0, 0.9),
    ]
}
