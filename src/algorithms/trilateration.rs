//! Two-circle trilateration
//!
//! Each sensor distance defines a circle around that sensor. The circles meet
//! in up to two points mirrored across the sensor axis; one of them is picked
//! with a fixed rule and shifted into canvas coordinates.

use crate::core::{Point2D, SensorGeometry, FRAME_OFFSET_CM};
use nalgebra::Vector2;
use std::cmp::Ordering;
use thiserror::Error;

/// Sensor layouts that cannot be triangulated at all
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("both sensors are mounted at ({x}, {y})")]
    CoincidentSensors { x: f64, y: f64 },

    #[error("sensor position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f64, y: f64 },
}

/// Why an intersection produced no point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DegenerateReason {
    /// A distance was negative, NaN or infinite
    InvalidDistance { dist1: f64, dist2: f64 },
}

/// Chosen intersection point with the height of the intersection triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Selected point in canvas coordinates
    pub point: Point2D,
    /// Squared distance from the sensor axis, after clamping (always >= 0)
    pub h_squared: f64,
    /// The circles did not intersect and `h²` was clamped to zero
    pub clamped: bool,
}

/// Outcome of intersecting the two distance circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntersectionResult {
    Point(Fix),
    Degenerate(DegenerateReason),
}

impl IntersectionResult {
    pub fn point(&self) -> Option<Point2D> {
        match self {
            IntersectionResult::Point(fix) => Some(fix.point),
            IntersectionResult::Degenerate(_) => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, IntersectionResult::Degenerate(_))
    }
}

/// Both mirror-image intersection candidates before selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidates {
    pub first: Point2D,
    pub second: Point2D,
    pub h_squared: f64,
    pub clamped: bool,
}

impl Candidates {
    /// The candidate with the lexicographically greater `(x, y)`
    pub fn select(&self) -> Point2D {
        match lexicographic(&self.first, &self.second) {
            Ordering::Less => self.second,
            _ => self.first,
        }
    }
}

fn lexicographic(a: &Point2D, b: &Point2D) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// Intersects the distance circles of a fixed pair of sensors
///
/// The sensor baseline is computed once at construction; a zero baseline is
/// rejected there and never reaches [`intersect`](Trilaterator::intersect).
#[derive(Debug, Clone)]
pub struct Trilaterator {
    sensor_one: Vector2<f64>,
    axis: Vector2<f64>,
    baseline: f64,
    frame_offset: Vector2<f64>,
}

impl Trilaterator {
    /// Trilaterator with the default (100, 100) canvas offset
    pub fn new(geometry: &[SensorGeometry; 2]) -> Result<Self, GeometryError> {
        Self::with_frame_offset(
            geometry,
            Point2D::new(FRAME_OFFSET_CM.0, FRAME_OFFSET_CM.1),
        )
    }

    pub fn with_frame_offset(
        geometry: &[SensorGeometry; 2],
        frame_offset: Point2D,
    ) -> Result<Self, GeometryError> {
        for sensor in geometry {
            if !sensor.position_x.is_finite() || !sensor.position_y.is_finite() {
                return Err(GeometryError::NonFinitePosition {
                    x: sensor.position_x,
                    y: sensor.position_y,
                });
            }
        }

        let sensor_one = geometry[0].position().to_vector();
        let axis = geometry[1].position().to_vector() - sensor_one;
        let baseline = axis.norm();
        if baseline == 0.0 {
            return Err(GeometryError::CoincidentSensors {
                x: sensor_one.x,
                y: sensor_one.y,
            });
        }

        Ok(Self {
            sensor_one,
            axis,
            baseline,
            frame_offset: frame_offset.to_vector(),
        })
    }

    /// Distance between the two sensor centers
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn frame_offset(&self) -> Point2D {
        Point2D::from_vector(&self.frame_offset)
    }

    /// Both intersection candidates, in canvas coordinates
    ///
    /// Returns `None` for negative or non-finite distances.
    pub fn candidates(&self, dist1: f64, dist2: f64) -> Option<Candidates> {
        if !valid_distance(dist1) || !valid_distance(dist2) {
            return None;
        }

        let d = self.baseline;
        // Signed distance from sensor one to the foot of the chord
        let a = (dist1 * dist1 - dist2 * dist2 + d * d) / (2.0 * d);
        let raw_h_squared = dist1 * dist1 - a * a;
        let clamped = raw_h_squared < 0.0;
        let h_squared = raw_h_squared.max(0.0);
        let h = h_squared.sqrt();

        let base = self.sensor_one + self.axis * (a / d);
        let offset = Vector2::new(-self.axis.y, self.axis.x) * (h / d);

        let first = base + offset + self.frame_offset;
        let second = base - offset + self.frame_offset;

        Some(Candidates {
            first: Point2D::from_vector(&first),
            second: Point2D::from_vector(&second),
            h_squared,
            clamped,
        })
    }

    /// Intersect the circles of radius `dist1` and `dist2` and pick one point
    pub fn intersect(&self, dist1: f64, dist2: f64) -> IntersectionResult {
        match self.candidates(dist1, dist2) {
            Some(candidates) => IntersectionResult::Point(Fix {
                point: candidates.select(),
                h_squared: candidates.h_squared,
                clamped: candidates.clamped,
            }),
            None => IntersectionResult::Degenerate(DegenerateReason::InvalidDistance { dist1, dist2 }),
        }
    }
}

fn valid_distance(distance: f64) -> bool {
    distance.is_finite() && distance >= 0.0
}
