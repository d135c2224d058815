//! Core data types for the positioning system

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// A point in the shared 2D frame (centimeters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn from_vector(v: &Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (other.to_vector() - self.to_vector()).norm()
    }
}

/// Pin pair and mounting position of one range sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorGeometry {
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub position_x: f64,
    pub position_y: f64,
}

impl SensorGeometry {
    pub fn new(trigger_pin: u8, echo_pin: u8, position_x: f64, position_y: f64) -> Self {
        Self {
            trigger_pin,
            echo_pin,
            position_x,
            position_y,
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.position_x, self.position_y)
    }
}

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn is_high(self) -> bool {
        self == PinLevel::High
    }
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

/// Direction a digital pin is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDirection {
    Input,
    Output,
}
