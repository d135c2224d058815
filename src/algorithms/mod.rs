//! Core positioning algorithms

pub mod trilateration;

pub use trilateration::{
    Candidates, DegenerateReason, Fix, GeometryError, IntersectionResult, Trilaterator,
};
