//! Core data structures for lidarlod
//!
//! This crate provides the fundamental types shared by the decoder, the
//! octree, the clustering engine and the transfer protocol: decoded point
//! records, renderable point tuples, axis-aligned boxes and the error type.

pub mod bounds;
pub mod classification;
pub mod error;
pub mod point;

pub use bounds::*;
pub use classification::*;
pub use error::*;
pub use point::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
