//! Spatial partitioning and point simplification
//!
//! This crate provides the pieces that reduce a decoded point cloud to a
//! renderable subset:
//! - A fixed-depth octree that buckets points by region
//! - K-means clustering of each populated leaf
//! - Coarser levels of detail built from the simplified leaves
//! - Density-driven random subsampling

pub mod kmeans;
pub mod lod;
pub mod octree;
pub mod subsample;

pub use kmeans::*;
pub use lod::*;
pub use octree::*;
pub use subsample::*;

use lidarlod_core::{LodPoint, Result};
use rand::RngCore;

/// Reduce a set of points to a representative subset
pub trait PointSimplifier {
    fn simplify_points(&self, points: &[LodPoint], rng: &mut dyn RngCore) -> Result<Vec<LodPoint>>;
}
