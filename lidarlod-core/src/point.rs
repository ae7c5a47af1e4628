//! Point types and related functionality

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Number of `f64` channels in a [`LodPoint`] on the wire
pub const LOD_POINT_CHANNELS: usize = 7;

/// One decoded LAS point record, before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointRecord {
    /// Raw integer position, multiply by the header scale to get meters
    pub position: [i32; 3],
    pub intensity: u16,
    pub classification: u8,
    /// RGB channels for formats that carry color
    pub color: Option<[u16; 3]>,
}

impl PointRecord {
    /// Scale the raw position by per-axis factors
    pub fn scaled_position(&self, scale: &[f64; 3]) -> Point3d {
        Point3d::new(
            self.position[0] as f64 * scale[0],
            self.position[1] as f64 * scale[1],
            self.position[2] as f64 * scale[2],
        )
    }
}

/// A renderable point tuple: position, normalised color and an alpha channel
/// carrying the raw intensity.
///
/// The layout is seven packed `f64`s, so a slice of points can be viewed as a
/// flat payload with [`LodPoint::as_flat`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct LodPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub alpha: f64,
}

impl LodPoint {
    /// Create a point tuple from its parts
    pub fn new(position: Point3d, color: [f64; 3], alpha: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            r: color[0],
            g: color[1],
            b: color[2],
            alpha,
        }
    }

    /// Position channels
    pub fn position(&self) -> Point3d {
        Point3d::new(self.x, self.y, self.z)
    }

    /// Color channels
    pub fn color(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Squared Euclidean distance between the position channels
    pub fn distance_squared(&self, other: &LodPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// View a slice of points as interleaved `f64` channels
    pub fn as_flat(points: &[LodPoint]) -> &[f64] {
        bytemuck::cast_slice(points)
    }

    /// Rebuild points from interleaved `f64` channels
    pub fn from_flat(values: &[f64]) -> Result<Vec<LodPoint>> {
        if values.len() % LOD_POINT_CHANNELS != 0 {
            return Err(Error::InvalidData(format!(
                "flat point buffer of {} values is not a multiple of {}",
                values.len(),
                LOD_POINT_CHANNELS
            )));
        }

        Ok(values
            .chunks_exact(LOD_POINT_CHANNELS)
            .map(|c| LodPoint {
                x: c[0],
                y: c[1],
                z: c[2],
                r: c[3],
                g: c[4],
                b: c[5],
                alpha: c[6],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaled_position() {
        let record = PointRecord {
            position: [100, -200, 300],
            intensity: 0,
            classification: 0,
            color: None,
        };
        let p = record.scaled_position(&[0.01, 0.01, 0.1]);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, -2.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_view_is_interleaved() {
        let points = vec![
            LodPoint::new(Point3d::new(1.0, 2.0, 3.0), [0.1, 0.2, 0.3], 10.0),
            LodPoint::new(Point3d::new(4.0, 5.0, 6.0), [0.4, 0.5, 0.6], 20.0),
        ];
        let flat = LodPoint::as_flat(&points);
        assert_eq!(flat.len(), 14);
        assert_eq!(flat[0], 1.0);
        assert_eq!(flat[6], 10.0);
        assert_eq!(flat[7], 4.0);
        assert_eq!(flat[13], 20.0);

        let rebuilt = LodPoint::from_flat(flat).unwrap();
        assert_eq!(rebuilt, points);
    }

    #[test]
    fn test_from_flat_rejects_ragged_buffer() {
        let result = LodPoint::from_flat(&[1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_distance_ignores_color_and_alpha() {
        let a = LodPoint::new(Point3d::new(0.0, 0.0, 0.0), [1.0, 1.0, 1.0], 500.0);
        let b = LodPoint::new(Point3d::new(1.0, 2.0, 2.0), [0.0, 0.0, 0.0], 0.0);
        assert_eq!(a.distance_squared(&b), 9.0);
    }
}
