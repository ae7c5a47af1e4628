//! Axis-aligned bounding boxes

use crate::error::{Error, Result};
use crate::point::Point3d;
use serde::{Deserialize, Serialize};

/// Axis-aligned box stored as per-axis intervals `[x1, x2] x [y1, y2] x [z1, z2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
    pub z1: f64,
    pub z2: f64,
}

impl Aabb {
    /// Create a box from per-axis intervals
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64, z1: f64, z2: f64) -> Self {
        Self { x1, x2, y1, y2, z1, z2 }
    }

    /// Create a box from minimum and maximum corners
    pub fn from_min_max(min: [f64; 3], max: [f64; 3]) -> Result<Self> {
        for axis in 0..3 {
            if !(max[axis] >= min[axis]) {
                return Err(Error::InvalidData(format!(
                    "bounds maximum {} is below minimum {} on axis {}",
                    max[axis], min[axis], axis
                )));
            }
        }
        Ok(Self::new(min[0], max[0], min[1], max[1], min[2], max[2]))
    }

    pub fn min(&self) -> Point3d {
        Point3d::new(self.x1, self.y1, self.z1)
    }

    pub fn max(&self) -> Point3d {
        Point3d::new(self.x2, self.y2, self.z2)
    }

    /// Midpoint of each axis interval
    pub fn center(&self) -> Point3d {
        Point3d::new(
            self.x1 + (self.x2 - self.x1) / 2.0,
            self.y1 + (self.y2 - self.y1) / 2.0,
            self.z1 + (self.z2 - self.z1) / 2.0,
        )
    }

    pub fn size(&self) -> [f64; 3] {
        [self.x2 - self.x1, self.y2 - self.y1, self.z2 - self.z1]
    }

    /// Inclusive containment on every face
    pub fn contains(&self, p: &Point3d) -> bool {
        self.x1 <= p.x
            && p.x <= self.x2
            && self.y1 <= p.y
            && p.y <= self.y2
            && self.z1 <= p.z
            && p.z <= self.z2
    }

    /// Split at the midpoint of every axis.
    ///
    /// Child order is fixed and doubles as the tie-break order for points on
    /// a splitting plane:
    ///
    /// | idx | x    | y    | z    |
    /// |-----|------|------|------|
    /// | 0   | low  | low  | low  |
    /// | 1   | low  | high | low  |
    /// | 2   | low  | low  | high |
    /// | 3   | low  | high | high |
    /// | 4   | high | low  | high |
    /// | 5   | high | low  | low  |
    /// | 6   | high | high | low  |
    /// | 7   | high | high | high |
    pub fn octants(&self) -> [Aabb; 8] {
        let c = self.center();
        let (x1, x2, y1, y2, z1, z2) = (self.x1, self.x2, self.y1, self.y2, self.z1, self.z2);

        [
            Aabb::new(x1, c.x, y1, c.y, z1, c.z),
            Aabb::new(x1, c.x, c.y, y2, z1, c.z),
            Aabb::new(x1, c.x, y1, c.y, c.z, z2),
            Aabb::new(x1, c.x, c.y, y2, c.z, z2),
            Aabb::new(c.x, x2, y1, c.y, c.z, z2),
            Aabb::new(c.x, x2, y1, c.y, z1, c.z),
            Aabb::new(c.x, x2, c.y, y2, z1, c.z),
            Aabb::new(c.x, x2, c.y, y2, c.z, z2),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_min_max_rejects_inverted_axis() {
        let result = Aabb::from_min_max([0.0, 5.0, 0.0], [1.0, 4.0, 1.0]);
        assert!(result.is_err());

        let ok = Aabb::from_min_max([0.0, 0.0, 0.0], [0.0, 1.0, 2.0]).unwrap();
        assert_eq!(ok.size(), [0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = Aabb::new(0.0, 10.0, 0.0, 10.0, 0.0, 10.0);
        assert!(b.contains(&Point3d::new(0.0, 0.0, 0.0)));
        assert!(b.contains(&Point3d::new(10.0, 10.0, 10.0)));
        assert!(!b.contains(&Point3d::new(10.000001, 5.0, 5.0)));
    }

    #[test]
    fn test_octants_partition_box() {
        let b = Aabb::new(0.0, 10.0, 0.0, 10.0, 0.0, 10.0);
        let children = b.octants();

        assert_eq!(children[0], Aabb::new(0.0, 5.0, 0.0, 5.0, 0.0, 5.0));
        assert_eq!(children[7], Aabb::new(5.0, 10.0, 5.0, 10.0, 5.0, 10.0));

        let volume: f64 = children
            .iter()
            .map(|c| {
                let s = c.size();
                s[0] * s[1] * s[2]
            })
            .sum();
        assert_eq!(volume, 1000.0);

        // Every interior point lands in exactly one child
        let p = Point3d::new(7.0, 2.0, 8.0);
        let hits: Vec<usize> = (0..8).filter(|&i| children[i].contains(&p)).collect();
        assert_eq!(hits, vec![4]);
    }

    #[test]
    fn test_center_point_matches_first_octant() {
        let b = Aabb::new(0.0, 10.0, 0.0, 10.0, 0.0, 10.0);
        let children = b.octants();
        let first = (0..8).find(|&i| children[i].contains(&b.center()));
        assert_eq!(first, Some(0));
    }
}
