//! K-means clustering of leaf point sets
//!
//! Centroids aggregate position and color by mean and keep the **maximum**
//! alpha of their group, so bright returns survive simplification.

use crate::PointSimplifier;
use lidarlod_core::{Error, LodPoint, Point3d, Result, Vector3d};
use rand::seq::index::sample;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

// ============================================================
// Point abstraction
// ============================================================

/// A point that can be clustered by position.
pub trait ClusterPoint: Copy + Send + Sync {
    /// Position channels used for assignment
    fn coords(&self) -> [f64; 3];

    /// Representative of the points at `members`, which is never empty
    fn centroid(points: &[Self], members: &[usize]) -> Self;

    fn distance_squared_to(&self, other: &Self) -> f64 {
        let (a, b) = (self.coords(), other.coords());
        let (dx, dy, dz) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
        dx * dx + dy * dy + dz * dz
    }
}

impl ClusterPoint for LodPoint {
    fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn centroid(points: &[Self], members: &[usize]) -> Self {
        let n = members.len() as f64;
        let mut sum = [0.0; 6];
        let mut alpha = f64::NEG_INFINITY;

        for &i in members {
            let p = &points[i];
            for (acc, v) in sum.iter_mut().zip([p.x, p.y, p.z, p.r, p.g, p.b]) {
                *acc += v;
            }
            alpha = alpha.max(p.alpha);
        }

        LodPoint {
            x: sum[0] / n,
            y: sum[1] / n,
            z: sum[2] / n,
            r: sum[3] / n,
            g: sum[4] / n,
            b: sum[5] / n,
            alpha,
        }
    }
}

impl ClusterPoint for Point3d {
    fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn centroid(points: &[Self], members: &[usize]) -> Self {
        let sum = members
            .iter()
            .fold(Vector3d::zeros(), |acc, &i| acc + points[i].coords);
        Point3d::from(sum / members.len() as f64)
    }
}

// ============================================================
// Configuration
// ============================================================

/// How the number of clusters per leaf is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringStrategy {
    /// Always use the configured `k`
    #[default]
    Fixed,
    /// Pick `k` with [`KMeans::elbow`]
    Elbow,
}

/// Output of a clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult<P> {
    /// Member indices per centroid from the last assignment pass
    pub labels: Vec<Vec<usize>>,
    pub centroids: Vec<P>,
    /// Assignment passes performed
    pub iterations: usize,
    /// Within-cluster sum of squared distances
    pub cost: f64,
}

impl<P> ClusterResult<P> {
    fn empty() -> Self {
        Self {
            labels: Vec::new(),
            centroids: Vec::new(),
            iterations: 0,
            cost: 0.0,
        }
    }
}

/// Lloyd's k-means with random distinct-point seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub max_iterations: usize,
    pub strategy: ClusteringStrategy,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: 2,
            max_iterations: 50,
            strategy: ClusteringStrategy::Fixed,
        }
    }
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_strategy(mut self, strategy: ClusteringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    // ============================================================
    // Clustering
    // ============================================================

    /// Cluster `points` into `k` groups.
    ///
    /// Inputs of at most one point produce an empty result. Fewer points than
    /// `k` is an [`Error::InvalidDataset`]. Iteration stops once no centroid
    /// position changed (exact comparison) or after `max_iterations + 1`
    /// assignment passes.
    pub fn cluster<P, R>(&self, points: &[P], rng: &mut R) -> Result<ClusterResult<P>>
    where
        P: ClusterPoint,
        R: Rng + ?Sized,
    {
        Self::cluster_with_k(points, self.k, self.max_iterations, rng)
    }

    fn cluster_with_k<P, R>(
        points: &[P],
        k: usize,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<ClusterResult<P>>
    where
        P: ClusterPoint,
        R: Rng + ?Sized,
    {
        let n = points.len();
        if n <= 1 {
            return Ok(ClusterResult::empty());
        }
        if k == 0 || n < k {
            return Err(Error::InvalidDataset { points: n, k });
        }

        let mut centroids: Vec<P> = sample(rng, n, k).into_iter().map(|i| points[i]).collect();
        let mut labels: Vec<Vec<usize>> = Vec::new();
        let mut previous: Option<Vec<[f64; 3]>> = None;
        let mut iterations = 0;

        loop {
            if iterations > max_iterations {
                break;
            }
            if let Some(prev) = &previous {
                if centroids.iter().map(P::coords).eq(prev.iter().copied()) {
                    break;
                }
            }

            previous = Some(centroids.iter().map(P::coords).collect());
            iterations += 1;

            labels = assign(points, &centroids);
            centroids = labels
                .iter()
                .map(|members| {
                    if members.is_empty() {
                        points[rng.gen_range(0..n)]
                    } else {
                        P::centroid(points, members)
                    }
                })
                .collect();
        }

        let cost: f64 = labels
            .iter()
            .zip(&centroids)
            .flat_map(|(members, c)| members.iter().map(move |&i| points[i].distance_squared_to(c)))
            .sum();

        Ok(ClusterResult {
            labels,
            centroids,
            iterations,
            cost,
        })
    }

    /// Choose `k` by the elbow method and return that run.
    ///
    /// Runs k = 1..n/2 (exclusive, so never half the points) and keeps the k
    /// whose cost dropped the most relative to k - 1, with a zero cost standing
    /// in for k = 0. Fewer than six points always give k = 1.
    pub fn elbow<P, R>(&self, points: &[P], rng: &mut R) -> Result<ClusterResult<P>>
    where
        P: ClusterPoint,
        R: Rng + ?Sized,
    {
        let n = points.len();
        if n <= 1 {
            return Ok(ClusterResult::empty());
        }

        let candidates = (n / 2).saturating_sub(1).max(1);
        let mut runs = Vec::with_capacity(candidates);
        for k in 1..=candidates {
            runs.push(Self::cluster_with_k(points, k, self.max_iterations, rng)?);
        }

        let mut best = 0;
        let mut best_drop = f64::NEG_INFINITY;
        let mut previous = 0.0;
        for (i, run) in runs.iter().enumerate() {
            let drop = previous - run.cost;
            if drop > best_drop {
                best_drop = drop;
                best = i;
            }
            previous = run.cost;
        }

        log::trace!("elbow picked k = {} of {} candidates", best + 1, runs.len());
        Ok(runs.swap_remove(best))
    }

    /// Replace `points` by their centroids.
    ///
    /// A set of at most one point is returned unchanged.
    pub fn simplify<P, R>(&self, points: &[P], rng: &mut R) -> Result<Vec<P>>
    where
        P: ClusterPoint,
        R: Rng + ?Sized,
    {
        if points.len() <= 1 {
            return Ok(points.to_vec());
        }
        let result = match self.strategy {
            ClusteringStrategy::Fixed => self.cluster(points, rng)?,
            ClusteringStrategy::Elbow => self.elbow(points, rng)?,
        };
        Ok(result.centroids)
    }
}

impl PointSimplifier for KMeans {
    fn simplify_points(&self, points: &[LodPoint], rng: &mut dyn RngCore) -> Result<Vec<LodPoint>> {
        self.simplify(points, rng)
    }
}

/// Nearest-centroid labelling over position channels; the lowest index wins ties
fn assign<P: ClusterPoint>(points: &[P], centroids: &[P]) -> Vec<Vec<usize>> {
    let mut labels = vec![Vec::new(); centroids.len()];

    for (i, p) in points.iter().enumerate() {
        let mut closest = 0;
        let mut closest_distance = p.distance_squared_to(&centroids[0]);
        for (j, c) in centroids.iter().enumerate().skip(1) {
            let d = p.distance_squared_to(c);
            if d < closest_distance {
                closest_distance = d;
                closest = j;
            }
        }
        labels[closest].push(i);
    }

    labels
}
