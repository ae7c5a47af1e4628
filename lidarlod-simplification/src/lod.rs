//! Coarser levels of detail built on top of simplified leaves
//!
//! Each level merges the points of every populated node's children into
//! their parent and simplifies the merged set again. The first level works
//! on the leaves, the next one on the parents produced by the first, and so
//! on until the root is reached.

use crate::octree::{NodeId, Octree};
use crate::PointSimplifier;
use lidarlod_core::{LodPoint, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One generated level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub label: String,
    /// Camera distance from which the renderer should switch to this level
    pub render_distance: f64,
    /// Parent nodes the level was merged into
    pub nodes: Vec<NodeId>,
    pub points: Vec<LodPoint>,
}

/// Level labels and render distances, finest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodBuilder {
    levels: Vec<(String, f64)>,
}

impl Default for LodBuilder {
    fn default() -> Self {
        Self {
            levels: vec![("medium".to_string(), 200.0), ("low".to_string(), 400.0)],
        }
    }
}

impl LodBuilder {
    /// Builder with no levels
    pub fn empty() -> Self {
        Self { levels: Vec::new() }
    }

    /// Append a coarser level
    pub fn with_level(mut self, label: impl Into<String>, render_distance: f64) -> Self {
        self.levels.push((label.into(), render_distance));
        self
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Generate the configured levels from a simplified octree.
    ///
    /// Generation stops early once the merge reaches the root.
    pub fn build<S, R>(&self, octree: &Octree, simplifier: &S, rng: &mut R) -> Result<Vec<LodLevel>>
    where
        S: PointSimplifier + ?Sized,
        R: RngCore,
    {
        let mut current: BTreeMap<NodeId, Vec<LodPoint>> = octree
            .leaves()
            .iter()
            .filter_map(|&id| octree.leaf_points(id).map(|points| (id, points.to_vec())))
            .collect();

        let mut out = Vec::with_capacity(self.levels.len());
        for (label, render_distance) in &self.levels {
            let mut merged: BTreeMap<NodeId, Vec<LodPoint>> = BTreeMap::new();
            for (id, points) in current {
                if let Some(parent) = octree.parent(id) {
                    merged.entry(parent).or_default().extend(points);
                }
            }
            if merged.is_empty() {
                log::debug!("no parents left for lod level {}", label);
                break;
            }

            for points in merged.values_mut() {
                *points = simplifier.simplify_points(points, &mut *rng)?;
            }

            let level = LodLevel {
                label: label.clone(),
                render_distance: *render_distance,
                nodes: merged.keys().copied().collect(),
                points: merged.values().flatten().copied().collect(),
            };
            log::debug!(
                "lod level {} has {} points over {} nodes",
                level.label,
                level.points.len(),
                level.nodes.len()
            );
            out.push(level);
            current = merged;
        }

        Ok(out)
    }
}
