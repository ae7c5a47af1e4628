//! Ingestion pipeline
//!
//! Turns the bytes of one uploaded LAS file into a stream of protocol events.
//! Without clustering every decoded point (or a random subset of them) is
//! streamed window by window. With clustering the points are bucketed into
//! an octree, each leaf is reduced to a few centroids, and only those are
//! streamed, optionally followed by coarser levels of detail and an
//! optimised copy of the file.

use crate::util::Timed;
use lidarlod_core::{Error, LodPoint, Result};
use lidarlod_io::{LasLoader, LasSource, LasWriter, OptimisedWriteOptions, WorldTransform};
use lidarlod_simplification::{ClusteringStrategy, DensitySubsampler, KMeans, LodBuilder, Octree};
use lidarlod_transfer::{estimate_total_chunks, ChunkStreamer, MessageSink};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Points decoded per window unless configured otherwise
pub const DEFAULT_POINTS_IN_WINDOW: usize = 100_000;

/// Octree depth used by the server
pub const DEFAULT_GRANULARITY: u32 = 8;

// ============================================================
// Options
// ============================================================

/// Per-upload processing switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Replace each octree leaf by its k-means centroids
    pub clustering: bool,
    /// Randomly drop points before anything else happens
    pub subsample: bool,
    /// Subsampling density in 0..=100
    pub density: f64,
    /// Send coarser levels of detail after the clustered points
    pub lod: bool,
    /// Octree depth
    pub granularity: u32,
    /// Records decoded per batch
    pub points_in_window: usize,
    pub strategy: ClusteringStrategy,
    /// Fixed seed for reproducible runs; fresh entropy when absent
    pub seed: Option<u64>,
    /// Cluster octree leaves on the rayon pool
    pub parallel: bool,
    /// Add the header offset to decoded positions
    pub use_header_offset: bool,
    /// Where to write the optimised LAS file, if anywhere
    pub optimised_output: Option<PathBuf>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            clustering: true,
            subsample: false,
            density: 50.0,
            lod: false,
            granularity: DEFAULT_GRANULARITY,
            points_in_window: DEFAULT_POINTS_IN_WINDOW,
            strategy: ClusteringStrategy::Fixed,
            seed: None,
            parallel: false,
            use_header_offset: false,
            optimised_output: None,
        }
    }
}

impl ProcessingOptions {
    /// Stream every decoded point without building a tree
    pub fn pass_through() -> Self {
        Self {
            clustering: false,
            ..Self::default()
        }
    }

    /// Parse options sent as JSON; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn with_clustering(mut self, clustering: bool) -> Self {
        self.clustering = clustering;
        self
    }

    pub fn with_subsample(mut self, density: f64) -> Self {
        self.subsample = true;
        self.density = density;
        self
    }

    pub fn with_lod(mut self, lod: bool) -> Self {
        self.lod = lod;
        self
    }

    pub fn with_granularity(mut self, granularity: u32) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_points_in_window(mut self, points: usize) -> Self {
        self.points_in_window = points;
        self
    }

    pub fn with_strategy(mut self, strategy: ClusteringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_header_offset(mut self, use_offset: bool) -> Self {
        self.use_header_offset = use_offset;
        self
    }

    pub fn with_optimised_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.optimised_output = Some(path.into());
        self
    }

    fn subsampler(&self) -> Result<Option<DensitySubsampler>> {
        if self.subsample {
            DensitySubsampler::new(self.density).map(Some)
        } else {
            Ok(None)
        }
    }
}

// ============================================================
// Report
// ============================================================

/// Counters from one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records decoded from the file
    pub points_read: usize,
    /// Points that survived subsampling and went into the tree or the stream
    pub points_kept: usize,
    /// Kept points that fell outside the octree bounds
    pub stray_points: usize,
    /// Centroids streamed after clustering
    pub points_after_clustering: usize,
    pub chunks_sent: usize,
    pub lod_levels: usize,
    /// Records in the optimised file, when one was written
    pub points_written: Option<usize>,
}

// ============================================================
// Pipeline
// ============================================================

/// Runs one upload through decode, partition, simplify and stream.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: ProcessingOptions,
}

impl Pipeline {
    pub fn new(options: ProcessingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// Process a LAS file from disk
    pub fn run_file<P: AsRef<Path>, S: MessageSink>(&self, path: P, sink: S) -> Result<IngestReport> {
        let source = LasSource::open(path)?;
        self.run(source, sink)
    }

    /// Process an in-memory LAS file, writing every event to `sink`.
    ///
    /// The `headers` event is sent before any point is decoded and `done` is
    /// sent last. A decode or clustering failure stops the run and is returned
    /// without sending `done`.
    pub fn run<B: AsRef<[u8]>, S: MessageSink>(&self, bytes: B, sink: S) -> Result<IngestReport> {
        let _t = Timed::info("Ingestion");
        let options = &self.options;
        let mut streamer = ChunkStreamer::new(sink);
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        streamer.send_progress("Parsing point cloud file...")?;
        let mut loader = LasLoader::new(bytes)?;
        let header = loader.header().clone();
        streamer.send_headers(&header)?;

        let mut transform = WorldTransform::from_header(&header);
        if options.use_header_offset {
            transform = transform.with_header_offset(&header);
        }
        let sampler = options.subsampler()?;
        let window = options.points_in_window.clamp(1, loader.point_count().max(1));

        let report = if options.clustering {
            self.cluster_and_stream(&mut loader, &transform, sampler, window, &mut rng, &mut streamer)?
        } else {
            // subsampling makes the frame count unknowable up front
            let total_chunks = if sampler.is_some() {
                0
            } else {
                estimate_total_chunks(&header, window)
            };
            Self::stream_windows(&mut loader, &transform, sampler, window, total_chunks, &mut rng, &mut streamer)?
        };

        streamer.send_done()?;
        let streamed = if options.clustering {
            report.points_after_clustering
        } else {
            report.points_kept
        };
        log::info!(
            "ingested {} points, streamed {} in {} chunks",
            report.points_read,
            streamed,
            report.chunks_sent
        );
        Ok(report)
    }

    fn stream_windows<B: AsRef<[u8]>, S: MessageSink>(
        loader: &mut LasLoader<B>,
        transform: &WorldTransform,
        sampler: Option<DensitySubsampler>,
        window: usize,
        total_chunks: usize,
        rng: &mut StdRng,
        streamer: &mut ChunkStreamer<S>,
    ) -> Result<IngestReport> {
        let _t = Timed::debug("Streaming windows");
        let mut report = IngestReport::default();
        let mut points = Vec::with_capacity(window);

        for batch in loader.batches(window, 1) {
            points.clear();
            for record in batch.iter() {
                let record = record?;
                report.points_read += 1;
                if sampler.map_or(true, |s| s.keep(&mut *rng)) {
                    points.push(transform.lod_point(&record));
                }
            }
            report.points_kept += points.len();
            report.chunks_sent += streamer.send_flat(LodPoint::as_flat(&points), total_chunks)?;
        }

        Ok(report)
    }

    fn cluster_and_stream<B: AsRef<[u8]>, S: MessageSink>(
        &self,
        loader: &mut LasLoader<B>,
        transform: &WorldTransform,
        sampler: Option<DensitySubsampler>,
        window: usize,
        rng: &mut StdRng,
        streamer: &mut ChunkStreamer<S>,
    ) -> Result<IngestReport> {
        let options = &self.options;
        let mut report = IngestReport::default();
        let mut octree = Octree::new(options.granularity, transform.world_bounds())?;

        {
            let _t = Timed::debug("Octree build");
            for batch in loader.batches(window, 1) {
                for record in batch.iter() {
                    let record = record?;
                    report.points_read += 1;
                    if sampler.map_or(true, |s| s.keep(&mut *rng)) {
                        octree.insert(transform.lod_point(&record));
                        report.points_kept += 1;
                    }
                }
            }
        }
        report.stray_points = octree.stray_points();
        if report.stray_points > 0 {
            log::warn!("{} points fell outside the header bounds", report.stray_points);
        }

        streamer.send_progress("Optimizing data...")?;
        log::info!(
            "{} points in {} leaves before clustering",
            octree.leaf_point_count(),
            octree.leaves().len()
        );

        streamer.send_progress("Clustering points...")?;
        let engine = KMeans::default().with_strategy(options.strategy);
        {
            let _t = Timed::info("Clustering");
            if options.parallel {
                octree.simplify_parallel(&engine, rng.next_u64())?;
            } else {
                octree.simplify(&engine, &mut *rng)?;
            }
        }

        let simplified = octree.collect_points();
        report.points_after_clustering = simplified.len();
        report.chunks_sent = streamer.send_points(&simplified)?;

        if options.lod {
            let levels = LodBuilder::default().build(&octree, &engine, &mut *rng)?;
            for level in &levels {
                streamer.send_lod(&level.points, level.render_distance, level.label.as_str())?;
            }
            report.lod_levels = levels.len();
        }

        if let Some(path) = &options.optimised_output {
            let written = LasWriter::write_optimised(
                path,
                loader.header_bytes(),
                transform,
                &simplified,
                &OptimisedWriteOptions::default(),
            )?;
            log::info!("wrote {} optimised records to {}", written, path.display());
            streamer.send_file_ready(path.display().to_string())?;
            report.points_written = Some(written);
        }

        Ok(report)
    }
}
