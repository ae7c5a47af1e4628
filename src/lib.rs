//! # lidarlod
//!
//! Progressive LiDAR ingestion for Rust: decode LAS point records, bucket them
//! in a fixed-depth octree, reduce every leaf to a handful of k-means
//! centroids and stream the result to a client in bounded chunks.
//!
//! This is the umbrella crate. It re-exports the member crates and adds the
//! [`Pipeline`] that wires them together for one uploaded file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lidarlod::prelude::*;
//!
//! let options = ProcessingOptions::default().with_lod(true).with_seed(7);
//! let mut events: Vec<Event> = Vec::new();
//! let report = Pipeline::new(options).run_file("scan.las", &mut events)?;
//! println!("{} points became {}", report.points_read, report.points_after_clustering);
//! # Ok::<(), lidarlod::Error>(())
//! ```
//!
//! ## Crates
//!
//! - `io`: LAS header and record decoding, batched loading, optimised export
//! - `simplification`: octree, k-means, levels of detail, subsampling
//! - `transfer`: wire events, chunk streamer, client session, reconnect supervisor
//!
//! ## Feature Flags
//!
//! - `io-mmap`: memory-map large files instead of reading them into memory

pub mod pipeline;
pub mod util;

pub use lidarlod_core::*;

pub use lidarlod_io as io;
pub use lidarlod_simplification as simplification;
pub use lidarlod_transfer as transfer;

pub use pipeline::{IngestReport, Pipeline, ProcessingOptions, DEFAULT_GRANULARITY, DEFAULT_POINTS_IN_WINDOW};
pub use util::Timed;

/// Convenient imports for common use cases
pub mod prelude {
    pub use lidarlod_core::*;
    pub use lidarlod_io::*;
    pub use lidarlod_simplification::*;
    pub use lidarlod_transfer::*;

    pub use crate::pipeline::{IngestReport, Pipeline, ProcessingOptions};
}
