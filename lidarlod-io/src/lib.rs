//! LAS decoding and writing for lidarlod
//!
//! This crate reads the LAS public header, decodes point records for formats
//! 0 through 3 in bounded batches, and writes records back out, including the
//! optimised export of simplified points.

pub mod format;
pub mod header;
pub mod loader;
pub mod mmap;
pub mod writer;

pub use format::{decoder_for, PointDecoder, PointFormat};
pub use header::{LasHeader, LasVersion, WorldTransform, HEADER_BASE, HEADER_LEN, MAX_SUPPORTED_VERSION};
pub use loader::{Batches, LasLoader, PointBatch};
pub use mmap::LasSource;
pub use writer::{LasWriter, OptimisedWriteOptions};

use lidarlod_core::Result;
use std::path::Path;

/// Open a LAS file and parse its header
pub fn open_las<P: AsRef<Path>>(path: P) -> Result<LasLoader<LasSource>> {
    let source = LasSource::open(path)?;
    LasLoader::new(source)
}
