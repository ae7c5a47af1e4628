//! Run a LAS file through the ingestion pipeline and summarise the stream.
//!
//! ```text
//! ingest scan.las --granularity 6 --lod --optimised scan_optimised.las
//! ingest scan.las --no-clustering --subsample 30 --events events.jsonl
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use lidarlod::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Decode, partition, simplify and stream a LAS point cloud")]
struct Args {
    /// LAS file to process
    input: PathBuf,

    /// JSON file with processing options; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Stream raw points instead of k-means centroids
    #[arg(long)]
    no_clustering: bool,

    /// Randomly subsample with this density (0-100)
    #[arg(long)]
    subsample: Option<f64>,

    /// Send medium and low levels of detail
    #[arg(long)]
    lod: bool,

    /// Octree depth
    #[arg(short, long)]
    granularity: Option<u32>,

    /// Pick k per leaf with the elbow method (slow on dense leaves)
    #[arg(long)]
    elbow: bool,

    /// Cluster leaves in parallel
    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Write the optimised LAS file here
    #[arg(long)]
    optimised: Option<PathBuf>,

    /// Dump every event as one JSON line to this file
    #[arg(long)]
    events: Option<PathBuf>,
}

/// Counts events and optionally mirrors them to a JSON lines file
struct EventLog {
    counts: BTreeMap<&'static str, usize>,
    floats: usize,
    out: Option<BufWriter<File>>,
}

impl MessageSink for EventLog {
    fn send(&mut self, event: Event) -> lidarlod::Result<()> {
        *self.counts.entry(event.name()).or_default() += 1;
        if let Event::Points { points, .. } = &event {
            self.floats += points.len();
        }
        if let Event::Progress { message } = &event {
            log::info!("{}", message);
        }
        if let Some(out) = self.out.as_mut() {
            writeln!(out, "{}", event.to_json()?)?;
        }
        Ok(())
    }
}

fn build_options(args: &Args) -> Result<ProcessingOptions> {
    let mut options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read options: {}", path.display()))?;
            ProcessingOptions::from_json(&text)?
        }
        None => ProcessingOptions::default(),
    };

    if args.no_clustering {
        options = options.with_clustering(false);
    }
    if let Some(density) = args.subsample {
        options = options.with_subsample(density);
    }
    if args.lod {
        options = options.with_lod(true);
    }
    if let Some(granularity) = args.granularity {
        options = options.with_granularity(granularity);
    }
    if args.elbow {
        options = options.with_strategy(ClusteringStrategy::Elbow);
    }
    if args.parallel {
        options = options.with_parallel(true);
    }
    if let Some(seed) = args.seed {
        options = options.with_seed(seed);
    }
    if let Some(path) = &args.optimised {
        options = options.with_optimised_output(path);
    }
    Ok(options)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let options = build_options(&args)?;

    let out = match &args.events {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?,
        )),
        None => None,
    };
    let mut sink = EventLog {
        counts: BTreeMap::new(),
        floats: 0,
        out,
    };

    let report = Pipeline::new(options)
        .run_file(&args.input, &mut sink)
        .with_context(|| format!("Failed to ingest {}", args.input.display()))?;
    if let Some(out) = sink.out.as_mut() {
        out.flush()?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    for (name, count) in &sink.counts {
        println!("{:>12}: {}", name, count);
    }
    println!("{:>12}: {}", "points sent", sink.floats / LOD_POINT_CHANNELS);
    Ok(())
}
