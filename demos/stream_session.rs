//! Stream a LAS file to an in-process client session.
//!
//! The pipeline writes frames into a channel, a supervisor feeds them to a
//! [`TransferSession`], and the session reports download progress and the
//! reassembled point count. Uploading the file twice shows the session
//! surviving a dropped connection.

use anyhow::Result;
use clap::Parser;
use lidarlod::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "stream_session")]
#[command(about = "Replay a LAS upload through the transfer protocol")]
struct Args {
    input: PathBuf,

    /// Number of uploads, each over its own connection
    #[arg(short, long, default_value_t = 2)]
    uploads: usize,

    /// Milliseconds to wait before reconnecting
    #[arg(long, default_value_t = 1000)]
    reconnect_ms: u64,

    /// Stream raw points instead of k-means centroids
    #[arg(long)]
    no_clustering: bool,
}

struct PrintProgress;

impl ProgressReporter for PrintProgress {
    fn report(&mut self, update: ProgressUpdate) {
        if update.percent > 0 {
            log::debug!("{}", update.message);
        } else {
            println!("server: {}", update.message);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let options = ProcessingOptions::default().with_clustering(!args.no_clustering);
    let (connections, mut connector) = connector_channel();

    for upload in 0..args.uploads {
        let (sink, transport) = channel_pair();
        let report = Pipeline::new(options.clone()).run_file(&args.input, sink)?;
        println!("upload {}: {} points read", upload + 1, report.points_read);
        connections
            .send(Ok(transport))
            .map_err(|_| anyhow::anyhow!("connector queue closed"))?;
    }

    let mut session = TransferSession::new(|points, header| {
        println!(
            "client: received {} of {} points (format {})",
            points.len() / LOD_POINT_CHANNELS,
            header.point_count,
            header.format_id
        );
    })
    .with_reporter(PrintProgress);

    let (handle, signal) = shutdown_channel();
    let supervisor = Supervisor::new().with_reconnect_delay(Duration::from_millis(args.reconnect_ms));
    let uploads = args.uploads;
    let delay = supervisor.reconnect_delay();

    let stop = async move {
        // every upload after the first waits out one reconnect delay
        tokio::time::sleep(delay * uploads as u32 + Duration::from_millis(100)).await;
        handle.shutdown();
    };
    let (report, ()) = tokio::join!(supervisor.run(&mut connector, &mut session, signal), stop);

    println!(
        "{} connections, {} frames, {} deliveries",
        report.connections,
        report.frames,
        session.deliveries()
    );
    Ok(())
}
