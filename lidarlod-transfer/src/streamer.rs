//! Server-side event emission

use crate::protocol::Event;
use lidarlod_core::{LodPoint, Result, LOD_POINT_CHANNELS};
use lidarlod_io::LasHeader;

/// Floats per `points` frame, a whole number of points
pub const SOCKET_CHUNK_SIZE: usize = 10_000 * LOD_POINT_CHANNELS;

/// Destination for outgoing events
pub trait MessageSink {
    fn send(&mut self, event: Event) -> Result<()>;
}

impl MessageSink for Vec<Event> {
    fn send(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl<S: MessageSink + ?Sized> MessageSink for &mut S {
    fn send(&mut self, event: Event) -> Result<()> {
        (**self).send(event)
    }
}

/// Number of `points` frames needed to stream `point_count` points when they
/// are decoded `window` points at a time and each window is chunked on its own
pub fn estimate_total_chunks(header: &LasHeader, window: usize) -> usize {
    estimate_chunks_for(header.point_count as usize, window, SOCKET_CHUNK_SIZE)
}

fn estimate_chunks_for(point_count: usize, window: usize, chunk_size: usize) -> usize {
    let window = window.max(1);
    let full_windows = point_count / window;
    let tail = point_count % window;
    let per_window = |points: usize| (points * LOD_POINT_CHANNELS).div_ceil(chunk_size);
    full_windows * per_window(window) + per_window(tail)
}

/// Splits point payloads into frames and writes protocol events to a sink.
#[derive(Debug)]
pub struct ChunkStreamer<S: MessageSink> {
    sink: S,
    chunk_size: usize,
    chunks_sent: usize,
}

impl<S: MessageSink> ChunkStreamer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            chunk_size: SOCKET_CHUNK_SIZE,
            chunks_sent: 0,
        }
    }

    /// Override the frame size, rounded down to whole points
    pub fn with_chunk_size(mut self, floats: usize) -> Self {
        self.chunk_size = (floats / LOD_POINT_CHANNELS).max(1) * LOD_POINT_CHANNELS;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// `points` frames sent so far
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    pub fn send_session_id(&mut self, session_id: impl Into<String>) -> Result<()> {
        self.sink.send(Event::SessionId {
            session_id: session_id.into(),
        })
    }

    pub fn send_headers(&mut self, header: &LasHeader) -> Result<()> {
        self.sink.send(Event::Headers(header.clone()))
    }

    pub fn send_progress(&mut self, message: impl Into<String>) -> Result<()> {
        self.sink.send(Event::Progress {
            message: message.into(),
        })
    }

    /// Stream points as `ceil(len / chunk_size)` frames, returning the frame count
    pub fn send_points(&mut self, points: &[LodPoint]) -> Result<usize> {
        let flat = LodPoint::as_flat(points);
        let total = flat.len().div_ceil(self.chunk_size);
        self.send_flat(flat, total)
    }

    /// Stream a flat payload whose overall frame count is already known.
    ///
    /// Used when one logical transfer is produced in several windows.
    pub fn send_flat(&mut self, flat: &[f64], total_chunks: usize) -> Result<usize> {
        let mut sent = 0;
        for chunk in flat.chunks(self.chunk_size) {
            self.sink.send(Event::Points {
                points: chunk.to_vec(),
                total_chunks,
            })?;
            sent += 1;
        }
        self.chunks_sent += sent;
        Ok(sent)
    }

    pub fn send_lod(&mut self, points: &[LodPoint], render_distance: f64, label: impl Into<String>) -> Result<()> {
        self.sink.send(Event::LodPoints {
            points: LodPoint::as_flat(points).to_vec(),
            total_chunks: 0,
            render_distance,
            label: label.into(),
        })
    }

    pub fn send_file_ready(&mut self, file_path: impl Into<String>) -> Result<()> {
        self.sink.send(Event::FileReady {
            file_path: file_path.into(),
        })
    }

    pub fn send_done(&mut self) -> Result<()> {
        self.sink.send(Event::Done)
    }
}
