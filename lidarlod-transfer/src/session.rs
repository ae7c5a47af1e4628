//! Client-side reassembly of a point stream
//!
//! A [`TransferSession`] is driven one event at a time. It collects the
//! header and the point chunks of one upload and hands them to the
//! completion callback when `done` arrives.

use crate::protocol::Event;
use lidarlod_io::LasHeader;

/// Where the session is in the current transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No header seen yet
    AwaitingHeader,
    /// Header seen, chunks being collected
    Accumulating,
    /// Delivery in progress; the session returns to `AwaitingHeader` after it
    Complete,
}

/// Progress shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Download percentage, 0 for server-side stage messages
    pub percent: u32,
    pub message: String,
}

/// Receives progress updates
pub trait ProgressReporter: Send {
    fn report(&mut self, update: ProgressUpdate);
}

/// Receives the out-of-band `lod-points` and `file-ready` events
pub trait UiSink: Send {
    fn forward(&mut self, event: Event);
}

/// Called with the concatenated payload and the header on `done`
pub type CompletionCallback = Box<dyn FnMut(Vec<f64>, LasHeader) + Send>;

/// State machine reassembling one point stream at a time.
pub struct TransferSession {
    state: SessionState,
    header: Option<LasHeader>,
    chunks: Vec<f64>,
    received_chunks: usize,
    total_chunks: usize,
    session_id: Option<String>,
    deliveries: usize,
    on_complete: CompletionCallback,
    reporter: Option<Box<dyn ProgressReporter>>,
    ui: Option<Box<dyn UiSink>>,
}

impl TransferSession {
    pub fn new<F>(on_complete: F) -> Self
    where
        F: FnMut(Vec<f64>, LasHeader) + Send + 'static,
    {
        Self {
            state: SessionState::AwaitingHeader,
            header: None,
            chunks: Vec::new(),
            received_chunks: 0,
            total_chunks: 0,
            session_id: None,
            deliveries: 0,
            on_complete: Box::new(on_complete),
            reporter: None,
            ui: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn with_ui_sink(mut self, ui: impl UiSink + 'static) -> Self {
        self.ui = Some(Box::new(ui));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn header(&self) -> Option<&LasHeader> {
        self.header.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Floats collected for the current transfer
    pub fn buffered_len(&self) -> usize {
        self.chunks.len()
    }

    pub fn received_chunks(&self) -> usize {
        self.received_chunks
    }

    /// Times the completion callback has run
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    /// Parse and handle one text frame; malformed frames are logged and skipped.
    pub fn handle_frame(&mut self, frame: &str) {
        match Event::from_json(frame) {
            Ok(event) => self.handle(event),
            Err(e) => log::warn!("skipping malformed frame: {}", e),
        }
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::SessionId { session_id } => {
                log::debug!("session id {}", session_id);
                self.session_id = Some(session_id);
            }
            Event::Headers(header) => self.on_headers(header),
            Event::Points {
                points,
                total_chunks,
            } => self.on_points(points, total_chunks),
            Event::Progress { message } => self.report(0, message),
            Event::Done => self.on_done(),
            event @ (Event::LodPoints { .. } | Event::FileReady { .. }) => match self.ui.as_mut() {
                Some(ui) => ui.forward(event),
                None => log::debug!("no ui sink for {} event", event.name()),
            },
        }
    }

    /// Note a dropped connection. Collected state is kept for the next one.
    pub fn on_disconnect(&mut self) {
        if self.received_chunks > 0 || self.header.is_some() {
            log::info!(
                "connection lost with {} chunks buffered, keeping them",
                self.received_chunks
            );
        }
    }

    fn on_headers(&mut self, header: LasHeader) {
        if self.header.is_some() {
            log::warn!("ignoring a second header before done");
            return;
        }
        log::debug!("header received: {} points, format {}", header.point_count, header.format_id);
        self.header = Some(header);
        self.state = SessionState::Accumulating;
    }

    fn on_points(&mut self, points: Vec<f64>, total_chunks: usize) {
        self.chunks.extend(points);
        self.received_chunks += 1;
        self.total_chunks = total_chunks;

        if total_chunks > 0 {
            let percent = (self.received_chunks * 100).div_ceil(total_chunks);
            self.report(percent as u32, format!("Processing... ({}%)", percent));
        }
    }

    fn on_done(&mut self) {
        let Some(header) = self.header.take() else {
            log::debug!("done without a header, ignoring");
            return;
        };

        self.state = SessionState::Complete;
        log::info!(
            "transfer complete: {} chunks, {} floats",
            self.received_chunks,
            self.chunks.len()
        );
        let points = std::mem::take(&mut self.chunks);
        (self.on_complete)(points, header);
        self.deliveries += 1;

        self.received_chunks = 0;
        self.total_chunks = 0;
        self.state = SessionState::AwaitingHeader;
    }

    fn report(&mut self, percent: u32, message: String) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.report(ProgressUpdate { percent, message });
        }
    }
}

impl std::fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSession")
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("received_chunks", &self.received_chunks)
            .field("buffered_len", &self.chunks.len())
            .field("deliveries", &self.deliveries)
            .finish()
    }
}
