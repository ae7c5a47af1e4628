//! Point transfer between the processing server and its clients
//!
//! - [`protocol`]: the JSON events exchanged over a connection
//! - [`streamer`]: splits point payloads into `points` frames on the server side
//! - [`session`]: reassembles frames into one delivery per upload on the client side
//! - [`supervisor`]: keeps a session connected, reconnecting after a fixed delay

pub mod protocol;
pub mod session;
pub mod streamer;
pub mod supervisor;

pub use protocol::Event;
pub use session::{CompletionCallback, ProgressReporter, ProgressUpdate, SessionState, TransferSession, UiSink};
pub use streamer::{estimate_total_chunks, ChunkStreamer, MessageSink, SOCKET_CHUNK_SIZE};
pub use supervisor::{
    channel_pair, connector_channel, shutdown_channel, ChannelConnector, ChannelSink, ChannelTransport, Connector,
    ShutdownHandle, ShutdownSignal, Supervisor, SupervisorReport, Transport, DEFAULT_RECONNECT_DELAY,
};
