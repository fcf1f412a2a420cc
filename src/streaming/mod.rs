//! SSE event encoding and response streaming.

pub mod body;
mod event;
mod session;
mod sink;
mod tee;
mod writer;

pub use event::{Event, EventWriter, CONTENT_TYPE};
pub use session::StreamSession;
pub use sink::ResponseSink;
pub use tee::TeeResponse;
pub use writer::IoResponse;
