//! Stream playback
//!
//! A renderer turns a negotiated stream and its PipeWire remote into frames in
//! a presentation window, and tears both down again on request.

pub mod pipeline;

pub use pipeline::GstRenderer;

use std::os::fd::{OwnedFd, RawFd};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::types::{SessionToken, StreamDescriptor};

/// Plays a capture stream into a window
pub trait Renderer {
    /// Start playing `stream` from the PipeWire `remote`
    ///
    /// Replaces any previous playback. Asynchronous failures are posted as
    /// `Event::Pipeline` / `Event::WindowDestroyed` tagged with `session`.
    fn render(&mut self, session: SessionToken, stream: &StreamDescriptor, remote: OwnedFd)
        -> Result<()>;

    /// Stop playback and hide the window. Safe to call at any time.
    fn teardown(&mut self);

    /// Whether a pipeline is currently playing
    fn is_active(&self) -> bool;
}

/// gst-launch description of the playback pipeline
pub fn pipeline_description(config: &RenderConfig, fd: RawFd, node_id: u32) -> String {
    format!(
        "{src} fd={fd} path={node_id} ! {rate} ! video/x-raw,framerate={fps}/1 ! {convert} ! {sink} name={name}",
        src = config.source_element,
        rate = config.rate_element,
        fps = config.max_framerate,
        convert = config.convert_element,
        sink = config.sink_element,
        name = config.sink_name,
    )
}
