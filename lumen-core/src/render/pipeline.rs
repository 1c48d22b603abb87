//! GStreamer playback into an X11 presentation window

use std::os::fd::{AsRawFd, OwnedFd};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gst::glib;
use gst::prelude::*;
use gst_video::prelude::*;
use tracing::{debug, info, warn};

use super::{pipeline_description, Renderer};
use crate::config::{RenderConfig, WindowConfig};
use crate::error::{LumenError, Result, ResultExt};
use crate::event::{Event, EventSender, PipelineEvent};
use crate::types::{Rect, SessionToken, StreamDescriptor};
use crate::window::{PresentationWindow, X11Display};

/// A running pipeline and what it keeps alive
struct Playback {
    session: SessionToken,
    pipeline: gst::Pipeline,
    _bus_watch: gst::bus::BusWatchGuard,
    /// pipewiresrc duplicates the fd, ours is closed with the playback
    _remote: OwnedFd,
}

/// Renderer backed by a GStreamer pipeline and an X11 window
pub struct GstRenderer {
    display: Rc<X11Display>,
    render_config: RenderConfig,
    window_config: WindowConfig,
    events: EventSender,
    playback: Option<Playback>,
    /// Last presentation window, possibly hidden
    window: Option<PresentationWindow>,
}

impl GstRenderer {
    /// Create a renderer drawing on `display`
    ///
    /// `gst::init` must have been called.
    pub fn new(
        display: Rc<X11Display>,
        render_config: RenderConfig,
        window_config: WindowConfig,
        events: EventSender,
    ) -> Self {
        Self {
            display,
            render_config,
            window_config,
            events,
            playback: None,
            window: None,
        }
    }

    fn log_screen_bounds(&self) {
        match self.display.monitors() {
            Ok(monitors) => match Rect::bounding(&monitors) {
                Some(bounds) => info!("Screen bounds {} across {} monitor(s)", bounds, monitors.len()),
                None => debug!("RandR reported no monitors"),
            },
            Err(e) => warn!("Could not query monitors: {}", e),
        }
    }

    fn build_pipeline(
        &self,
        session: SessionToken,
        stream: &StreamDescriptor,
        remote: &OwnedFd,
        xid: u32,
    ) -> Result<(gst::Pipeline, gst::bus::BusWatchGuard)> {
        let desc = pipeline_description(&self.render_config, remote.as_raw_fd(), stream.node_id);
        debug!("GStreamer pipeline: {}", desc);

        let pipeline = gst::parse::launch(&desc)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| LumenError::pipeline("Expected a pipeline"))?;

        let sink = pipeline.by_name(&self.render_config.sink_name).ok_or_else(|| {
            LumenError::pipeline(format!("No element named '{}'", self.render_config.sink_name))
        })?;
        sink.set_property("sync", self.render_config.sync);

        let bus = pipeline
            .bus()
            .ok_or_else(|| LumenError::pipeline("Pipeline has no bus"))?;

        // Runs on a streaming thread; the handle may only be set once
        let injected = Arc::new(AtomicBool::new(false));
        bus.set_sync_handler(move |_, msg| {
            if gst_video::is_video_overlay_prepare_window_handle_message(msg) {
                let overlay = msg
                    .src()
                    .and_then(|src| src.dynamic_cast_ref::<gst_video::VideoOverlay>());
                if let Some(overlay) = overlay {
                    if !injected.swap(true, Ordering::SeqCst) {
                        // SAFETY: the window outlives the pipeline, teardown stops it first
                        unsafe { overlay.set_window_handle(xid as usize) };
                    }
                }
            }
            gst::BusSyncReply::Pass
        });

        let events = self.events.clone();
        let watch = bus.add_watch_local(move |_, msg| {
            let event = match msg.view() {
                gst::MessageView::Error(err) => {
                    let mut text = err.error().to_string();
                    if let Some(debug) = err.debug() {
                        text.push_str(&format!(" ({})", debug));
                    }
                    Some(PipelineEvent::Error(text))
                }
                gst::MessageView::Eos(..) => Some(PipelineEvent::EndOfStream),
                _ => None,
            };
            if let Some(event) = event {
                let _ = events.send(Event::Pipeline { session, event });
            }
            glib::ControlFlow::Continue
        })?;

        Ok((pipeline, watch))
    }
}

impl Renderer for GstRenderer {
    fn render(
        &mut self,
        session: SessionToken,
        stream: &StreamDescriptor,
        remote: OwnedFd,
    ) -> Result<()> {
        self.teardown();
        // An older hidden window is replaced, never reused
        self.window = None;

        self.log_screen_bounds();

        let window = self
            .display
            .create_window(&self.window_config, stream.width, stream.height, session)
            .context("Creating presentation window")?;
        let xid = window.xid();
        self.window = Some(window);

        let (pipeline, bus_watch) = self.build_pipeline(session, stream, &remote, xid)?;
        self.playback = Some(Playback {
            session,
            pipeline: pipeline.clone(),
            _bus_watch: bus_watch,
            _remote: remote,
        });

        pipeline.set_state(gst::State::Ready)?;
        pipeline.set_state(gst::State::Playing)?;

        info!("Playing {} in window {:#x}", stream, xid);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(playback) = self.playback.take() {
            if let Err(e) = playback.pipeline.set_state(gst::State::Null) {
                warn!("Failed to stop pipeline for {}: {}", playback.session, e);
            }
            debug!("Pipeline for session {} stopped", playback.session);
        }

        if let Some(window) = &self.window {
            if let Err(e) = window.hide() {
                warn!("Failed to hide presentation window: {}", e);
            }
        }
    }

    fn is_active(&self) -> bool {
        self.playback.is_some()
    }
}

impl Drop for GstRenderer {
    fn drop(&mut self) {
        self.teardown();
    }
}
