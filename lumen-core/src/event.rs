//! Events delivered to the session state machine
//!
//! Every asynchronous completion (portal replies, pipeline bus messages,
//! window destruction, tray clicks, signals) is posted as an [`Event`] on a
//! single channel and handled in order on the dispatcher thread.

use std::fmt;
use std::os::fd::OwnedFd;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::portal::PortalResponse;
use crate::types::{RequestToken, SessionToken};

/// Sending half of the dispatcher channel
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half of the dispatcher channel
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create the dispatcher channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Something the state machine must react to
#[derive(Debug)]
pub enum Event {
    /// Tray "Start Screenshare" clicked
    StartRequested,
    /// Tray "Stop Screenshare" clicked
    StopRequested,
    /// Tray "Quit" clicked or SIGINT received
    QuitRequested,
    /// A portal Request object emitted Response (or the call failed)
    Portal {
        /// Token the request was registered under
        request: RequestToken,
        /// Decoded response, or the transport error
        response: Result<PortalResponse>,
    },
    /// OpenPipeWireRemote returned
    RemoteOpened {
        /// Capture the remote was requested for
        session: SessionToken,
        /// PipeWire remote file descriptor
        result: Result<OwnedFd>,
    },
    /// Asynchronous message from a playback pipeline bus
    Pipeline {
        /// Capture the pipeline belongs to
        session: SessionToken,
        /// What happened
        event: PipelineEvent,
    },
    /// The presentation window was destroyed outside our control
    WindowDestroyed {
        /// Capture the window belonged to
        session: SessionToken,
    },
    /// A backend failed in a way the process cannot recover from
    Fatal(String),
}

/// Terminal pipeline bus messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// An element posted an error
    Error(String),
    /// End of stream reached
    EndOfStream,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {}", msg),
            Self::EndOfStream => write!(f, "end of stream"),
        }
    }
}
