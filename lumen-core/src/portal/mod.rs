//! Screencast portal client
//!
//! The helper negotiates a capture in three request/response rounds
//! (CreateSession, SelectSources, Start), then exchanges the session for a
//! PipeWire remote. Every call here is fire-and-forget: the backend posts the
//! outcome as an [`Event`](crate::event::Event) once the correlated Response
//! signal (or method return) arrives.

pub mod dbus;

pub use dbus::{DbusPortal, PortalInfo};

use std::fmt;

use crate::config::SourceSelection;
use crate::types::{PortalRequest, SessionHandle, SessionToken, StreamDescriptor};

/// Negotiation round a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CreateSession,
    SelectSources,
    Start,
}

impl Stage {
    /// D-Bus method name of the round
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateSession => "CreateSession",
            Self::SelectSources => "SelectSources",
            Self::Start => "Start",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Decoded `org.freedesktop.portal.Request.Response` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    /// 0 on success; any other value is a failure and is not classified further
    pub status: u32,
    /// Round-specific results
    pub results: PortalResults,
}

impl PortalResponse {
    /// Successful response
    pub fn success(results: PortalResults) -> Self {
        Self { status: 0, results }
    }

    /// Failed response with an empty result set for `stage`
    pub fn failure(stage: Stage, status: u32) -> Self {
        let results = match stage {
            Stage::CreateSession => PortalResults::Session {
                session_handle: None,
            },
            Stage::SelectSources => PortalResults::Sources,
            Stage::Start => PortalResults::Streams(Vec::new()),
        };
        Self { status, results }
    }

    /// Whether the portal reported success
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Results of one negotiation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalResults {
    /// CreateSession: the session object path
    Session { session_handle: Option<String> },
    /// SelectSources carries nothing of interest
    Sources,
    /// Start: the negotiated streams
    Streams(Vec<StreamDescriptor>),
}

/// Calls into the screencast portal
///
/// Completions are reported asynchronously as `Event::Portal` (keyed by the
/// request token) and `Event::RemoteOpened` (keyed by the session token).
pub trait PortalBackend {
    /// Create a session whose handle will end in `session`
    fn create_session(&mut self, request: &PortalRequest, session: SessionToken);

    /// Offer the source picker for `session`
    fn select_sources(
        &mut self,
        request: &PortalRequest,
        session: &SessionHandle,
        selection: &SourceSelection,
    );

    /// Start the negotiated capture
    fn start(&mut self, request: &PortalRequest, session: &SessionHandle);

    /// Exchange the session for a PipeWire remote fd
    fn open_pipewire_remote(&mut self, session: &SessionHandle, token: SessionToken);

    /// Close a session; failures are logged by the backend only
    fn close_session(&mut self, session: &SessionHandle);
}
