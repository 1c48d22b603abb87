//! Screenshare session state machine
//!
//! The [`Controller`] owns the portal client, the renderer and the tray and
//! is the only place that changes capture state. It is driven one event at a
//! time from the dispatcher. Any failure while handling an event, including a
//! panic, ends in [`Controller::reset`], which returns everything to Idle.

use std::any::Any;
use std::fmt;
use std::os::fd::OwnedFd;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::config::SourceSelection;
use crate::error::{LumenError, Result, ResultExt};
use crate::event::{Event, PipelineEvent};
use crate::portal::{PortalBackend, PortalResponse, PortalResults, Stage};
use crate::render::Renderer;
use crate::tray::TrayView;
use crate::types::{RequestToken, SessionHandle, SessionToken, StreamDescriptor, TokenMinter};

/// Coarse capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing running
    Idle,
    /// Portal negotiation in flight
    Negotiating,
    /// Pipeline playing
    Capturing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Negotiating => write!(f, "Negotiating"),
            Self::Capturing => write!(f, "Capturing"),
        }
    }
}

/// What the dispatcher should do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep running
    Continue,
    /// Leave the loop normally
    Quit,
    /// Leave the loop with an error
    Fatal(String),
}

/// What a negotiating session is waiting for
#[derive(Debug)]
enum Step {
    /// Response to a portal request
    Pending { stage: Stage, request: RequestToken },
    /// OpenPipeWireRemote reply for the chosen stream
    OpeningRemote { stream: StreamDescriptor },
}

#[derive(Debug)]
enum State {
    Idle,
    Negotiating {
        session: SessionToken,
        handle: Option<SessionHandle>,
        step: Step,
    },
    Capturing {
        session: SessionToken,
        handle: SessionHandle,
        stream: StreamDescriptor,
    },
}

impl State {
    fn session(&self) -> Option<SessionToken> {
        match self {
            Self::Idle => None,
            Self::Negotiating { session, .. } | Self::Capturing { session, .. } => Some(*session),
        }
    }

    fn handle(&self) -> Option<&SessionHandle> {
        match self {
            Self::Idle => None,
            Self::Negotiating { handle, .. } => handle.as_ref(),
            Self::Capturing { handle, .. } => Some(handle),
        }
    }
}

/// Drives portal negotiation, playback and the tray menu
pub struct Controller<P, R, T> {
    portal: P,
    renderer: R,
    tray: T,
    tokens: TokenMinter,
    selection: SourceSelection,
    state: State,
}

impl<P, R, T> Controller<P, R, T>
where
    P: PortalBackend,
    R: Renderer,
    T: TrayView,
{
    /// Create an idle controller
    pub fn new(portal: P, renderer: R, tray: T, tokens: TokenMinter, selection: SourceSelection) -> Self {
        Self {
            portal,
            renderer,
            tray,
            tokens,
            selection,
            state: State::Idle,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Negotiating { .. } => Phase::Negotiating,
            State::Capturing { .. } => Phase::Capturing,
        }
    }

    /// Token of the active session, if any
    pub fn session(&self) -> Option<SessionToken> {
        self.state.session()
    }

    /// Portal handle of the active session, once CreateSession answered
    pub fn session_handle(&self) -> Option<&SessionHandle> {
        self.state.handle()
    }

    /// Stream being played
    pub fn stream(&self) -> Option<&StreamDescriptor> {
        match &self.state {
            State::Capturing { stream, .. } => Some(stream),
            _ => None,
        }
    }

    /// Portal backend
    pub fn portal(&self) -> &P {
        &self.portal
    }

    /// Renderer backend
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Tray backend
    pub fn tray(&self) -> &T {
        &self.tray
    }

    /// Handle one event
    ///
    /// Errors and panics are logged and reset the controller; they never
    /// reach the caller.
    pub fn dispatch(&mut self, event: Event) -> Dispatch {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle(event))) {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                error!("{}", e);
                if let Some(hint) = e.user_hint() {
                    info!("Hint: {}", hint);
                }
                self.recover();
                Dispatch::Continue
            }
            Err(payload) => {
                error!("Panic while handling event: {}", panic_message(payload.as_ref()));
                self.recover();
                Dispatch::Continue
            }
        }
    }

    /// Reset after a failed event; a panic during teardown still ends in Idle
    fn recover(&mut self) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.reset())) {
            error!("Panic during reset: {}", panic_message(payload.as_ref()));
            self.state = State::Idle;
        }
    }

    fn handle(&mut self, event: Event) -> Result<Dispatch> {
        match event {
            Event::StartRequested => self.start(),
            Event::StopRequested => {
                info!("Stop requested");
                self.reset();
            }
            Event::QuitRequested => {
                info!("Quit requested");
                self.reset();
                return Ok(Dispatch::Quit);
            }
            Event::Portal { request, response } => self.on_portal_response(request, response)?,
            Event::RemoteOpened { session, result } => self.on_remote_opened(session, result)?,
            Event::Pipeline { session, event } => self.on_pipeline_event(session, event),
            Event::WindowDestroyed { session } => self.on_window_destroyed(session),
            Event::Fatal(msg) => {
                error!("Fatal: {}", msg);
                self.reset();
                return Ok(Dispatch::Fatal(msg));
            }
        }
        Ok(Dispatch::Continue)
    }

    /// Begin a new capture, resetting any existing one first
    pub fn start(&mut self) {
        if !matches!(self.state, State::Idle) {
            info!("Start while {}: resetting first", self.phase());
            self.reset();
        }

        let session = self.tokens.next_session();
        let request = self.tokens.next_request();
        info!("Starting screencast session {}", session);

        self.portal.create_session(&request, session);
        self.state = State::Negotiating {
            session,
            handle: None,
            step: Step::Pending {
                stage: Stage::CreateSession,
                request: request.token,
            },
        };
        self.tray.set_capturing(true);
    }

    /// Stop playback, close the portal session and go back to Idle
    ///
    /// Idempotent. A failed session close is logged by the portal backend
    /// and does not stop the rest of the teardown.
    pub fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.state, State::Idle);

        if self.renderer.is_active() {
            debug!("Stopping playback");
        }
        self.renderer.teardown();
        if let Some(handle) = previous.handle() {
            self.portal.close_session(handle);
        }
        self.tray.set_capturing(false);

        if let Some(session) = previous.session() {
            info!("Session {} reset to idle", session);
        }
    }

    fn on_portal_response(
        &mut self,
        request: RequestToken,
        response: Result<PortalResponse>,
    ) -> Result<()> {
        let (session, handle, stage) = match &self.state {
            State::Negotiating {
                session,
                handle,
                step: Step::Pending { stage, request: pending },
            } if *pending == request => (*session, handle.clone(), *stage),
            _ => {
                debug!("Ignoring stale portal response for request {}", request);
                self.close_orphaned_session(response);
                return Ok(());
            }
        };

        let response = response?;
        info!("{} response: status {}", stage, response.status);
        if !response.is_success() {
            return Err(LumenError::PortalStatus {
                stage: stage.method(),
                status: response.status,
            });
        }

        match (stage, response.results) {
            (Stage::CreateSession, PortalResults::Session { session_handle }) => {
                let handle = SessionHandle::new(session_handle.ok_or_else(|| {
                    LumenError::malformed("CreateSession results carry no session_handle")
                })?);
                let expected = self.tokens.session_path(session);
                if handle.as_str() != expected {
                    debug!("Portal chose session path {} (expected {})", handle, expected);
                }
                info!("Session {} created", handle);

                let request = self.tokens.next_request();
                self.portal.select_sources(&request, &handle, &self.selection);
                self.state = State::Negotiating {
                    session,
                    handle: Some(handle),
                    step: Step::Pending {
                        stage: Stage::SelectSources,
                        request: request.token,
                    },
                };
            }
            (Stage::SelectSources, PortalResults::Sources) => {
                let handle = handle.ok_or(LumenError::NoActiveSession)?;

                let request = self.tokens.next_request();
                self.portal.start(&request, &handle);
                self.state = State::Negotiating {
                    session,
                    handle: Some(handle),
                    step: Step::Pending {
                        stage: Stage::Start,
                        request: request.token,
                    },
                };
            }
            (Stage::Start, PortalResults::Streams(streams)) => {
                let handle = handle.ok_or(LumenError::NoActiveSession)?;
                for stream in &streams {
                    info!("Stream: {}", stream);
                }

                let mut streams = streams.into_iter();
                let stream = streams
                    .next()
                    .ok_or_else(|| LumenError::malformed("Start results carry no streams"))?;
                for extra in streams {
                    warn!("Ignoring additional {}", extra);
                }

                self.portal.open_pipewire_remote(&handle, session);
                self.state = State::Negotiating {
                    session,
                    handle: Some(handle),
                    step: Step::OpeningRemote { stream },
                };
            }
            (stage, results) => {
                return Err(LumenError::malformed(format!(
                    "Unexpected {} results: {:?}",
                    stage, results
                )));
            }
        }
        Ok(())
    }

    /// A CreateSession that succeeds after its capture was reset still opened
    /// a session at the portal; nothing else will ever close it
    fn close_orphaned_session(&mut self, response: Result<PortalResponse>) {
        if let Ok(PortalResponse {
            status: 0,
            results: PortalResults::Session {
                session_handle: Some(path),
            },
        }) = response
        {
            let handle = SessionHandle::new(path);
            info!("Closing session {} created after reset", handle);
            self.portal.close_session(&handle);
        }
    }

    fn on_remote_opened(&mut self, session: SessionToken, result: Result<OwnedFd>) -> Result<()> {
        let (handle, stream) = match &self.state {
            State::Negotiating {
                session: current,
                handle: Some(handle),
                step: Step::OpeningRemote { stream },
            } if *current == session => (handle.clone(), stream.clone()),
            _ => {
                debug!("Ignoring PipeWire remote for stale session {}", session);
                return Ok(());
            }
        };

        let remote = result.context("OpenPipeWireRemote")?;
        self.renderer
            .render(session, &stream, remote)
            .context(format!("Rendering {}", stream))?;

        info!("Capturing {} from {}", stream, handle);
        self.state = State::Capturing {
            session,
            handle,
            stream,
        };
        self.tray.set_capturing(true);
        Ok(())
    }

    fn on_pipeline_event(&mut self, session: SessionToken, event: PipelineEvent) {
        if self.state.session() != Some(session) {
            debug!("Ignoring pipeline {} from stale session {}", event, session);
            return;
        }
        match &event {
            PipelineEvent::Error(_) => error!("Pipeline {}", event),
            PipelineEvent::EndOfStream => info!("Pipeline reached end of stream"),
        }
        self.reset();
    }

    fn on_window_destroyed(&mut self, session: SessionToken) {
        if self.state.session() != Some(session) {
            debug!("Ignoring window destruction from stale session {}", session);
            return;
        }
        info!("Presentation window destroyed");
        self.reset();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
