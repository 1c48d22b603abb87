//! Mock infrastructure for testing
//!
//! Recording stand-ins for the portal, renderer and tray so the session
//! controller can be driven without a session bus, X server or GStreamer.

#![allow(dead_code)]

use std::fs::File;
use std::os::fd::OwnedFd;

use lumen_core::config::SourceSelection;
use lumen_core::error::{LumenError, Result};
use lumen_core::event::Event;
use lumen_core::portal::{PortalBackend, PortalResponse, PortalResults, Stage};
use lumen_core::render::Renderer;
use lumen_core::session::Controller;
use lumen_core::tray::TrayView;
use lumen_core::types::{
    PortalRequest, RequestToken, SessionHandle, SessionToken, StreamDescriptor, TokenMinter,
};

/// Unique name the test controller pretends to have
pub const UNIQUE_NAME: &str = ":1.42";

/// A call made on the mock portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCall {
    CreateSession {
        request: PortalRequest,
        session: SessionToken,
    },
    SelectSources {
        request: PortalRequest,
        handle: SessionHandle,
        selection: SourceSelection,
    },
    Start {
        request: PortalRequest,
        handle: SessionHandle,
    },
    OpenRemote {
        handle: SessionHandle,
        session: SessionToken,
    },
    Close {
        handle: SessionHandle,
    },
}

/// Portal backend that only records calls
#[derive(Debug, Default)]
pub struct MockPortal {
    pub calls: Vec<PortalCall>,
}

impl MockPortal {
    /// Request token of the most recent call with one
    pub fn last_request(&self) -> Option<RequestToken> {
        self.calls.iter().rev().find_map(|call| match call {
            PortalCall::CreateSession { request, .. }
            | PortalCall::SelectSources { request, .. }
            | PortalCall::Start { request, .. } => Some(request.token),
            _ => None,
        })
    }

    /// Number of calls matching `pred`
    pub fn count(&self, pred: impl Fn(&PortalCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// Session handles passed to Close, in order
    pub fn closed(&self) -> Vec<SessionHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PortalCall::Close { handle } => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PortalBackend for MockPortal {
    fn create_session(&mut self, request: &PortalRequest, session: SessionToken) {
        self.calls.push(PortalCall::CreateSession {
            request: request.clone(),
            session,
        });
    }

    fn select_sources(
        &mut self,
        request: &PortalRequest,
        session: &SessionHandle,
        selection: &SourceSelection,
    ) {
        self.calls.push(PortalCall::SelectSources {
            request: request.clone(),
            handle: session.clone(),
            selection: *selection,
        });
    }

    fn start(&mut self, request: &PortalRequest, session: &SessionHandle) {
        self.calls.push(PortalCall::Start {
            request: request.clone(),
            handle: session.clone(),
        });
    }

    fn open_pipewire_remote(&mut self, session: &SessionHandle, token: SessionToken) {
        self.calls.push(PortalCall::OpenRemote {
            handle: session.clone(),
            session: token,
        });
    }

    fn close_session(&mut self, session: &SessionHandle) {
        self.calls.push(PortalCall::Close {
            handle: session.clone(),
        });
    }
}

/// How the mock renderer reacts to `render`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderBehavior {
    #[default]
    Succeed,
    Fail,
    Panic,
    /// Panic in both `render` and `teardown`
    PanicAlways,
}

/// A window the mock renderer opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockWindow {
    pub session: SessionToken,
    pub hidden: bool,
}

/// Renderer that records what it was asked to play
#[derive(Debug, Default)]
pub struct MockRenderer {
    pub behavior: RenderBehavior,
    pub rendered: Vec<(SessionToken, StreamDescriptor)>,
    pub teardowns: usize,
    /// Pipelines currently playing, never more than one
    pub playing: Option<SessionToken>,
    /// Windows that still exist, shown or hidden
    pub windows: Vec<MockWindow>,
}

impl MockRenderer {
    /// Windows currently shown
    pub fn visible_windows(&self) -> usize {
        self.windows.iter().filter(|w| !w.hidden).count()
    }
}

impl Renderer for MockRenderer {
    fn render(
        &mut self,
        session: SessionToken,
        stream: &StreamDescriptor,
        _remote: OwnedFd,
    ) -> Result<()> {
        match self.behavior {
            RenderBehavior::Succeed => {
                // Hidden windows are replaced; a shown one would be leaked
                self.windows.retain(|w| !w.hidden);
                self.windows.push(MockWindow {
                    session,
                    hidden: false,
                });
                self.playing = Some(session);
                self.rendered.push((session, stream.clone()));
                Ok(())
            }
            RenderBehavior::Fail => Err(LumenError::pipeline("no element \"pipewiresrc\"")),
            RenderBehavior::Panic | RenderBehavior::PanicAlways => panic!("renderer exploded"),
        }
    }

    fn teardown(&mut self) {
        self.teardowns += 1;
        if self.behavior == RenderBehavior::PanicAlways {
            panic!("teardown exploded");
        }
        self.playing = None;
        for window in &mut self.windows {
            window.hidden = true;
        }
    }

    fn is_active(&self) -> bool {
        self.playing.is_some()
    }
}

/// Tray that remembers every state it was shown
#[derive(Debug, Default)]
pub struct MockTray {
    pub history: Vec<bool>,
}

impl MockTray {
    /// State currently shown; idle before any update
    pub fn capturing(&self) -> bool {
        self.history.last().copied().unwrap_or(false)
    }
}

impl TrayView for MockTray {
    fn set_capturing(&mut self, capturing: bool) {
        self.history.push(capturing);
    }
}

pub type MockController = Controller<MockPortal, MockRenderer, MockTray>;

/// Idle controller over fresh mocks
pub fn controller() -> MockController {
    controller_with(MockRenderer::default())
}

/// Idle controller with a preconfigured renderer
pub fn controller_with(renderer: MockRenderer) -> MockController {
    Controller::new(
        MockPortal::default(),
        renderer,
        MockTray::default(),
        TokenMinter::new(UNIQUE_NAME),
        SourceSelection::default(),
    )
}

/// Session path the portal would hand out for `session`
pub fn session_path(session: SessionToken) -> String {
    format!(
        "/org/freedesktop/portal/desktop/session/1_42/{}",
        session
    )
}

/// Response event for the request the controller is waiting on
pub fn respond(ctl: &MockController, response: PortalResponse) -> Event {
    Event::Portal {
        request: ctl
            .portal()
            .last_request()
            .expect("controller has an outstanding request"),
        response: Ok(response),
    }
}

/// Any readable fd standing in for a PipeWire remote
pub fn dummy_remote() -> OwnedFd {
    File::open("/dev/null").expect("open /dev/null").into()
}

/// Drive a fresh Start through to Capturing, returning the session token
pub fn start_capture(ctl: &mut MockController, stream: StreamDescriptor) -> SessionToken {
    ctl.dispatch(Event::StartRequested);
    let session = ctl.session().expect("session minted");

    let created = PortalResponse::success(PortalResults::Session {
        session_handle: Some(session_path(session)),
    });
    ctl.dispatch(respond(ctl, created));
    ctl.dispatch(respond(ctl, PortalResponse::success(PortalResults::Sources)));
    ctl.dispatch(respond(
        ctl,
        PortalResponse::success(PortalResults::Streams(vec![stream])),
    ));
    ctl.dispatch(Event::RemoteOpened {
        session,
        result: Ok(dummy_remote()),
    });
    session
}

/// Failed response for `stage`
pub fn failure(stage: Stage, status: u32) -> PortalResponse {
    PortalResponse::failure(stage, status)
}
