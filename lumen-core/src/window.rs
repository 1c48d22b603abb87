//! X11 presentation window
//!
//! The captured stream is drawn by the video sink straight into a plain X11
//! window. The window sits below every other window, stays out of pagers and
//! taskbars, never takes focus and offers no close button, so it can live on
//! the desktop as a preview without getting in the way.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::fd::AsRawFd;
use std::rc::Rc;

use gst::glib;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::properties::WmHints;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{
    AtomEnum, ConnectionExt as _, CreateWindowAux, EventMask, PropMode, Window, WindowClass,
};
use x11rb::protocol::Event as XEvent;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::config::WindowConfig;
use crate::error::Result;
use crate::event::{Event, EventSender};
use crate::types::{Rect, SessionToken};

x11rb::atom_manager! {
    Atoms: AtomsCookie {
        UTF8_STRING,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_BELOW,
        _NET_WM_STATE_SKIP_PAGER,
        _NET_WM_STATE_SKIP_TASKBAR,
        _MOTIF_WM_HINTS,
    }
}

// Motif WM hints, see MwmUtil.h
const MWM_HINTS_FUNCTIONS: u32 = 1 << 0;
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_FUNC_ALL: u32 = 1 << 0;
const MWM_FUNC_RESIZE: u32 = 1 << 1;
const MWM_FUNC_MOVE: u32 = 1 << 2;
const MWM_FUNC_MINIMIZE: u32 = 1 << 3;
const MWM_FUNC_MAXIMIZE: u32 = 1 << 4;
const MWM_DECOR_ALL: u32 = 1 << 0;

/// Connection to the X server shared by every presentation window
pub struct X11Display {
    conn: RustConnection,
    screen_num: usize,
    atoms: Atoms,
    /// Live windows and the capture each belongs to
    windows: RefCell<HashMap<Window, SessionToken>>,
    events: EventSender,
}

impl X11Display {
    /// Connect to `$DISPLAY`
    pub fn connect(events: EventSender) -> Result<Rc<Self>> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let atoms = Atoms::new(&conn)?.reply()?;

        info!("Connected to X server, screen {}", screen_num);

        Ok(Rc::new(Self {
            conn,
            screen_num,
            atoms,
            windows: RefCell::new(HashMap::new()),
            events,
        }))
    }

    fn root(&self) -> Window {
        self.conn.setup().roots[self.screen_num].root
    }

    /// Geometry of every active monitor
    pub fn monitors(&self) -> Result<Vec<Rect>> {
        let reply = self.conn.randr_get_monitors(self.root(), true)?.reply()?;
        Ok(reply
            .monitors
            .iter()
            .map(|m| Rect::new(m.x.into(), m.y.into(), m.width.into(), m.height.into()))
            .collect())
    }

    /// Watch the connection on the default main context
    ///
    /// DestroyNotify for a tracked window is posted as `Event::WindowDestroyed`.
    /// If the connection dies every tracked window is reported destroyed.
    pub fn watch(self: &Rc<Self>) -> glib::SourceId {
        let display = Rc::clone(self);
        let fd = self.conn.stream().as_raw_fd();

        glib::unix_fd_add_local(fd, glib::IOCondition::IN, move |_, _| {
            match display.drain_events() {
                Ok(()) => glib::ControlFlow::Continue,
                Err(e) => {
                    error!("X11 connection lost: {}", e);
                    let orphaned: Vec<SessionToken> =
                        display.windows.borrow_mut().drain().map(|(_, s)| s).collect();
                    for session in orphaned {
                        let _ = display.events.send(Event::WindowDestroyed { session });
                    }
                    glib::ControlFlow::Break
                }
            }
        })
    }

    /// Handle every queued X event
    pub fn drain_events(&self) -> Result<()> {
        while let Some(event) = self.conn.poll_for_event()? {
            if let XEvent::DestroyNotify(notify) = event {
                let session = self.windows.borrow_mut().remove(&notify.window);
                if let Some(session) = session {
                    info!("Presentation window {:#x} destroyed", notify.window);
                    let _ = self.events.send(Event::WindowDestroyed { session });
                }
            }
        }
        Ok(())
    }

    /// Create and map a presentation window of the given size
    pub fn create_window(
        self: &Rc<Self>,
        config: &WindowConfig,
        width: u32,
        height: u32,
        session: SessionToken,
    ) -> Result<PresentationWindow> {
        let screen = &self.conn.setup().roots[self.screen_num];
        let id = self.conn.generate_id()?;

        let aux = CreateWindowAux::new()
            .background_pixel(screen.black_pixel)
            .event_mask(EventMask::STRUCTURE_NOTIFY);
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            id,
            screen.root,
            0,
            0,
            clamp_dimension(width),
            clamp_dimension(height),
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;

        self.conn.change_property8(
            PropMode::REPLACE,
            id,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            config.title.as_bytes(),
        )?;
        self.conn.change_property8(
            PropMode::REPLACE,
            id,
            self.atoms._NET_WM_NAME,
            self.atoms.UTF8_STRING,
            config.title.as_bytes(),
        )?;

        let states = self.wm_states(config);
        if !states.is_empty() {
            self.conn.change_property32(
                PropMode::REPLACE,
                id,
                self.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &states,
            )?;
        }

        let mut hints = WmHints::new();
        hints.input = Some(config.accept_focus);
        hints.set(&self.conn, id)?;

        self.conn.change_property32(
            PropMode::REPLACE,
            id,
            self.atoms._MOTIF_WM_HINTS,
            self.atoms._MOTIF_WM_HINTS,
            &motif_hints(config),
        )?;

        self.conn.map_window(id)?;
        self.conn.flush()?;

        self.windows.borrow_mut().insert(id, session);
        debug!("Created presentation window {:#x} ({}x{})", id, width, height);

        // Replies above may have buffered events the fd watch won't see
        self.drain_events()?;

        Ok(PresentationWindow {
            display: Rc::clone(self),
            id,
        })
    }

    fn wm_states(&self, config: &WindowConfig) -> Vec<u32> {
        [
            (config.keep_below, self.atoms._NET_WM_STATE_BELOW),
            (config.skip_pager, self.atoms._NET_WM_STATE_SKIP_PAGER),
            (config.skip_taskbar, self.atoms._NET_WM_STATE_SKIP_TASKBAR),
        ]
        .into_iter()
        .filter_map(|(enabled, atom)| enabled.then_some(atom))
        .collect()
    }

    fn is_tracked(&self, id: Window) -> bool {
        self.windows.borrow().contains_key(&id)
    }
}

/// `_MOTIF_WM_HINTS` payload: flags, functions, decorations, input mode, status
fn motif_hints(config: &WindowConfig) -> [u32; 5] {
    let functions = if config.closable {
        MWM_FUNC_ALL
    } else {
        MWM_FUNC_RESIZE | MWM_FUNC_MOVE | MWM_FUNC_MINIMIZE | MWM_FUNC_MAXIMIZE
    };
    let decorations = if config.decorated { MWM_DECOR_ALL } else { 0 };
    [
        MWM_HINTS_FUNCTIONS | MWM_HINTS_DECORATIONS,
        functions,
        decorations,
        0,
        0,
    ]
}

fn clamp_dimension(value: u32) -> u16 {
    value.clamp(1, u16::MAX as u32) as u16
}

/// A mapped (or hidden) presentation window
///
/// Dropping it destroys the X window unless the server already did.
pub struct PresentationWindow {
    display: Rc<X11Display>,
    id: Window,
}

impl PresentationWindow {
    /// Native window id handed to the video sink
    pub fn xid(&self) -> u32 {
        self.id
    }

    /// Whether the X window still exists
    pub fn is_alive(&self) -> bool {
        self.display.is_tracked(self.id)
    }

    /// Unmap the window, keeping it around
    pub fn hide(&self) -> Result<()> {
        if self.is_alive() {
            self.display.conn.unmap_window(self.id)?;
            self.display.conn.flush()?;
            debug!("Hid presentation window {:#x}", self.id);
        }
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        // Untrack first so our own DestroyNotify is not reported as external
        if self.display.windows.borrow_mut().remove(&self.id).is_some() {
            self.display.conn.destroy_window(self.id)?;
            self.display.conn.flush()?;
            debug!("Destroyed presentation window {:#x}", self.id);
        }
        Ok(())
    }
}

impl Drop for PresentationWindow {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!("Failed to destroy presentation window {:#x}: {}", self.id, e);
        }
    }
}
