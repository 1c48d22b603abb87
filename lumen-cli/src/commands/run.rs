//! Run command - the tray helper itself
//!
//! Everything runs on the default glib main context: portal requests, the
//! GStreamer bus watch, the X11 connection watch and the event loop feeding
//! the session controller. Only the tray service has its own thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use gst::glib;
use lumen_core::config::HelperConfig;
use lumen_core::event::{self, Event, EventSender};
use lumen_core::portal::DbusPortal;
use lumen_core::render::GstRenderer;
use lumen_core::session::{Controller, Dispatch};
use lumen_core::tray::StatusTray;
use lumen_core::types::TokenMinter;
use lumen_core::window::X11Display;
use tracing::{error, info};

/// Time given to teardown requests (session Close) before the loop exits
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Run until Quit, SIGINT/SIGTERM or a fatal error
pub fn run() -> Result<()> {
    gst::init().context("Initializing GStreamer")?;

    let config = HelperConfig::default();
    let (events, mut receiver) = event::channel();
    let context = glib::MainContext::default();
    let main_loop = glib::MainLoop::new(Some(&context), false);

    let portal = context
        .block_on(DbusPortal::connect(events.clone(), config.window.fallback_size))
        .context("Connecting to the screencast portal on the session bus")?;
    let unique_name = portal.unique_name()?;

    let display = X11Display::connect(events.clone()).context("Opening the X11 display")?;
    let _x11_watch = display.watch();

    let renderer = GstRenderer::new(
        Rc::clone(&display),
        config.render.clone(),
        config.window.clone(),
        events.clone(),
    );
    let tray = StatusTray::spawn(config.tray.clone(), events.clone())
        .context("Starting the tray icon")?;

    let mut controller = Controller::new(
        portal,
        renderer,
        tray,
        TokenMinter::new(&unique_name),
        config.selection,
    );

    let _sigint = quit_on_signal(libc::SIGINT, events.clone());
    let _sigterm = quit_on_signal(libc::SIGTERM, events.clone());

    let fatal = Rc::new(RefCell::new(None::<String>));
    let outcome = Rc::clone(&fatal);
    let dispatcher_loop = main_loop.clone();
    context.spawn_local(async move {
        while let Some(event) = receiver.recv().await {
            match controller.dispatch(event) {
                Dispatch::Continue => {}
                Dispatch::Quit => break,
                Dispatch::Fatal(msg) => {
                    *outcome.borrow_mut() = Some(msg);
                    break;
                }
            }
        }
        glib::timeout_future(SHUTDOWN_GRACE).await;
        drop(controller);
        dispatcher_loop.quit();
    });

    info!("Lumen running as {}; use the tray icon to start sharing", unique_name);
    main_loop.run();

    match fatal.take() {
        Some(msg) => {
            error!("Exiting: {}", msg);
            Err(anyhow!(msg))
        }
        None => {
            info!("Bye");
            Ok(())
        }
    }
}

fn quit_on_signal(signum: i32, events: EventSender) -> glib::SourceId {
    glib::unix_signal_add_local(signum, move || {
        info!("Received signal {}, quitting", signum);
        let _ = events.send(Event::QuitRequested);
        glib::ControlFlow::Continue
    })
}
