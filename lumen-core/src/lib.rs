//! Lumen Core Library
//!
//! Tray helper that mirrors a portal screencast into an X11 window, so
//! X11-only screen sharing tools can capture a Wayland desktop.
//!
//! This library provides:
//! - Screencast negotiation via xdg-desktop-portal
//! - GStreamer playback of the PipeWire stream into a presentation window
//! - A StatusNotifierItem tray with Start/Stop and Quit
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  events   ┌────────────┐    ┌──────────────────┐
//! │ Portal/Tray/ │──────────▶│ Controller │───▶│ Renderer + X11   │
//! │ Bus/X11      │           │ (session)  │    │ window           │
//! └──────────────┘           └────────────┘    └──────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod portal;
pub mod render;
pub mod session;
pub mod tray;
pub mod types;
pub mod window;

pub use config::{CursorMode, HelperConfig, RenderConfig, SourceSelection, TrayConfig, WindowConfig};
pub use error::{LumenError, Result};
pub use event::{Event, EventReceiver, EventSender, PipelineEvent};
pub use portal::{DbusPortal, PortalBackend, PortalInfo, PortalResponse, PortalResults, Stage};
pub use render::{GstRenderer, Renderer};
pub use session::{Controller, Dispatch, Phase};
pub use tray::{StatusTray, TrayView};
pub use types::{RequestToken, SessionHandle, SessionToken, StreamDescriptor, TokenMinter};
pub use window::X11Display;
