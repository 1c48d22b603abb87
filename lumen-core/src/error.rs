//! Error types for Lumen

use thiserror::Error;

/// Result type alias using LumenError
pub type Result<T> = std::result::Result<T, LumenError>;

/// Main error type for Lumen operations
#[derive(Debug, Error)]
pub enum LumenError {
    /// Portal/D-Bus communication error
    #[error("Portal error: {0}")]
    Portal(String),

    /// The portal answered a request with a non-zero status
    #[error("Portal {stage} request failed with status {status}")]
    PortalStatus {
        /// Negotiation stage that failed
        stage: &'static str,
        /// Raw response code (opaque)
        status: u32,
    },

    /// Portal results were missing a required entry
    #[error("Malformed portal response: {0}")]
    MalformedResponse(String),

    /// GStreamer pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// X11 display/window error
    #[error("Display error: {0}")]
    Display(String),

    /// Status notifier tray error
    #[error("Tray error: {0}")]
    Tray(String),

    /// Capture session not active
    #[error("No active capture session")]
    NoActiveSession,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LumenError>,
    },
}

impl LumenError {
    /// Create a portal error
    pub fn portal(msg: impl Into<String>) -> Self {
        Self::Portal(msg.into())
    }

    /// Create a pipeline error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Create a display error
    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Create a tray error
    pub fn tray(msg: impl Into<String>) -> Self {
        Self::Tray(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &LumenError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Short troubleshooting hint shown next to the error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Portal(_) | Self::MalformedResponse(_) => Some(
                "Make sure xdg-desktop-portal and a backend (gnome, kde, wlr) are running",
            ),
            Self::PortalStatus { status: 1, .. } => {
                Some("The screen selection dialog was cancelled; click Start to try again")
            }
            Self::PortalStatus { .. } => {
                Some("The portal refused the request; check the xdg-desktop-portal logs")
            }
            Self::Pipeline(_) => Some(
                "Check that PipeWire is running and the GStreamer pipewire/ximagesink plugins are installed",
            ),
            Self::Display(_) => Some("An X11 display is required; check that DISPLAY is set"),
            Self::Tray(_) => Some(
                "A StatusNotifierItem host is required (e.g. a panel with tray support)",
            ),
            _ => None,
        }
    }

    /// Whether clicking Start again may succeed without changing the system
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::Portal(_)
                | Self::PortalStatus { .. }
                | Self::Pipeline(_)
                | Self::NoActiveSession
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<zbus::Error> for LumenError {
    fn from(err: zbus::Error) -> Self {
        Self::Portal(format!("D-Bus error: {}", err))
    }
}

impl From<zbus::zvariant::Error> for LumenError {
    fn from(err: zbus::zvariant::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<gst::glib::Error> for LumenError {
    fn from(err: gst::glib::Error) -> Self {
        Self::Pipeline(err.to_string())
    }
}

impl From<gst::glib::BoolError> for LumenError {
    fn from(err: gst::glib::BoolError) -> Self {
        Self::Pipeline(err.to_string())
    }
}

impl From<gst::StateChangeError> for LumenError {
    fn from(err: gst::StateChangeError) -> Self {
        Self::Pipeline(format!("State change failed: {}", err))
    }
}

impl From<x11rb::errors::ConnectError> for LumenError {
    fn from(err: x11rb::errors::ConnectError) -> Self {
        Self::Display(format!("Cannot connect to X server: {}", err))
    }
}

impl From<x11rb::errors::ConnectionError> for LumenError {
    fn from(err: x11rb::errors::ConnectionError) -> Self {
        Self::Display(err.to_string())
    }
}

impl From<x11rb::errors::ReplyError> for LumenError {
    fn from(err: x11rb::errors::ReplyError) -> Self {
        Self::Display(err.to_string())
    }
}

impl From<x11rb::errors::ReplyOrIdError> for LumenError {
    fn from(err: x11rb::errors::ReplyOrIdError) -> Self {
        Self::Display(err.to_string())
    }
}
