//! Core types for Lumen
//!
//! Request/session tokens, the portal session handle and the negotiated
//! stream descriptor that flows from the portal client to the renderer.

use std::fmt;

/// Object path prefix shared by portal request and session objects
pub const PORTAL_DESKTOP_PATH: &str = "/org/freedesktop/portal/desktop";

/// Token minted for one portal request (`handle_token`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Get the raw serial
    pub fn serial(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Token minted for one capture session (`session_handle_token`)
///
/// Also identifies everything spawned for that capture (remote fd,
/// pipeline, window) so late events from an old capture can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Get the raw serial
    pub fn serial(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// A request token together with the object path its Response arrives on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    /// Token sent as `handle_token`
    pub token: RequestToken,
    /// `/org/freedesktop/portal/desktop/request/<sender>/<token>`
    pub path: String,
}

/// Mints request and session tokens for the lifetime of the process
///
/// Counters only move forward: a reused token would let a stale response
/// handler swallow the reply meant for a new request.
#[derive(Debug)]
pub struct TokenMinter {
    sender: String,
    last_request: u64,
    last_session: u64,
}

impl TokenMinter {
    /// Create a minter for the given D-Bus unique name (e.g. `:1.42`)
    pub fn new(unique_name: &str) -> Self {
        Self {
            sender: sanitize_sender(unique_name),
            last_request: 0,
            last_session: 0,
        }
    }

    /// Sanitized sender component used in object paths
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Mint the next request token and its response path
    pub fn next_request(&mut self) -> PortalRequest {
        self.last_request += 1;
        let token = RequestToken(self.last_request);
        PortalRequest {
            path: format!("{}/request/{}/{}", PORTAL_DESKTOP_PATH, self.sender, token),
            token,
        }
    }

    /// Mint the next session token
    pub fn next_session(&mut self) -> SessionToken {
        self.last_session += 1;
        SessionToken(self.last_session)
    }

    /// Object path the portal will give the session created with `token`
    pub fn session_path(&self, token: SessionToken) -> String {
        format!("{}/session/{}/{}", PORTAL_DESKTOP_PATH, self.sender, token)
    }
}

/// Strip the leading `:` of a unique name and replace every
/// non-alphanumeric character with `_`
pub fn sanitize_sender(unique_name: &str) -> String {
    unique_name
        .trim_start_matches(':')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Portal-issued session object path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wrap a session object path
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Get the object path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of source the user picked in the portal dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Full monitor/display
    Monitor,
    /// Individual window
    Window,
    /// Virtual output
    Virtual,
}

impl SourceKind {
    /// Decode the portal's `source_type` bit
    pub fn from_portal_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Monitor),
            2 => Some(Self::Window),
            4 => Some(Self::Virtual),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor => write!(f, "Monitor"),
            Self::Window => write!(f, "Window"),
            Self::Virtual => write!(f, "Virtual"),
        }
    }
}

/// One negotiated capture stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// PipeWire node id to attach the source element to
    pub node_id: u32,
    /// Stream width in pixels
    pub width: u32,
    /// Stream height in pixels
    pub height: u32,
    /// Source kind, when the portal reports it
    pub source_kind: Option<SourceKind>,
}

impl StreamDescriptor {
    /// Create a descriptor with known geometry
    pub fn new(node_id: u32, width: u32, height: u32) -> Self {
        Self {
            node_id,
            width,
            height,
            source_kind: None,
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} ({}x{})", self.node_id, self.width, self.height)
    }
}

/// Axis-aligned rectangle in root window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a rectangle
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle containing every input, `None` for no input
    pub fn bounding(rects: &[Rect]) -> Option<Rect> {
        let x0 = rects.iter().map(|r| r.x).min()?;
        let y0 = rects.iter().map(|r| r.y).min()?;
        let x1 = rects.iter().map(|r| r.x + r.width as i32).max()?;
        let y1 = rects.iter().map(|r| r.y + r.height as i32).max()?;
        Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
