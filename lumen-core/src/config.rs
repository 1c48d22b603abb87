//! Configuration types for Lumen
//!
//! The helper has no user-facing configuration: capture, pipeline, window
//! and tray policy are fixed. These types spell that policy out so it is
//! typed rather than assembled as loose dictionaries at call sites.

use ashpd::desktop::screencast::{CursorMode as PortalCursorMode, SourceType};
use ashpd::enumflags2::BitFlags;

/// Cursor capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorMode {
    /// Hide cursor in capture
    Hidden,
    /// Show cursor embedded in capture frames
    #[default]
    Embedded,
    /// Cursor metadata only (compositor-dependent)
    Metadata,
}

impl CursorMode {
    /// Wire value for the `cursor_mode` option
    pub fn portal_bits(self) -> u32 {
        let mode = match self {
            Self::Hidden => PortalCursorMode::Hidden,
            Self::Embedded => PortalCursorMode::Embedded,
            Self::Metadata => PortalCursorMode::Metadata,
        };
        BitFlags::from(mode).bits()
    }
}

/// Options sent with SelectSources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSelection {
    /// Allow picking more than one source
    pub multiple: bool,
    /// How the cursor appears in the stream
    pub cursor_mode: CursorMode,
    /// Source kinds offered in the portal dialog
    pub types: BitFlags<SourceType>,
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self {
            multiple: false,
            cursor_mode: CursorMode::Embedded,
            types: SourceType::Monitor | SourceType::Window,
        }
    }
}

impl SourceSelection {
    /// Set whether several sources may be selected
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Set the cursor mode
    pub fn with_cursor_mode(mut self, cursor_mode: CursorMode) -> Self {
        self.cursor_mode = cursor_mode;
        self
    }

    /// Set the offered source types
    pub fn with_types(mut self, types: BitFlags<SourceType>) -> Self {
        self.types = types;
        self
    }

    /// Wire value for the `types` option
    pub fn types_bits(&self) -> u32 {
        self.types.bits()
    }
}

/// Playback pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Frame rate cap applied after the source, bounds CPU/GPU load
    pub max_framerate: u32,
    /// Whether the sink synchronizes to the pipeline clock
    pub sync: bool,
    /// Source element reading the portal's PipeWire remote
    pub source_element: String,
    /// Rate limiting element
    pub rate_element: String,
    /// Colorspace conversion element
    pub convert_element: String,
    /// Display sink; must implement GstVideoOverlay
    pub sink_element: String,
    /// Name given to the sink in the pipeline
    pub sink_name: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_framerate: 15,
            sync: false,
            source_element: "pipewiresrc".to_string(),
            rate_element: "videorate".to_string(),
            convert_element: "videoconvert".to_string(),
            sink_element: "ximagesink".to_string(),
            sink_name: "sink".to_string(),
        }
    }
}

impl RenderConfig {
    /// Set the frame rate cap
    pub fn with_max_framerate(mut self, fps: u32) -> Self {
        self.max_framerate = fps;
        self
    }

    /// Set the display sink element
    pub fn with_sink_element(mut self, element: impl Into<String>) -> Self {
        self.sink_element = element.into();
        self
    }
}

/// Presentation window policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Keep the window below every other window
    pub keep_below: bool,
    /// Hide from pagers/window switchers
    pub skip_pager: bool,
    /// Hide from the taskbar
    pub skip_taskbar: bool,
    /// Let the user close the window from the window manager
    pub closable: bool,
    /// Accept keyboard focus
    pub accept_focus: bool,
    /// Draw window manager decorations
    pub decorated: bool,
    /// Size used when the portal does not report stream geometry
    pub fallback_size: (u32, u32),
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Legacy screenshare helper".to_string(),
            keep_below: true,
            skip_pager: true,
            skip_taskbar: true,
            closable: false,
            accept_focus: false,
            decorated: false,
            fallback_size: (1920, 1080),
        }
    }
}

impl WindowConfig {
    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Tray icon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayConfig {
    /// StatusNotifierItem id
    pub id: String,
    /// Tooltip/title
    pub title: String,
    /// Freedesktop icon name
    pub icon_name: String,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            id: "screenshare-helper".to_string(),
            title: "Screenshare helper".to_string(),
            icon_name: "media-playback-start".to_string(),
        }
    }
}

/// Complete helper configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperConfig {
    pub selection: SourceSelection,
    pub render: RenderConfig,
    pub window: WindowConfig,
    pub tray: TrayConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection_wire_values() {
        let selection = SourceSelection::default();
        assert!(!selection.multiple);
        assert_eq!(selection.cursor_mode.portal_bits(), 2);
        assert_eq!(selection.types_bits(), 1 | 2);
    }

    #[test]
    fn test_cursor_mode_bits() {
        assert_eq!(CursorMode::Hidden.portal_bits(), 1);
        assert_eq!(CursorMode::Metadata.portal_bits(), 4);
    }
}
