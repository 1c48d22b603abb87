//! StatusNotifierItem tray icon
//!
//! The tray runs the ksni service on its own thread. Menu clicks are posted to
//! the dispatcher as events; the dispatcher pushes the capturing flag back so
//! the menu always offers the action that makes sense next.

use std::thread;

use tracing::{debug, error};

use crate::config::TrayConfig;
use crate::error::{LumenError, Result};
use crate::event::{Event, EventSender};

/// Something that shows whether a capture is active
pub trait TrayView {
    /// Rebuild the menu for the given state
    fn set_capturing(&mut self, capturing: bool);
}

/// Tray menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    Stop,
    Quit,
}

impl MenuAction {
    /// Menu label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "Start Screenshare",
            Self::Stop => "Stop Screenshare",
            Self::Quit => "Quit",
        }
    }

    /// Event posted when the entry is activated
    pub fn event(&self) -> Event {
        match self {
            Self::Start => Event::StartRequested,
            Self::Stop => Event::StopRequested,
            Self::Quit => Event::QuitRequested,
        }
    }
}

/// Menu entries for the given state, top to bottom
pub fn menu_actions(capturing: bool) -> [MenuAction; 2] {
    let toggle = if capturing {
        MenuAction::Stop
    } else {
        MenuAction::Start
    };
    [toggle, MenuAction::Quit]
}

struct TrayModel {
    config: TrayConfig,
    capturing: bool,
    events: EventSender,
}

impl TrayModel {
    fn post(&self, action: MenuAction) {
        debug!("Tray menu: {}", action.label());
        if self.events.send(action.event()).is_err() {
            debug!("Dispatcher gone, ignoring {:?}", action);
        }
    }
}

impl ksni::Tray for TrayModel {
    fn id(&self) -> String {
        self.config.id.clone()
    }

    fn title(&self) -> String {
        self.config.title.clone()
    }

    fn icon_name(&self) -> String {
        self.config.icon_name.clone()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::ApplicationStatus
    }

    fn status(&self) -> ksni::Status {
        ksni::Status::Active
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        menu_actions(self.capturing)
            .into_iter()
            .map(|action| {
                ksni::menu::StandardItem {
                    label: action.label().into(),
                    activate: Box::new(move |tray: &mut Self| tray.post(action)),
                    ..Default::default()
                }
                .into()
            })
            .collect()
    }
}

/// Tray icon registered with the session's StatusNotifierWatcher
pub struct StatusTray {
    handle: ksni::Handle<TrayModel>,
}

impl StatusTray {
    /// Start the tray service on a background thread
    ///
    /// If the service stops, `Event::Fatal` is posted.
    pub fn spawn(config: TrayConfig, events: EventSender) -> Result<Self> {
        let service = ksni::TrayService::new(TrayModel {
            config,
            capturing: false,
            events: events.clone(),
        });
        let handle = service.handle();

        thread::Builder::new()
            .name("lumen-tray".to_string())
            .spawn(move || {
                if let Err(e) = service.run() {
                    error!("Tray service stopped: {}", e);
                    let _ = events.send(Event::Fatal(format!("Tray service stopped: {}", e)));
                }
            })
            .map_err(|e| LumenError::tray(format!("Failed to spawn tray thread: {}", e)))?;

        Ok(Self { handle })
    }
}

impl TrayView for StatusTray {
    fn set_capturing(&mut self, capturing: bool) {
        self.handle.update(move |tray: &mut TrayModel| {
            tray.capturing = capturing;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_menu() {
        let labels: Vec<_> = menu_actions(false).iter().map(|a| a.label()).collect();
        assert_eq!(labels, ["Start Screenshare", "Quit"]);
    }

    #[test]
    fn test_capturing_menu() {
        let labels: Vec<_> = menu_actions(true).iter().map(|a| a.label()).collect();
        assert_eq!(labels, ["Stop Screenshare", "Quit"]);
    }

    #[test]
    fn test_actions_map_to_events() {
        assert!(matches!(MenuAction::Start.event(), Event::StartRequested));
        assert!(matches!(MenuAction::Stop.event(), Event::StopRequested));
        assert!(matches!(MenuAction::Quit.event(), Event::QuitRequested));
    }
}
