//! Info command - show portal, display and GStreamer diagnostics

use anyhow::Result;
use lumen_core::config::{HelperConfig, RenderConfig};
use lumen_core::event;
use lumen_core::portal::DbusPortal;
use lumen_core::types::Rect;
use lumen_core::window::X11Display;

const SOURCE_TYPES: [(u32, &str); 3] = [(1, "monitor"), (2, "window"), (4, "virtual")];
const CURSOR_MODES: [(u32, &str); 3] = [(1, "hidden"), (2, "embedded"), (4, "metadata")];

/// Show system information relevant to the helper
pub async fn info() -> Result<()> {
    println!("Lumen - System Information\n");

    let config = HelperConfig::default();
    let (events, _receiver) = event::channel();

    println!("Screencast Portal:");
    match DbusPortal::connect(events.clone(), config.window.fallback_size).await {
        Ok(portal) => match portal.probe().await {
            Ok(info) => {
                println!("  [OK] Interface version {}", info.version);
                println!("  Source types:  {}", describe_bits(info.source_types, &SOURCE_TYPES));
                println!("  Cursor modes:  {}", describe_bits(info.cursor_modes, &CURSOR_MODES));
                if let Ok(name) = portal.unique_name() {
                    println!("  Bus name:      {}", name);
                }
            }
            Err(e) => println!("  [!!] Portal present but not answering: {}", e),
        },
        Err(e) => {
            println!("  [!!] {}", e);
            if let Some(hint) = e.user_hint() {
                println!("       {}", hint);
            }
        }
    }

    println!();

    println!("X11 Display:");
    match X11Display::connect(events).and_then(|display| display.monitors()) {
        Ok(monitors) => {
            for (index, monitor) in monitors.iter().enumerate() {
                println!("  Monitor {}:  {}", index, monitor);
            }
            match Rect::bounding(&monitors) {
                Some(bounds) => println!("  Bounding box: {}", bounds),
                None => println!("  No monitors reported by RandR"),
            }
        }
        Err(e) => {
            println!("  [!!] {}", e);
            if let Some(hint) = e.user_hint() {
                println!("       {}", hint);
            }
        }
    }

    println!();

    println!("GStreamer:");
    match gst::init() {
        Ok(()) => {
            println!("  Version: {}", gst::version_string());
            for element in pipeline_elements(&config.render) {
                let icon = if gst::ElementFactory::find(element).is_some() {
                    "[OK]"
                } else {
                    "[!!]"
                };
                println!("  {} {}", icon, element);
            }
        }
        Err(e) => println!("  [!!] {}", e),
    }

    Ok(())
}

fn pipeline_elements(render: &RenderConfig) -> [&str; 4] {
    [
        render.source_element.as_str(),
        render.rate_element.as_str(),
        render.convert_element.as_str(),
        render.sink_element.as_str(),
    ]
}

/// Comma-separated names of the bits set in `bits`
fn describe_bits(bits: u32, names: &[(u32, &str)]) -> String {
    let set: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if set.is_empty() {
        "none".to_string()
    } else {
        set.join(", ")
    }
}
