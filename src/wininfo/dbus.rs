//! D-Bus receiver for focused-window updates.
//!
//! Exports one object with a single method:
//!
//!   destination: com.github.keyswift.WinInfoReceiver
//!   path:        /com/github/keyswift/WinInfoReceiver
//!   method:      UpdateActiveWindow(s) -- JSON {"title": …, "class": …}
//!
//! A co-installed compositor extension calls it on every focus change. The
//! receiver parses the payload, stores it in the shared `FocusState`, and
//! invokes the registered change callback. Connection setup failure is left
//! to the caller, which degrades to an empty window class rather than
//! aborting startup.

use std::sync::Arc;

use serde::Deserialize;
use zbus::blocking::connection::Builder;
use zbus::blocking::Connection;
use zbus::interface;

use super::{FocusState, WinInfo};

pub const BUS_NAME: &str = "com.github.keyswift.WinInfoReceiver";
pub const BUS_PATH: &str = "/com/github/keyswift/WinInfoReceiver";

/// Called with the new window info after each accepted update.
pub type ChangeCallback = Box<dyn Fn(&WinInfo) + Send + Sync>;

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    class: String,
}

fn parse_payload(raw: &str) -> Result<WinInfo, serde_json::Error> {
    let payload: Payload = serde_json::from_str(raw)?;
    Ok(WinInfo {
        title: payload.title,
        class: payload.class,
    })
}

// ---------------------------------------------------------------------------
// Exported object
// ---------------------------------------------------------------------------

struct Receiver {
    state: Arc<FocusState>,
    on_change: Option<ChangeCallback>,
}

#[interface(name = "com.github.keyswift.WinInfoReceiver")]
impl Receiver {
    fn update_active_window(&self, payload: &str) {
        match parse_payload(payload) {
            Ok(info) => {
                log::debug!("wininfo: focus -> {:?} ({:?})", info.class, info.title);
                self.state.update(info.clone());
                if let Some(cb) = &self.on_change {
                    cb(&info);
                }
            }
            Err(e) => {
                log::warn!("wininfo: discarding malformed payload: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor lifetime
// ---------------------------------------------------------------------------

/// Owns the bus connection; updates are dispatched on the connection's own
/// thread for as long as this value lives.
pub struct WindowMonitor {
    _conn: Connection,
}

impl WindowMonitor {
    /// Claims the bus name and exports the receiver object.
    pub fn start(
        state: Arc<FocusState>,
        on_change: Option<ChangeCallback>,
    ) -> zbus::Result<Self> {
        let conn = Builder::session()?
            .name(BUS_NAME)?
            .serve_at(BUS_PATH, Receiver { state, on_change })?
            .build()?;
        log::info!("wininfo: listening on {BUS_NAME}");
        Ok(Self { _conn: conn })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
