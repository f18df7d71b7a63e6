//! Notifications from the clock to the debugger layer and UI.

use std::fmt;
use std::sync::mpsc::Sender;

use mos_6502::CoverageFlags;
use serde::{Deserialize, Serialize};

/// Why the clock stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Explicit stop from the host.
    Requested,
    /// A step finished.
    Step,
    Breakpoint,
    Launch,
    Attach,
    Reset,
    HardReset,
    Disconnect,
    /// The host break hook fired with this message.
    Hook(String),
}

impl StopReason {
    /// Name used on the debugger protocol.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Requested => "requested",
            Self::Step => "step",
            Self::Breakpoint => "breakpoint",
            Self::Launch => "launch",
            Self::Attach => "attach",
            Self::Reset => "reset",
            Self::HardReset => "hardReset",
            Self::Disconnect => "disconnect",
            Self::Hook(reason) => reason,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives clock events. Every method defaults to doing nothing.
pub trait ClockListener {
    fn started(&mut self) {}
    fn stopped(&mut self, _reason: &StopReason) {}
    /// The display should be redrawn.
    fn refresh(&mut self) {}
    /// Coverage flags at `address` changed since the last flush.
    fn coverage(&mut self, _address: u16, _flags: CoverageFlags) {}
    /// BRK executed.
    fn debug(&mut self) {}
}

impl ClockListener for () {}

/// Owned form of the listener callbacks, for channel-based consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    Started,
    Stopped(StopReason),
    Refresh,
    Coverage(u16, CoverageFlags),
    Debug,
}

/// Forwards events over a channel. A disconnected receiver drops them.
impl ClockListener for Sender<ClockEvent> {
    fn started(&mut self) {
        let _ = self.send(ClockEvent::Started);
    }

    fn stopped(&mut self, reason: &StopReason) {
        let _ = self.send(ClockEvent::Stopped(reason.clone()));
    }

    fn refresh(&mut self) {
        let _ = self.send(ClockEvent::Refresh);
    }

    fn coverage(&mut self, address: u16, flags: CoverageFlags) {
        let _ = self.send(ClockEvent::Coverage(address, flags));
    }

    fn debug(&mut self) {
        let _ = self.send(ClockEvent::Debug);
    }
}
