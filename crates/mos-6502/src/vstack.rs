//! Shadow call stack reconstructed from JSR/RTS and stack pushes.
//!
//! The real 6502 stack cannot tell a return address from pushed data, so the
//! engine reports every JSR, RTS, push and pull here and a parallel list of
//! markers is kept in lock-step. When the markers stop matching the code is
//! doing something unusual with the stack; the shadow is dropped and rebuilt
//! from the next JSR. Interrupts, RTI and JMP are not tracked.

use serde::{Deserialize, Serialize};

use crate::Registers;

const MAX_MARKERS: usize = 256;
const MAX_FRAMES: usize = 128;

/// What a tracked stack byte is believed to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marker {
    /// Low byte of a JSR return address.
    ReturnLow,
    /// High byte of a JSR return address.
    ReturnHigh,
    /// A, X or Y pushed by PHA/PHX/PHY.
    Pha,
    /// Status pushed by PHP.
    Php,
}

/// One active subroutine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Subroutine entry point.
    pub entry: u16,
    /// Registers at the call; `registers.pc` is the JSR address.
    pub registers: Registers,
    /// CPU cycle count at the call.
    pub cycles: u64,
}

/// Serialisable copy of the shadow stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualStackState {
    pub frames: Vec<Frame>,
    pub tracker: Vec<Marker>,
}

#[derive(Debug, Clone, Default)]
pub struct VirtualStack {
    frames: Vec<Frame>,
    tracker: Vec<Marker>,
}

impl VirtualStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// JSR executed: the return address is pushed high byte first.
    pub fn on_call(&mut self, entry: u16, registers: Registers, cycles: u64) {
        self.push_marker(Marker::ReturnHigh);
        self.push_marker(Marker::ReturnLow);
        if self.frames.len() == MAX_FRAMES {
            self.frames.remove(0);
        }
        self.frames.push(Frame {
            entry,
            registers,
            cycles,
        });
    }

    /// RTS executed.
    pub fn on_return(&mut self) {
        let low = self.tracker.pop();
        let high = self.tracker.pop();
        match (low, high) {
            (Some(Marker::ReturnLow), Some(Marker::ReturnHigh)) => {
                self.frames.pop();
            }
            (None, None) if self.frames.is_empty() => {
                log::trace!("return without a tracked call");
            }
            (low, high) => {
                log::warn!(
                    "virtual stack out of sync: RTS popped {low:?}/{high:?}, resetting ({} frames dropped)",
                    self.frames.len()
                );
                self.reset();
            }
        }
    }

    /// PHA, PHX, PHY or PHP executed.
    pub fn on_push(&mut self, marker: Marker) {
        self.push_marker(marker);
    }

    /// PLA, PLX, PLY or PLP executed.
    pub fn on_pull(&mut self) {
        // Pulling the high byte means the return address has been discarded
        // and the subroutine will not come back through RTS.
        if self.tracker.pop() == Some(Marker::ReturnHigh) {
            self.frames.pop();
        }
    }

    fn push_marker(&mut self, marker: Marker) {
        // Each frame owns one ReturnHigh; losing it loses the frame.
        if self.tracker.len() == MAX_MARKERS
            && self.tracker.remove(0) == Marker::ReturnHigh
            && !self.frames.is_empty()
        {
            self.frames.remove(0);
        }
        self.tracker.push(marker);
    }

    /// Active frames, outermost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Active frames, innermost first.
    pub fn call_stack(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.tracker.clear();
    }

    #[must_use]
    pub fn state(&self) -> VirtualStackState {
        VirtualStackState {
            frames: self.frames.clone(),
            tracker: self.tracker.clone(),
        }
    }

    pub fn restore(&mut self, state: &VirtualStackState) {
        self.frames.clone_from(&state.frames);
        self.tracker.clone_from(&state.tracker);
    }
}
