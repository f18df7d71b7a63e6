//! Step modes driven by the CPU's call/return hooks.

use mos_6502::CpuHooks;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMode {
    /// Free running.
    #[default]
    None,
    /// Run until the call at PC returns.
    Over,
    /// Run until the current subroutine returns.
    Out,
    /// Stop after the current instruction.
    Stop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepState {
    pub mode: StepMode,
    /// Calls minus returns since the step began, offset by the mode's start.
    pub depth: i32,
    /// One-shot stop address.
    pub step_break: Option<u16>,
}

impl StepState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Hooks handed to the CPU for one instruction.
pub(crate) struct StepHooks<'a> {
    pub step: &'a mut StepState,
    pub brk: bool,
}

impl CpuHooks for StepHooks<'_> {
    fn call(&mut self) {
        if matches!(self.step.mode, StepMode::Over | StepMode::Out) {
            self.step.depth += 1;
        }
    }

    fn returned(&mut self) {
        if matches!(self.step.mode, StepMode::Over | StepMode::Out) {
            self.step.depth -= 1;
            if self.step.depth <= 0 {
                self.step.mode = StepMode::Stop;
            }
        }
    }

    fn debug(&mut self) {
        self.brk = true;
    }
}
