//! Frame-paced CPU scheduler.
//!
//! The host owns the event loop. It calls [`Clock::start`], then
//! [`Clock::on_timer`] whenever the returned deadline passes. Each call runs
//! one frame of whole instructions; nothing inside a frame yields.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_core::Bus;
use mos_6502::{Coverage, Cpu65x02, CpuState, Frame, Registers, StateError};
use serde::{Deserialize, Serialize};

use crate::breakpoints::{Breakpoint, Breakpoints};
use crate::config::ClockConfig;
use crate::events::{ClockListener, StopReason};
use crate::step::{StepHooks, StepMode, StepState};
use crate::time::{SystemTime, TimeSource};

type BreakHook = Box<dyn FnMut(u16) -> Option<String>>;

/// Requests a stop from outside the clock. Honoured after the current
/// instruction.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

/// Scheduler state for rewind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub step_mode: StepMode,
    pub step_depth: i32,
    pub step_break: Option<u16>,
    pub cpu: CpuState,
}

/// What the debugger-protocol layer shows while stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugState {
    pub pc: u16,
    pub registers: Registers,
    pub cycles: u64,
    /// Innermost first.
    pub call_stack: Vec<Frame>,
    pub running: bool,
}

pub struct Clock<B: Bus, T: TimeSource = SystemTime> {
    cpu: Cpu65x02,
    bus: B,
    config: ClockConfig,
    cycles_per_frame: u64,
    time: T,
    coverage: Option<Coverage>,
    breakpoints: Breakpoints,
    step: StepState,
    break_hook: Option<BreakHook>,
    listener: Box<dyn ClockListener>,
    stop_handle: StopHandle,
    running: bool,
    /// Deadline of the next frame, in `time` milliseconds.
    next_frame: f64,
    /// Cycles the last frame ran past its budget, owed by the next one.
    overshoot: u64,
    frames: u64,
}

impl<B: Bus, T: TimeSource> Clock<B, T> {
    /// Build a stopped clock.
    ///
    /// # Panics
    ///
    /// Panics if the clock frequency is not an exact multiple of the frame
    /// rate.
    pub fn new(cpu: Cpu65x02, bus: B, config: ClockConfig, time: T) -> Self {
        let cycles_per_frame = config.cycles_per_frame();
        let coverage = config.coverage.then(|| Coverage::new(cpu.variant()));
        Self {
            cpu,
            bus,
            config,
            cycles_per_frame,
            time,
            coverage,
            breakpoints: Breakpoints::default(),
            step: StepState::default(),
            break_hook: None,
            listener: Box::new(()),
            stop_handle: StopHandle::default(),
            running: false,
            next_frame: 0.0,
            overshoot: 0,
            frames: 0,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn ClockListener>) {
        self.listener = listener;
    }

    // ------------------------------------------------------------------
    // Real-time run
    // ------------------------------------------------------------------

    /// Start running. Returns the deadline of the first frame.
    pub fn start(&mut self) -> f64 {
        if self.running {
            return self.next_frame;
        }
        self.running = true;
        self.stop_handle.take();
        self.overshoot = 0;
        self.next_frame = self.time.now_ms();
        log::debug!("clock started at ${:04X}", self.cpu.pc());
        self.listener.started();
        self.next_frame
    }

    /// Run one frame. Returns the next deadline, or `None` once stopped.
    pub fn on_timer(&mut self) -> Option<f64> {
        if !self.running {
            return None;
        }

        let frame_start = self.time.now_ms();
        let budget = self.cycles_per_frame.saturating_sub(self.overshoot);
        let executed = self.advance_clock(budget);
        if !self.running {
            return None;
        }
        self.overshoot = executed.saturating_sub(budget);
        self.frames += 1;
        self.listener.refresh();

        let frame_ms = self.config.frame_ms();
        self.next_frame += frame_ms;
        let now = self.time.now_ms();
        if self.next_frame < now || now - frame_start > frame_ms + self.config.slack_ms {
            log::trace!(
                "frame pacing re-anchored ({:.1} ms behind)",
                now - self.next_frame
            );
            self.next_frame = now;
        }
        Some(self.next_frame)
    }

    /// Execute whole instructions until `budget` cycles have run or a stop
    /// condition fires. Returns the cycles executed.
    pub fn advance_clock(&mut self, budget: u64) -> u64 {
        let mut executed = 0;
        while executed < budget {
            let brk = self.execute_instruction(&mut executed);
            if let Some(reason) = self.check_stop(brk) {
                self.stop(reason);
                break;
            }
        }
        executed
    }

    /// Run one instruction (or spliced interrupt). Returns whether BRK ran.
    fn execute_instruction(&mut self, executed: &mut u64) -> bool {
        let start = self.cpu.pc();
        let opcode = self.cpu.opcode();
        let interrupted = self.cpu.interrupt_due();

        let mut hooks = StepHooks {
            step: &mut self.step,
            brk: false,
        };
        *executed += u64::from(self.cpu.next_instruction(&mut self.bus, &mut hooks));
        let brk = hooks.brk;

        if let Some(coverage) = &mut self.coverage
            && !interrupted
        {
            coverage.step(start, self.cpu.pc(), opcode);
        }
        if brk {
            self.listener.debug();
        }
        brk
    }

    fn check_stop(&mut self, brk: bool) -> Option<StopReason> {
        let pc = self.cpu.pc();
        if self.stop_handle.take() {
            return Some(StopReason::Requested);
        }
        if self.step.step_break == Some(pc) {
            self.step.step_break = None;
            return Some(StopReason::Step);
        }
        if self.breakpoints.contains(pc) {
            return Some(StopReason::Breakpoint);
        }
        if brk && self.config.stop_on_brk {
            return Some(StopReason::Breakpoint);
        }
        if let Some(hook) = &mut self.break_hook
            && let Some(reason) = hook(pc)
            && !reason.is_empty()
        {
            return Some(StopReason::Hook(reason));
        }
        if self.step.mode == StepMode::Stop {
            return Some(StopReason::Step);
        }
        None
    }

    /// Stop and notify. Always emits the event, even if already stopped.
    pub fn stop(&mut self, reason: StopReason) {
        self.running = false;
        self.step.clear();
        log::debug!("clock stopped at ${:04X}: {reason}", self.cpu.pc());
        self.listener.refresh();
        self.flush_coverage();
        self.listener.stopped(&reason);
    }

    /// Handle for stopping the clock from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Push changed coverage cells to the listener.
    pub fn flush_coverage(&mut self) {
        if let Some(coverage) = &mut self.coverage {
            let listener = &mut self.listener;
            coverage.process_each(|address, flags| listener.coverage(address, flags));
        }
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Execute exactly one instruction.
    pub fn step_into(&mut self) {
        if self.ignore_step("step into") {
            return;
        }
        self.step.mode = StepMode::Stop;
        self.running = true;
        self.listener.started();
        self.advance_clock(self.cycles_per_frame);
    }

    /// Step over a JSR at PC; anything else is a step into. Returns the
    /// first frame deadline when the step continues in real time.
    pub fn step_over(&mut self) -> Option<f64> {
        if self.ignore_step("step over") {
            return None;
        }
        if !self.cpu.current_descriptor().is_call() {
            self.step_into();
            return None;
        }
        self.step.mode = StepMode::Over;
        self.step.depth = 0;
        Some(self.start())
    }

    /// Run until the current subroutine returns.
    pub fn step_out(&mut self) -> Option<f64> {
        if self.ignore_step("step out") {
            return None;
        }
        self.step.mode = StepMode::Out;
        self.step.depth = 1;
        Some(self.start())
    }

    /// Like step over, but a backward conditional branch runs until it
    /// falls through.
    pub fn step_forward(&mut self) -> Option<f64> {
        if self.ignore_step("step forward") {
            return None;
        }
        let pc = self.cpu.pc();
        let descriptor = self.cpu.current_descriptor();
        if descriptor.operation.is_conditional_branch() {
            let fall_through = pc.wrapping_add(u16::from(descriptor.bytes));
            let offset = self.bus.read_const(fall_through.wrapping_sub(1)) as i8;
            let target = fall_through.wrapping_add_signed(i16::from(offset));
            if target <= pc {
                self.step.mode = StepMode::None;
                self.step.step_break = Some(fall_through);
                return Some(self.start());
            }
        }
        if descriptor.is_call() {
            return self.step_over();
        }
        self.step_into();
        None
    }

    fn ignore_step(&self, what: &str) -> bool {
        if self.running {
            log::debug!("{what} ignored while running");
        }
        self.running
    }

    // ------------------------------------------------------------------
    // Breakpoints and hooks
    // ------------------------------------------------------------------

    /// Replace the active breakpoint set.
    pub fn set_breakpoints(&mut self, requested: &[Breakpoint]) {
        self.breakpoints.set(requested);
    }

    #[must_use]
    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Install a host check run after every instruction. A non-empty reason
    /// stops the clock.
    pub fn set_break_hook<F>(&mut self, hook: F)
    where
        F: FnMut(u16) -> Option<String> + 'static,
    {
        self.break_hook = Some(Box::new(hook));
    }

    pub fn clear_break_hook(&mut self) {
        self.break_hook = None;
    }

    // ------------------------------------------------------------------
    // Reset and state
    // ------------------------------------------------------------------

    /// Warm reset through the reset vector.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.stop(StopReason::Reset);
    }

    /// Power cycle the CPU and forget coverage.
    pub fn hard_reset(&mut self) {
        self.cpu = Cpu65x02::new(self.cpu.variant());
        self.cpu.reset(&mut self.bus);
        if let Some(coverage) = &mut self.coverage {
            coverage.clear();
        }
        self.frames = 0;
        self.stop(StopReason::HardReset);
    }

    #[must_use]
    pub fn state(&self) -> ClockState {
        ClockState {
            step_mode: self.step.mode,
            step_depth: self.step.depth,
            step_break: self.step.step_break,
            cpu: self.cpu.state(),
        }
    }

    pub fn set_state(&mut self, state: &ClockState) -> Result<(), StateError> {
        self.cpu.set_state(&state.cpu)?;
        self.step = StepState {
            mode: state.step_mode,
            depth: state.step_depth,
            step_break: state.step_break,
        };
        Ok(())
    }

    #[must_use]
    pub fn debug_state(&self) -> DebugState {
        DebugState {
            pc: self.cpu.pc(),
            registers: self.cpu.regs,
            cycles: self.cpu.cycles(),
            call_stack: self.cpu.virtual_stack().call_stack().copied().collect(),
            running: self.running,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn step_mode(&self) -> StepMode {
        self.step.mode
    }

    #[must_use]
    pub fn cycles_per_frame(&self) -> u64 {
        self.cycles_per_frame
    }

    /// Frames completed since construction or hard reset.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    #[must_use]
    pub fn cpu(&self) -> &Cpu65x02 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu65x02 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    #[must_use]
    pub fn coverage(&self) -> Option<&Coverage> {
        self.coverage.as_ref()
    }
}
