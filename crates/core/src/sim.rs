// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{DisplayHardware, OutputFormat};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Hardware access recorded by [`SimulatedController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HwEvent {
    SetClockRate(u64),
    ClockEnable,
    ClockDisable,
    IrqLineEnable,
    IrqLineDisable,
    AckStatus(u32),
    WriteEnableMask(u32),
    ApplyFormat(OutputFormat),
}

#[derive(Debug, Default, serde::Serialize)]
struct SimState {
    status: u32,
    enable_mask: u32,
    clock_rate: u64,
    clock_enabled: bool,
    irq_line_enabled: bool,
    format: Option<OutputFormat>,
    events: Vec<HwEvent>,
}

/// Display controller model with a latched status register.
///
/// Clones share state, so a test can keep a handle after moving one into
/// the arbiter.
#[derive(Debug, Clone, Default)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latch status bits, as the controller does when a block completes.
    pub fn raise(&self, bits: u32) {
        self.state().status |= bits;
    }

    /// True when the controller would be asserting its interrupt line.
    pub fn line_asserted(&self) -> bool {
        let s = self.state();
        s.irq_line_enabled && (s.status & s.enable_mask) != 0
    }

    pub fn status(&self) -> u32 {
        self.state().status
    }

    pub fn enable_mask(&self) -> u32 {
        self.state().enable_mask
    }

    /// Overwrite the enable register without recording an event.
    pub fn force_enable_mask(&self, mask: u32) {
        self.state().enable_mask = mask;
    }

    pub fn clock_rate(&self) -> u64 {
        self.state().clock_rate
    }

    pub fn is_clock_enabled(&self) -> bool {
        self.state().clock_enabled
    }

    pub fn is_irq_line_enabled(&self) -> bool {
        self.state().irq_line_enabled
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.state().format
    }

    pub fn events(&self) -> Vec<HwEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn power_ups(&self) -> usize {
        self.count(|e| *e == HwEvent::IrqLineEnable)
    }

    pub fn power_downs(&self) -> usize {
        self.count(|e| *e == HwEvent::IrqLineDisable)
    }

    pub fn count(&self, pred: impl Fn(&HwEvent) -> bool) -> usize {
        self.state().events.iter().filter(|e| pred(*e)).count()
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&*self.state()).unwrap_or(serde_json::Value::Null)
    }

    fn record(&self, event: HwEvent) {
        self.state().events.push(event);
    }
}

impl DisplayHardware for SimulatedController {
    fn read_status(&mut self) -> u32 {
        self.state().status
    }

    fn ack_status(&mut self, bits: u32) {
        // Write 1 to clear
        self.state().status &= !bits;
        self.record(HwEvent::AckStatus(bits));
    }

    fn write_enable_mask(&mut self, mask: u32) {
        self.state().enable_mask = mask;
        self.record(HwEvent::WriteEnableMask(mask));
    }

    fn set_clock_rate(&mut self, hz: u64) {
        self.state().clock_rate = hz;
        self.record(HwEvent::SetClockRate(hz));
    }

    fn clock_enable(&mut self) {
        self.state().clock_enabled = true;
        self.record(HwEvent::ClockEnable);
    }

    fn clock_disable(&mut self) {
        self.state().clock_enabled = false;
        self.record(HwEvent::ClockDisable);
    }

    fn irq_line_enable(&mut self) {
        self.state().irq_line_enabled = true;
        self.record(HwEvent::IrqLineEnable);
    }

    fn irq_line_disable(&mut self) {
        self.state().irq_line_enabled = false;
        self.record(HwEvent::IrqLineDisable);
    }

    fn apply_output_format(&mut self, format: OutputFormat) {
        self.state().format = Some(format);
        self.record(HwEvent::ApplyFormat(format));
    }

    fn diagnostics(&self) -> Vec<(&'static str, u32)> {
        let s = self.state();
        vec![
            ("INTR_STATUS", s.status),
            ("INTR_ENABLE", s.enable_mask),
            ("CLK_ENA", s.clock_enabled as u32),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_latch_and_ack() {
        let mut sim = SimulatedController::new();
        sim.raise(0x4000);
        sim.raise(0x0001);
        assert_eq!(sim.read_status(), 0x4001);
        sim.ack_status(0x4000);
        assert_eq!(sim.status(), 0x0001);
        assert_eq!(sim.events(), vec![HwEvent::AckStatus(0x4000)]);
    }

    #[test]
    fn test_line_asserted_needs_enable_and_line() {
        let mut sim = SimulatedController::new();
        sim.raise(0x4000);
        assert!(!sim.line_asserted());
        sim.write_enable_mask(0x4000);
        assert!(!sim.line_asserted());
        sim.irq_line_enable();
        assert!(sim.line_asserted());
        sim.write_enable_mask(0x0004);
        assert!(!sim.line_asserted());
    }

    #[test]
    fn test_clones_share_state() {
        let sim = SimulatedController::new();
        let mut other = sim.clone();
        other.clock_enable();
        other.set_clock_rate(128_000_000);
        assert!(sim.is_clock_enabled());
        assert_eq!(sim.clock_rate(), 128_000_000);
        assert_eq!(sim.snapshot()["clock_rate"], 128_000_000);
    }
}
