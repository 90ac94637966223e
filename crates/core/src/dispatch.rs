// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::arbiter::Region;
use crate::{DisplayArbiter, DisplayHardware};
use std::sync::TryLockError;

/// Outcome of one pass of the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// Nothing asserted that anyone was waiting for.
    None,
    /// These pending bits were serviced and released.
    Handled(u32),
    /// The exclusive region was busy; status is still latched.
    Deferred,
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    /// Interrupt-context entry point.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let mut region = self.lock_region();
        self.service_interrupt(&mut region)
    }

    /// Like [`handle_interrupt`](Self::handle_interrupt) but never waits for
    /// the exclusive region. On `Deferred` the caller re-raises later; the
    /// hardware keeps the status latched until then.
    pub fn try_handle_interrupt(&self) -> IrqReturn {
        match self.region.try_lock() {
            Ok(mut region) => self.service_interrupt(&mut region),
            Err(TryLockError::Poisoned(poisoned)) => {
                let mut region = poisoned.into_inner();
                self.service_interrupt(&mut region)
            }
            Err(TryLockError::WouldBlock) => {
                tracing::trace!("{}: region busy, deferring interrupt", self.name());
                IrqReturn::Deferred
            }
        }
    }

    fn service_interrupt(&self, region: &mut Region<H>) -> IrqReturn {
        let hw = region.mask.hardware_mut();
        let raw = hw.read_status();
        hw.ack_status(raw);

        let status = raw & region.mask.pending();
        self.stats.record_interrupt(status);
        if status == 0 {
            tracing::trace!(
                "{}: status {:#x} outside pending mask {:#x}",
                self.name(),
                raw,
                region.mask.pending()
            );
            return IrqReturn::None;
        }
        tracing::trace!("{}: servicing {:#x}", self.name(), status);

        for reg in self.registry.registered() {
            let slot = &mut region.slots[reg.index];
            if status & reg.dma_mask != 0 {
                if let Some(callback) = slot.dma.take() {
                    callback();
                }
                self.stats.record_dma_completion();
                self.registry.wait_signal(reg.index).notify_all();
            }
            if status & slot.irq_mask != 0 {
                // Serviced bits are released below and no longer ours.
                slot.irq_mask &= !status;
                if let Some(callback) = slot.irq.take() {
                    callback();
                }
            }
        }

        if let Some(sink) = region.transform.as_mut() {
            sink.handle_status(status);
        }

        // One-shot: every serviced bit must be re-armed by its owner.
        if let Err(e) = self.locked_disable(region, status) {
            tracing::error!("{}: release of {:#x} failed: {}", self.name(), status, e);
        }
        IrqReturn::Handled(status)
    }
}
