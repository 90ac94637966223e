// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::format::FormatState;
use crate::mask::MaskArbiter;
use crate::metrics::ArbiterStats;
use crate::registry::{CallbackSlots, InterfaceRegistry, Registration};
use crate::wait::{FatalHandler, WaitCoordinator};
use crate::{
    ArbResult, ArbiterError, Completion, DisplayHardware, TransferStart, TransformSink,
    NUM_INTERFACES,
};
use panelmux_config::{ControllerConfig, InterfaceDescriptor};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything the interrupt context and callers mutate, behind one lock.
pub(crate) struct Region<H> {
    pub(crate) mask: MaskArbiter<H>,
    pub(crate) slots: [CallbackSlots; NUM_INTERFACES],
    pub(crate) format: FormatState,
    pub(crate) transform: Option<Box<dyn TransformSink>>,
}

/// Interrupt and DMA-completion arbiter for one display controller.
///
/// One instance is built at bring-up and shared (typically through an
/// `Arc`) by the interrupt context and every client. The interrupt context
/// calls [`handle_interrupt`](Self::handle_interrupt); clients call
/// [`submit`](Self::submit) and [`wait_for`](Self::wait_for).
///
/// Completion callbacks and the transform sink run with the exclusive region
/// held and must not call back into the arbiter.
pub struct DisplayArbiter<H: DisplayHardware> {
    name: String,
    pub(crate) region: Mutex<Region<H>>,
    pub(crate) registry: InterfaceRegistry,
    pub(crate) waits: WaitCoordinator,
    pub(crate) stats: ArbiterStats,
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    pub fn new(hw: H, config: &ControllerConfig) -> Self {
        tracing::info!(
            "{}: arbiter up (bus clock {} Hz, wait timeout {} ms, {} timeouts tolerated)",
            config.name,
            config.power.bus_clock_hz,
            config.wait.timeout_ms,
            config.wait.max_consecutive_timeouts
        );
        Self {
            name: config.name.clone(),
            region: Mutex::new(Region {
                mask: MaskArbiter::new(hw, config.power.bus_clock_hz),
                slots: Default::default(),
                format: FormatState::default(),
                transform: None,
            }),
            registry: InterfaceRegistry::new(),
            waits: WaitCoordinator::new(&config.wait),
            stats: ArbiterStats::new(),
        }
    }

    /// Replace the handler run when an interface is declared wedged.
    pub fn with_fatal_handler(mut self, handler: impl FatalHandler + 'static) -> Self {
        self.waits.set_fatal_handler(Box::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lock_region(&self) -> MutexGuard<'_, Region<H>> {
        self.region.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(
        &self,
        index: usize,
        start: impl TransferStart + 'static,
        dma_mask: u32,
    ) -> ArbResult<()> {
        if let Err(e) = self.registry.register(index, Box::new(start), dma_mask) {
            tracing::error!("{}: failed to register interface {}: {}", self.name, index, e);
            return Err(e);
        }
        self.lock_region().slots[index].clear();
        tracing::info!(
            "{}: interface {} registered (dma mask {:#x})",
            self.name,
            index,
            dma_mask
        );
        Ok(())
    }

    pub fn register_descriptor(
        &self,
        descriptor: &InterfaceDescriptor,
        start: impl TransferStart + 'static,
    ) -> ArbResult<()> {
        tracing::debug!("{}: registering '{}'", self.name, descriptor.id);
        self.register(descriptor.index, start, descriptor.dma_mask)
    }

    pub fn lookup(&self, index: usize) -> ArbResult<&Registration> {
        self.registry.lookup(index)
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Claim interrupt bits. Powers the controller up if nothing was pending.
    pub fn try_enable(&self, bits: u32) -> ArbResult<()> {
        let mut region = self.lock_region();
        self.locked_enable(&mut region, bits)
    }

    /// Release interrupt bits. Powers the controller down if nothing remains.
    pub fn disable(&self, bits: u32) -> ArbResult<()> {
        let mut region = self.lock_region();
        self.locked_disable(&mut region, bits)
    }

    /// Whether any of `bits` is still pending.
    pub fn is_pending(&self, bits: u32) -> bool {
        self.lock_region().mask.is_pending(bits)
    }

    pub fn pending_mask(&self) -> u32 {
        self.lock_region().mask.pending()
    }

    pub fn is_powered(&self) -> bool {
        self.lock_region().mask.is_powered()
    }

    pub(crate) fn locked_enable(&self, region: &mut Region<H>, bits: u32) -> ArbResult<()> {
        let transition = region.mask.enable(bits)?;
        self.stats.record_transition(transition);
        Ok(())
    }

    pub(crate) fn locked_disable(&self, region: &mut Region<H>, bits: u32) -> ArbResult<()> {
        let transition = region.mask.disable(bits)?;
        self.stats.record_transition(transition);
        Ok(())
    }

    /// Arm (non-empty `bits`) or release (empty `bits`) an interface's
    /// secondary event, such as a frame-start or underflow notification.
    pub fn request_irq(
        &self,
        index: usize,
        bits: u32,
        callback: Option<Completion>,
    ) -> ArbResult<()> {
        if let Err(e) = self.registry.lookup(index) {
            tracing::error!("{}: irq request on interface {}: {}", self.name, index, e);
            return Err(e);
        }

        let mut region = self.lock_region();
        if bits == 0 {
            let armed = region.slots[index].irq_mask;
            if region.mask.is_pending(armed) {
                self.locked_disable(&mut region, armed)?;
            }
            region.slots[index].irq_mask = 0;
            region.slots[index].irq = None;
            return Ok(());
        }

        let armed = region.slots[index].irq_mask;
        if region.mask.is_pending(armed) {
            tracing::warn!(
                "{}: interface {} already waiting on {:#x}",
                self.name,
                index,
                armed
            );
            return Err(ArbiterError::Busy(index));
        }

        if let Err(e) = self.locked_enable(&mut region, bits) {
            tracing::warn!("{}: interface {} irq busy", self.name, index);
            return Err(match e {
                ArbiterError::AlreadyPending { .. } => ArbiterError::Busy(index),
                other => other,
            });
        }
        region.slots[index].irq_mask = bits;
        region.slots[index].irq = callback;
        Ok(())
    }

    /// Install the consumer that receives each serviced status word.
    pub fn attach_transform_sink(&self, sink: impl TransformSink + 'static) {
        let mut region = self.lock_region();
        if region.transform.is_some() {
            tracing::warn!("{}: replacing transform sink", self.name);
        }
        region.transform = Some(Box::new(sink));
    }

    /// Run `f` against the hardware with the exclusive region held.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(self.lock_region().mask.hardware_mut())
    }

    pub fn stats(&self) -> &ArbiterStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedController;
    use crate::{completion, TransferRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn arbiter() -> (DisplayArbiter<SimulatedController>, SimulatedController) {
        let sim = SimulatedController::new();
        let arb = DisplayArbiter::new(sim.clone(), &ControllerConfig::default());
        arb.register(0, |_req: TransferRequest| {}, 0x4000).unwrap();
        (arb, sim)
    }

    #[test]
    fn test_register_twice_keeps_first() {
        let (arb, _sim) = arbiter();
        assert_eq!(
            arb.register(0, |_req: TransferRequest| {}, 0x0004),
            Err(ArbiterError::AlreadyRegistered(0))
        );
        assert_eq!(arb.lookup(0).unwrap().dma_mask, 0x4000);
    }

    #[test]
    fn test_enable_disable_roundtrip_power() {
        let (arb, sim) = arbiter();
        arb.try_enable(0x0001).unwrap();
        assert!(arb.is_powered());
        assert!(arb.is_pending(0x0001));
        assert!(sim.is_clock_enabled());
        assert_eq!(sim.clock_rate(), 128_000_000);

        arb.disable(0x0001).unwrap();
        assert!(!arb.is_powered());
        assert!(!sim.is_clock_enabled());
        assert_eq!(sim.clock_rate(), 0);
        assert_eq!(arb.stats().get_power_ups(), 1);
        assert_eq!(arb.stats().get_power_downs(), 1);
    }

    #[test]
    fn test_request_irq_requires_registration() {
        let (arb, _sim) = arbiter();
        assert_eq!(
            arb.request_irq(1, 0x8000, None),
            Err(ArbiterError::NotRegistered(1))
        );
        assert_eq!(
            arb.request_irq(5, 0x8000, None),
            Err(ArbiterError::InvalidIndex(5))
        );
    }

    #[test]
    fn test_request_irq_busy_and_release() {
        let (arb, sim) = arbiter();
        arb.request_irq(0, 0x0100, None).unwrap();
        assert_eq!(
            arb.request_irq(0, 0x0100, None),
            Err(ArbiterError::Busy(0))
        );

        arb.request_irq(0, 0, None).unwrap();
        assert!(!arb.is_pending(0x0100));
        assert!(!sim.is_irq_line_enabled());

        // Releasing with nothing armed is a no-op.
        arb.request_irq(0, 0, None).unwrap();
        assert_eq!(arb.stats().get_power_downs(), 1);
    }

    #[test]
    fn test_release_drops_irq_callback() {
        let (arb, sim) = arbiter();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        arb.request_irq(
            0,
            0x0100,
            Some(completion(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
        arb.request_irq(0, 0, None).unwrap();

        sim.raise(0x0100);
        arb.handle_interrupt();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_second_irq_request_while_armed_is_busy() {
        let (arb, _sim) = arbiter();
        arb.request_irq(0, 0x0100, None).unwrap();
        assert_eq!(
            arb.request_irq(0, 0x0200, None),
            Err(ArbiterError::Busy(0))
        );
        assert!(arb.is_pending(0x0100));
        assert!(!arb.is_pending(0x0200));
    }

    #[test]
    fn test_fired_irq_no_longer_owned_by_interface() {
        let (arb, sim) = arbiter();
        arb.request_irq(0, 0x0100, None).unwrap();
        sim.raise(0x0100);
        arb.handle_interrupt();

        // Another owner picks the bit up after it fired.
        arb.try_enable(0x0100).unwrap();
        arb.request_irq(0, 0, None).unwrap();
        assert!(arb.is_pending(0x0100));

        arb.disable(0x0100).unwrap();
        arb.request_irq(0, 0x0200, None).unwrap();
        assert!(arb.is_pending(0x0200));
    }

    #[test]
    fn test_with_hardware_sees_owned_controller() {
        let (arb, sim) = arbiter();
        sim.raise(0x2);
        assert_eq!(arb.with_hardware(|hw| hw.status()), 0x2);
    }
}
