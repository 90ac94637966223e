// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ArbResult, ArbiterError, DisplayArbiter, DisplayHardware, NUM_INTERFACES};
use panelmux_config::WaitConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::PoisonError;
use std::time::Duration;

/// An interface that stopped answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    pub index: usize,
    pub consecutive_timeouts: u32,
}

/// Invoked when an interface exceeds its consecutive-timeout budget.
pub trait FatalHandler: Send + Sync {
    fn escalate(&self, event: &Escalation);
}

impl<F> FatalHandler for F
where
    F: Fn(&Escalation) + Send + Sync,
{
    fn escalate(&self, event: &Escalation) {
        self(event)
    }
}

/// Default handler: a wedged display pipeline takes the process down.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnWedge;

impl FatalHandler for AbortOnWedge {
    fn escalate(&self, event: &Escalation) {
        tracing::error!(
            "display dma on interface {} failed {} times in a row, controller wedged",
            event.index,
            event.consecutive_timeouts
        );
        std::process::abort();
    }
}

/// Timeout bookkeeping for blocking waits. One counter per interface.
pub struct WaitCoordinator {
    timeout: Duration,
    max_consecutive_timeouts: u32,
    consecutive: [AtomicU32; NUM_INTERFACES],
    fatal: Box<dyn FatalHandler>,
}

impl WaitCoordinator {
    pub fn new(config: &WaitConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_consecutive_timeouts: config.max_consecutive_timeouts,
            consecutive: Default::default(),
            fatal: Box::new(AbortOnWedge),
        }
    }

    pub fn set_fatal_handler(&mut self, handler: Box<dyn FatalHandler>) {
        self.fatal = handler;
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn consecutive_timeouts(&self, index: usize) -> u32 {
        self.consecutive
            .get(index)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    pub(crate) fn record_success(&self, index: usize) {
        if let Some(counter) = self.consecutive.get(index) {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Count a timeout. Returns true if this one crossed the threshold and
    /// the fatal handler ran.
    pub(crate) fn record_timeout(&self, index: usize) -> bool {
        let Some(counter) = self.consecutive.get(index) else {
            return false;
        };
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count <= self.max_consecutive_timeouts {
            return false;
        }

        counter.store(0, Ordering::SeqCst);
        let event = Escalation {
            index,
            consecutive_timeouts: count,
        };
        tracing::error!(
            "dma on interface {} failed {} times, something's wrong!",
            index,
            self.max_consecutive_timeouts
        );
        self.fatal.escalate(&event);
        true
    }
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    /// Block until the DMA started by the last [`submit`](Self::submit) on
    /// `index` completes, or `timeout` elapses.
    ///
    /// On timeout the completion bit is released so the interface can be
    /// used again. Too many timeouts in a row escalate to the fatal handler.
    pub fn wait_for(&self, index: usize, timeout: Duration) -> ArbResult<()> {
        let bits = match self.registry.lookup(index) {
            Ok(registration) => registration.dma_mask,
            Err(e) => {
                tracing::error!("{}: wait on interface {}: {}", self.name(), index, e);
                return Err(e);
            }
        };

        let region = self.lock_region();
        let (mut region, _) = self
            .registry
            .wait_signal(index)
            .wait_timeout_while(region, timeout, |r| r.mask.is_pending(bits))
            .unwrap_or_else(PoisonError::into_inner);

        // Predicate is re-evaluated under the lock, so a completion that
        // raced with the timer still counts.
        let result = if region.mask.is_pending(bits) {
            tracing::warn!(
                "{}: timeout waiting for interface {} to complete {:#x}",
                self.name(),
                index,
                bits
            );
            for (reg, value) in region.mask.hardware().diagnostics() {
                tracing::info!("{}: {}: {:08X}", self.name(), reg, value);
            }
            self.locked_disable(&mut region, bits)?;
            Err(ArbiterError::TimedOut { index, bits })
        } else {
            Ok(())
        };
        drop(region);

        match result {
            Ok(()) => self.waits.record_success(index),
            Err(_) => {
                self.stats.record_timeout();
                if self.waits.record_timeout(index) {
                    self.stats.record_escalation();
                }
            }
        }
        result
    }

    /// [`wait_for`](Self::wait_for) with the configured timeout.
    pub fn wait_for_default(&self, index: usize) -> ArbResult<()> {
        self.wait_for(index, self.waits.default_timeout())
    }

    pub fn consecutive_timeouts(&self, index: usize) -> u32 {
        self.waits.consecutive_timeouts(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn coordinator(max: u32) -> (WaitCoordinator, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        let mut waits = WaitCoordinator::new(&WaitConfig {
            timeout_ms: 10,
            max_consecutive_timeouts: max,
        });
        waits.set_fatal_handler(Box::new(move |_e: &Escalation| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        (waits, fired)
    }

    #[test]
    fn test_threshold_crossed_on_next_timeout() {
        let (waits, fired) = coordinator(3);
        assert!(!waits.record_timeout(0));
        assert!(!waits.record_timeout(0));
        assert!(!waits.record_timeout(0));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(waits.record_timeout(0));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(waits.consecutive_timeouts(0), 0);
    }

    #[test]
    fn test_success_resets_counter() {
        let (waits, fired) = coordinator(2);
        waits.record_timeout(1);
        waits.record_timeout(1);
        waits.record_success(1);
        waits.record_timeout(1);
        waits.record_timeout(1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(waits.consecutive_timeouts(1), 2);
    }

    #[test]
    fn test_counters_are_per_interface() {
        let (waits, fired) = coordinator(1);
        waits.record_timeout(0);
        waits.record_timeout(1);
        waits.record_timeout(2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(waits.consecutive_timeouts(2), 1);
        assert_eq!(waits.consecutive_timeouts(9), 0);
    }

    #[test]
    fn test_escalation_event_carries_count() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        let mut waits = WaitCoordinator::new(&WaitConfig {
            timeout_ms: 10,
            max_consecutive_timeouts: 0,
        });
        waits.set_fatal_handler(Box::new(move |e: &Escalation| {
            s.lock().unwrap().push(*e);
        }));

        assert!(waits.record_timeout(2));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Escalation {
                index: 2,
                consecutive_timeouts: 1
            }]
        );
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let (waits, fired) = coordinator(0);
        waits.record_success(7);
        assert!(!waits.record_timeout(7));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(waits.consecutive_timeouts(7), 0);
    }
}
