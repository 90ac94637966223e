// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mask::PowerTransition;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ArbiterStats {
    power_ups: AtomicU64,
    power_downs: AtomicU64,
    interrupts: AtomicU64,
    spurious_interrupts: AtomicU64,
    dma_completions: AtomicU64,
    busy_rejections: AtomicU64,
    timeouts: AtomicU64,
    escalations: AtomicU64,
}

/// Plain copy of [`ArbiterStats`] for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct StatsSnapshot {
    pub power_ups: u64,
    pub power_downs: u64,
    pub interrupts: u64,
    pub spurious_interrupts: u64,
    pub dma_completions: u64,
    pub busy_rejections: u64,
    pub timeouts: u64,
    pub escalations: u64,
}

impl ArbiterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        for counter in [
            &self.power_ups,
            &self.power_downs,
            &self.interrupts,
            &self.spurious_interrupts,
            &self.dma_completions,
            &self.busy_rejections,
            &self.timeouts,
            &self.escalations,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub(crate) fn record_transition(&self, transition: PowerTransition) {
        match transition {
            PowerTransition::PoweredUp => {
                self.power_ups.fetch_add(1, Ordering::SeqCst);
            }
            PowerTransition::PoweredDown => {
                self.power_downs.fetch_add(1, Ordering::SeqCst);
            }
            PowerTransition::None => {}
        }
    }

    pub(crate) fn record_interrupt(&self, serviced: u32) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        if serviced == 0 {
            self.spurious_interrupts.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn record_dma_completion(&self) {
        self.dma_completions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get_power_ups(&self) -> u64 {
        self.power_ups.load(Ordering::SeqCst)
    }

    pub fn get_power_downs(&self) -> u64 {
        self.power_downs.load(Ordering::SeqCst)
    }

    pub fn get_interrupts(&self) -> u64 {
        self.interrupts.load(Ordering::SeqCst)
    }

    pub fn get_spurious_interrupts(&self) -> u64 {
        self.spurious_interrupts.load(Ordering::SeqCst)
    }

    pub fn get_dma_completions(&self) -> u64 {
        self.dma_completions.load(Ordering::SeqCst)
    }

    pub fn get_busy_rejections(&self) -> u64 {
        self.busy_rejections.load(Ordering::SeqCst)
    }

    pub fn get_timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn get_escalations(&self) -> u64 {
        self.escalations.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            power_ups: self.get_power_ups(),
            power_downs: self.get_power_downs(),
            interrupts: self.get_interrupts(),
            spurious_interrupts: self.get_spurious_interrupts(),
            dma_completions: self.get_dma_completions(),
            busy_rejections: self.get_busy_rejections(),
            timeouts: self.get_timeouts(),
            escalations: self.get_escalations(),
        }
    }
}
