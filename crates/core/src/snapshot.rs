// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::metrics::StatsSnapshot;
use crate::{DisplayArbiter, DisplayHardware, OutputFormat, NUM_INTERFACES};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceSnapshot {
    pub index: usize,
    pub registered: bool,
    pub dma_mask: u32,
    pub irq_mask: u32,
    pub dma_callback_armed: bool,
    pub irq_callback_armed: bool,
    pub consecutive_timeouts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbiterSnapshot {
    pub name: String,
    pub pending_mask: u32,
    pub powered: bool,
    pub output_format: Option<OutputFormat>,
    pub interfaces: Vec<InterfaceSnapshot>,
    pub stats: StatsSnapshot,
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    /// Consistent view of the arbiter, taken under the exclusive region.
    pub fn snapshot(&self) -> ArbiterSnapshot {
        let region = self.lock_region();
        let interfaces = (0..NUM_INTERFACES)
            .map(|index| {
                let slot = &region.slots[index];
                let registration = self.registry.lookup(index).ok();
                InterfaceSnapshot {
                    index,
                    registered: registration.is_some(),
                    dma_mask: registration.map_or(0, |r| r.dma_mask),
                    irq_mask: slot.irq_mask,
                    dma_callback_armed: slot.dma.is_some(),
                    irq_callback_armed: slot.irq.is_some(),
                    consecutive_timeouts: self.waits.consecutive_timeouts(index),
                }
            })
            .collect();

        ArbiterSnapshot {
            name: self.name().to_string(),
            pending_mask: region.mask.pending(),
            powered: region.mask.is_powered(),
            output_format: region.format.current(),
            interfaces,
            stats: self.stats.snapshot(),
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}
