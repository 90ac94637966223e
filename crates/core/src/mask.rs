// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ArbResult, ArbiterError, DisplayHardware};

/// Power edge produced by an enable or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    None,
    PoweredUp,
    PoweredDown,
}

/// Shared pending-event mask and the clock/line power state derived from it.
///
/// These are the unlocked primitives. Callers hold the arbiter's exclusive
/// region; the controller is powered exactly while `pending` is non-zero.
#[derive(Debug)]
pub struct MaskArbiter<H> {
    pending: u32,
    bus_clock_hz: u64,
    hw: H,
}

impl<H: DisplayHardware> MaskArbiter<H> {
    /// Takes ownership of the controller with every interrupt source masked.
    pub fn new(mut hw: H, bus_clock_hz: u64) -> Self {
        hw.write_enable_mask(0);
        Self {
            pending: 0,
            bus_clock_hz,
            hw,
        }
    }

    pub fn enable(&mut self, bits: u32) -> ArbResult<PowerTransition> {
        if bits == 0 {
            return Err(ArbiterError::EmptyMask);
        }
        if self.pending & bits != 0 {
            tracing::warn!("irq already on {:#x} {:#x}", self.pending, bits);
            return Err(ArbiterError::AlreadyPending {
                requested: bits,
                pending: self.pending,
            });
        }

        // Clock and line come up before any status for these bits is trusted.
        let transition = if self.pending == 0 {
            self.hw.set_clock_rate(self.bus_clock_hz);
            self.hw.clock_enable();
            self.hw.irq_line_enable();
            tracing::debug!("Power up (bus clock {} Hz)", self.bus_clock_hz);
            PowerTransition::PoweredUp
        } else {
            PowerTransition::None
        };

        // Drop residue from an earlier assertion of the same bits.
        self.hw.ack_status(bits);

        self.pending |= bits;
        self.hw.write_enable_mask(self.pending);
        tracing::trace!("Enabled {:#x}, pending {:#x}", bits, self.pending);
        Ok(transition)
    }

    pub fn disable(&mut self, bits: u32) -> ArbResult<PowerTransition> {
        if self.pending & bits == 0 {
            tracing::warn!("irq already off {:#x} {:#x}", self.pending, bits);
            return Err(ArbiterError::NotPending {
                requested: bits,
                pending: self.pending,
            });
        }

        self.pending &= !bits;
        self.hw.write_enable_mask(self.pending);
        tracing::trace!("Disabled {:#x}, pending {:#x}", bits, self.pending);

        if self.pending != 0 {
            return Ok(PowerTransition::None);
        }

        self.hw.irq_line_disable();
        self.hw.clock_disable();
        self.hw.set_clock_rate(0);
        tracing::debug!("Power down");
        Ok(PowerTransition::PoweredDown)
    }

    pub fn is_pending(&self, bits: u32) -> bool {
        self.pending & bits != 0
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    pub fn is_powered(&self) -> bool {
        self.pending != 0
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }
}
