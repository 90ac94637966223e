// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ArbResult, ArbiterError, Completion, DisplayArbiter, DisplayHardware};

/// Region of a framebuffer to push to a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TransferRequest {
    /// Bus address of the source buffer.
    pub buffer: u64,
    pub stride: u32,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    /// Start a DMA transfer on `index`.
    ///
    /// Fails with `Busy` while the previous transfer's completion bit is still
    /// pending. `callback` runs from interrupt context when the transfer
    /// completes; callers without one use [`wait_for`](Self::wait_for).
    pub fn submit(
        &self,
        index: usize,
        request: TransferRequest,
        callback: Option<Completion>,
    ) -> ArbResult<()> {
        let registration = match self.registry.lookup(index) {
            Ok(registration) => registration,
            Err(_) => {
                tracing::error!("{}: unknown interface: {}", self.name(), index);
                return Err(ArbiterError::UnknownInterface(index));
            }
        };

        {
            let mut region = self.lock_region();
            match self.locked_enable(&mut region, registration.dma_mask) {
                Ok(()) => {}
                Err(ArbiterError::AlreadyPending { .. }) => {
                    tracing::warn!("{}: interface {} busy", self.name(), index);
                    self.stats.record_busy();
                    return Err(ArbiterError::Busy(index));
                }
                Err(e) => return Err(e),
            }
            region.slots[index].dma = callback;
        }

        tracing::trace!(
            "{}: dma on interface {}: {}x{} at ({}, {}) from {:#x}",
            self.name(),
            index,
            request.width,
            request.height,
            request.x,
            request.y,
            request.buffer
        );
        registration.start.start(request);
        Ok(())
    }

    /// Submit without a callback and block until completion or timeout.
    pub fn submit_and_wait(&self, index: usize, request: TransferRequest) -> ArbResult<()> {
        self.submit(index, request, None)?;
        self.wait_for_default(index)
    }
}
