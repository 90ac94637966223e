// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ArbResult, ArbiterError, Completion, TransferStart, NUM_INTERFACES};
use std::sync::{Condvar, OnceLock};

/// Fixed part of an output interface, written once at bring-up.
pub struct Registration {
    pub index: usize,
    pub dma_mask: u32,
    pub(crate) start: Box<dyn TransferStart>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("index", &self.index)
            .field("dma_mask", &format_args!("{:#x}", self.dma_mask))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct InterfaceSlot {
    registration: OnceLock<Registration>,
    /// Paired with the arbiter's region mutex.
    dma_done: Condvar,
}

/// Slot table for the controller's output interfaces.
///
/// Registration data is immutable once set and read without the exclusive
/// region; the transient per-transfer state lives in [`CallbackSlots`].
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    slots: [InterfaceSlot; NUM_INTERFACES],
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        index: usize,
        start: Box<dyn TransferStart>,
        dma_mask: u32,
    ) -> ArbResult<()> {
        let slot = self
            .slots
            .get(index)
            .ok_or(ArbiterError::InvalidIndex(index))?;
        if dma_mask == 0 {
            return Err(ArbiterError::EmptyMask);
        }
        slot.registration
            .set(Registration {
                index,
                dma_mask,
                start,
            })
            .map_err(|_| ArbiterError::AlreadyRegistered(index))
    }

    pub fn lookup(&self, index: usize) -> ArbResult<&Registration> {
        self.slots
            .get(index)
            .ok_or(ArbiterError::InvalidIndex(index))?
            .registration
            .get()
            .ok_or(ArbiterError::NotRegistered(index))
    }

    pub fn is_registered(&self, index: usize) -> bool {
        self.lookup(index).is_ok()
    }

    /// Registered interfaces in index order.
    pub fn registered(&self) -> impl Iterator<Item = &Registration> {
        self.slots.iter().filter_map(|s| s.registration.get())
    }

    pub(crate) fn wait_signal(&self, index: usize) -> &Condvar {
        &self.slots[index].dma_done
    }
}

/// Per-interface completion state, guarded by the exclusive region.
#[derive(Default)]
pub(crate) struct CallbackSlots {
    pub(crate) dma: Option<Completion>,
    pub(crate) irq: Option<Completion>,
    pub(crate) irq_mask: u32,
}

impl CallbackSlots {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
