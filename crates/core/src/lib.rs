// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod arbiter;
pub mod dispatch;
pub mod dma;
pub mod format;
pub mod mask;
pub mod metrics;
pub mod registry;
pub mod sim;
pub mod snapshot;
pub mod wait;


pub use arbiter::DisplayArbiter;
pub use dispatch::IrqReturn;
pub use dma::TransferRequest;
pub use format::{OutputFormat, PackPattern, PixelFormat};
pub use panelmux_config::{ControllerConfig, NUM_INTERFACES};
pub use wait::{AbortOnWedge, Escalation, FatalHandler};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbiterError {
    #[error("Interface index {0} out of range")]
    InvalidIndex(usize),
    #[error("Unknown interface {0}")]
    UnknownInterface(usize),
    #[error("Interface {0} not registered")]
    NotRegistered(usize),
    #[error("Interface {0} already registered")]
    AlreadyRegistered(usize),
    #[error("Empty interrupt mask")]
    EmptyMask,
    #[error("Interrupt bits {requested:#x} already pending (mask {pending:#x})")]
    AlreadyPending { requested: u32, pending: u32 },
    #[error("Interface {0} busy")]
    Busy(usize),
    #[error("Interrupt bits {requested:#x} not pending (mask {pending:#x})")]
    NotPending { requested: u32, pending: u32 },
    #[error("Timed out waiting on interface {index} for bits {bits:#x}")]
    TimedOut { index: usize, bits: u32 },
    #[error("Unsupported output format: {0} bpp")]
    UnsupportedFormat(u32),
}

pub type ArbResult<T> = Result<T, ArbiterError>;

/// Owned completion handle. Invoked at most once, from interrupt context.
pub type Completion = Box<dyn FnOnce() + Send>;

pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce() + Send + 'static,
{
    Box::new(f)
}

/// Register-level access to the display controller.
///
/// Every method is called with the arbiter's exclusive region held, so an
/// implementation never sees two concurrent callers. Addresses and bit layout
/// of the underlying registers are the implementation's business.
pub trait DisplayHardware: Send {
    /// Raw interrupt status register.
    fn read_status(&mut self) -> u32;
    /// Clear latched status bits (write-one-to-clear).
    fn ack_status(&mut self, bits: u32);
    /// Program the interrupt enable register.
    fn write_enable_mask(&mut self, mask: u32);

    fn set_clock_rate(&mut self, hz: u64);
    fn clock_enable(&mut self);
    fn clock_disable(&mut self);

    /// Unmask the controller's line at the interrupt controller.
    fn irq_line_enable(&mut self);
    /// Mask the line without waiting for a running handler to finish.
    fn irq_line_disable(&mut self);

    fn apply_output_format(&mut self, _format: OutputFormat) {}

    /// Named register values dumped when a wait times out.
    fn diagnostics(&self) -> Vec<(&'static str, u32)> {
        Vec::new()
    }
}

/// Consumer for the blit engine's share of each interrupt.
///
/// Receives every serviced status word, including bits owned by output
/// interfaces; its own bits are disjoint from theirs.
pub trait TransformSink: Send {
    fn handle_status(&mut self, status: u32);
}

impl<F> TransformSink for F
where
    F: FnMut(u32) + Send,
{
    fn handle_status(&mut self, status: u32) {
        self(status)
    }
}

/// Starts a DMA transfer on one output interface.
pub trait TransferStart: Send + Sync {
    fn start(&self, request: TransferRequest);
}

impl<F> TransferStart for F
where
    F: Fn(TransferRequest) + Send + Sync,
{
    fn start(&self, request: TransferRequest) {
        self(request)
    }
}
