// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{ArbResult, ArbiterError, DisplayArbiter, DisplayHardware};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Rgb565,
    Rgb888,
    Xrgb8888,
}

/// Component order the DMA engine packs into the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackPattern {
    #[default]
    Rgb,
    Bgr,
}

/// Framebuffer format consumed by the primary DMA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct OutputFormat {
    pub pixel: PixelFormat,
    pub pack: PackPattern,
}

impl OutputFormat {
    pub fn from_bpp(bpp: u32) -> ArbResult<Self> {
        let (pixel, pack) = match bpp {
            16 => (PixelFormat::Rgb565, PackPattern::Rgb),
            24 => (PixelFormat::Rgb888, PackPattern::Bgr),
            32 => (PixelFormat::Xrgb8888, PackPattern::Bgr),
            _ => return Err(ArbiterError::UnsupportedFormat(bpp)),
        };
        Ok(Self { pixel, pack })
    }

    pub fn bits_per_pixel(&self) -> u32 {
        match self.pixel {
            PixelFormat::Rgb565 => 16,
            PixelFormat::Rgb888 => 24,
            PixelFormat::Xrgb8888 => 32,
        }
    }
}

pub fn check_output_format(bpp: u32) -> ArbResult<()> {
    OutputFormat::from_bpp(bpp).map(|_| ())
}

/// Selected format plus whether the hardware still has the old one.
/// Nothing is selected until the first `set_output_format`.
#[derive(Debug, Default)]
pub(crate) struct FormatState {
    current: Option<OutputFormat>,
    dirty: bool,
}

impl FormatState {
    pub(crate) fn select(&mut self, format: OutputFormat) -> bool {
        if self.current == Some(format) {
            return false;
        }
        self.current = Some(format);
        self.dirty = true;
        true
    }

    pub(crate) fn take_dirty(&mut self) -> Option<OutputFormat> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.current
    }

    pub(crate) fn current(&self) -> Option<OutputFormat> {
        self.current
    }
}

impl<H: DisplayHardware> DisplayArbiter<H> {
    /// Select the framebuffer format. Takes effect on the next
    /// [`configure_dma`](Self::configure_dma).
    pub fn set_output_format(&self, bpp: u32) -> ArbResult<()> {
        let format = OutputFormat::from_bpp(bpp)?;
        if self.lock_region().format.select(format) {
            tracing::debug!("{}: output format now {:?}", self.name(), format);
        }
        Ok(())
    }

    /// Push a changed format to the DMA engine. Returns whether anything was
    /// written.
    pub fn configure_dma(&self) -> bool {
        let mut region = self.lock_region();
        let Some(format) = region.format.take_dirty() else {
            return false;
        };
        region.mask.hardware_mut().apply_output_format(format);
        true
    }

    /// Currently selected format, if any has been chosen.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.lock_region().format.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_depths() {
        assert!(check_output_format(16).is_ok());
        assert!(check_output_format(24).is_ok());
        assert!(check_output_format(32).is_ok());
        assert_eq!(
            check_output_format(8),
            Err(ArbiterError::UnsupportedFormat(8))
        );
    }

    #[test]
    fn test_depth_mapping() {
        let f = OutputFormat::from_bpp(24).unwrap();
        assert_eq!(f.pixel, PixelFormat::Rgb888);
        assert_eq!(f.pack, PackPattern::Bgr);
        assert_eq!(f.bits_per_pixel(), 24);
        assert_eq!(OutputFormat::from_bpp(16).unwrap(), OutputFormat::default());
    }

    #[test]
    fn test_select_marks_dirty_only_on_change() {
        let mut state = FormatState::default();
        assert_eq!(state.take_dirty(), None);
        assert_eq!(state.current(), None);

        let rgb565 = OutputFormat::from_bpp(16).unwrap();
        assert!(state.select(rgb565));
        assert_eq!(state.take_dirty(), Some(rgb565));
        assert!(!state.select(rgb565));
        assert_eq!(state.take_dirty(), None);

        let xrgb = OutputFormat::from_bpp(32).unwrap();
        assert!(state.select(xrgb));
        assert_eq!(state.take_dirty(), Some(xrgb));
        assert_eq!(state.take_dirty(), None);
        assert_eq!(state.current(), Some(xrgb));
    }

    #[test]
    fn test_first_selection_pushed_even_for_default_depth() {
        use crate::sim::SimulatedController;
        use crate::ControllerConfig;

        let sim = SimulatedController::new();
        let arb = DisplayArbiter::new(sim.clone(), &ControllerConfig::default());
        assert_eq!(arb.output_format(), None);

        arb.set_output_format(16).unwrap();
        assert!(arb.configure_dma());
        assert_eq!(sim.format(), Some(OutputFormat::from_bpp(16).unwrap()));
        assert!(!arb.configure_dma());
    }
}
