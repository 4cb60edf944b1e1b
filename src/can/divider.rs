//! MultiCAN fractional divider
//!
//! The module clock runs from the peripheral clock through the fractional
//! divider (FDR). In normal mode, the output is `source / (1024 - STEP)`.
//! In fractional mode, the output is `source * STEP / 1024`.
//! [`fractional_divider`] computes both and keeps the one that lands
//! closer to the target.

use super::regs::global::FDR;
use crate::Error;

/// FDR.DM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum DividerMode {
    /// Integer division.
    Normal = 1,
    /// Multiply by `STEP / 1024`.
    Fractional = 2,
}

/// A divider setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Divider {
    pub mode: DividerMode,
    /// 0 ..= 1023.
    pub step: u16,
    /// The resulting module clock, in Hz.
    pub frequency: u32,
}

impl Divider {
    /// The FDR STEP and DM fields for this setting. All other FDR
    /// bits are zero.
    pub const fn fdr(&self) -> u32 {
        (((self.step as u32) << FDR::STEP::offset) & FDR::STEP::mask)
            | (((self.mode as u32) << FDR::DM::offset) & FDR::DM::mask)
    }
}

const STEP_MAX: u32 = 1023;
const STEPS: u32 = 1024;

/// Compute the divider setting that brings `source` closest to `target`.
///
/// Returns [`Error::CanFrequencyOutOfRange`] if `target` is zero, or if
/// it exceeds `source`. Normal mode wins ties.
pub fn fractional_divider(source: u32, target: u32) -> Result<Divider, Error> {
    if target == 0 || target > source {
        return Err(Error::CanFrequencyOutOfRange);
    }

    let normal_step = STEPS.saturating_sub(source / target).min(STEP_MAX);
    let normal = Divider {
        mode: DividerMode::Normal,
        step: normal_step as u16,
        frequency: source / (STEPS - normal_step),
    };

    // Fractional arithmetic drops the low six bits to stay in range.
    let coarse_source = u64::from(source >> 6);
    let fractional_step = (u64::from(STEPS) * u64::from(target >> 6))
        .checked_div(coarse_source)
        .map_or(0, |step| step.min(u64::from(STEP_MAX)));
    let fractional = Divider {
        mode: DividerMode::Fractional,
        step: fractional_step as u16,
        frequency: ((coarse_source * fractional_step / u64::from(STEPS)) << 6) as u32,
    };

    let divider = if target.abs_diff(normal.frequency) <= target.abs_diff(fractional.frequency) {
        normal
    } else {
        fractional
    };
    trace!("Divider {=u32} Hz -> {}", source, divider);
    Ok(divider)
}

#[cfg(test)]
mod tests {
    use super::{fractional_divider, Divider, DividerMode};
    use crate::Error;

    #[test]
    fn integer_ratio_uses_normal_mode() {
        assert_eq!(
            fractional_divider(120_000_000, 40_000_000),
            Ok(Divider {
                mode: DividerMode::Normal,
                step: 1021,
                frequency: 40_000_000
            })
        );
    }

    #[test]
    fn undivided() {
        let divider = fractional_divider(120_000_000, 120_000_000).unwrap();
        assert_eq!(divider.mode, DividerMode::Normal);
        assert_eq!(divider.step, 1023);
        assert_eq!(divider.frequency, 120_000_000);
    }

    #[test]
    fn fraction_beats_integer() {
        assert_eq!(
            fractional_divider(80_000_000, 30_000_000),
            Ok(Divider {
                mode: DividerMode::Fractional,
                step: 384,
                frequency: 30_000_000
            })
        );
        assert_eq!(
            fractional_divider(144_000_000, 120_000_000),
            Ok(Divider {
                mode: DividerMode::Fractional,
                step: 853,
                frequency: 119_953_088
            })
        );
    }

    #[test]
    fn target_below_reach_clamps() {
        let divider = fractional_divider(120_000_000, 100_000).unwrap();
        assert_eq!(divider.mode, DividerMode::Normal);
        assert_eq!(divider.step, 0);
        assert_eq!(divider.frequency, 117_187);
    }

    #[test]
    fn out_of_range() {
        assert_eq!(
            fractional_divider(80_000_000, 0),
            Err(Error::CanFrequencyOutOfRange)
        );
        assert_eq!(
            fractional_divider(80_000_000, 80_000_001),
            Err(Error::CanFrequencyOutOfRange)
        );
    }

    #[test]
    fn fdr_fields() {
        let normal = Divider {
            mode: DividerMode::Normal,
            step: 1021,
            frequency: 40_000_000,
        };
        assert_eq!(normal.fdr(), 0x4000 | 1021);
        let fractional = Divider {
            mode: DividerMode::Fractional,
            step: 384,
            frequency: 30_000_000,
        };
        assert_eq!(fractional.fdr(), 0x8000 | 384);
    }
}
