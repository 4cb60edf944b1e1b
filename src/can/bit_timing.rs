//! Nominal bit timing
//!
//! A CAN bit is divided into time quanta (Tq). One quantum is the
//! synchronization segment, then come `time_segment_1` and
//! `time_segment_2` quanta. The bus samples between the two segments:
//!
//! ```text
//! quanta       = 1 + time_segment_1 + time_segment_2
//! baud rate    = can_frequency / (prescaler * quanta)
//! sample point = (1 + time_segment_1) / quanta
//! ```
//!
//! [`solve`] searches in two stages. First, it picks the prescaler and
//! quanta count that best approximate the baud rate
//! ([`search_baudrate`]). Then it splits the quanta into the two segments
//! that best approximate the sample point ([`search_sample_point`]).
//!
//! Sample points are expressed in hundredths of a percent: `7500` is 75%.
//! Intermediate baud rate arithmetic keeps one decimal digit; see [`Deci`].

use crate::Error;

/// Largest baud rate prescaler.
pub const PRESCALER_MAX: u8 = 64;
/// Fewest quanta in a bit: sync + 3 + 1.
pub const QUANTA_MIN: u8 = 5;
/// Most quanta in a bit considered by the search.
pub const QUANTA_MAX: u8 = 20;
/// Largest time segment 1 that fits NBTR.TSEG1.
pub const TIME_SEGMENT_1_MAX: u8 = 16;
/// Largest time segment 2 that fits NBTR.TSEG2.
pub const TIME_SEGMENT_2_MAX: u8 = 8;
/// Largest synchronization jump width that fits NBTR.SJW.
pub const SJW_MAX: u8 = 4;
/// Denominator of a sample point.
pub const SAMPLE_POINT_SCALE: u32 = 10_000;

/// The CAN kernel frequency must be above this value...
pub const CAN_FREQUENCY_MIN: u32 = 5_000_000;
/// ...and at most this value.
pub const CAN_FREQUENCY_MAX: u32 = 120_000_000;
/// Slowest supported baud rate.
pub const BAUDRATE_MIN: u32 = 100_000;
/// Fastest supported baud rate.
pub const BAUDRATE_MAX: u32 = 1_000_000;

const TIME_SEGMENT_1_MIN: u8 = 3;
const TIME_SEGMENT_1_SCAN_START: u8 = 64;

/// Stop looking once the baud rate is within 100 bps.
const BAUDRATE_GOOD_ENOUGH: Deci = Deci(1000);

/// A fixed-point value with one decimal digit.
///
/// `Deci(125)` is 12.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deci(pub u32);

impl Deci {
    /// Tenths per unit.
    pub const SCALE: u32 = 10;

    /// Returns `None` if `value` doesn't fit.
    pub const fn from_integer(value: u32) -> Option<Self> {
        match value.checked_mul(Self::SCALE) {
            Some(tenths) => Some(Deci(tenths)),
            None => None,
        }
    }

    /// Round to an integer.
    ///
    /// The value rounds up only when the tenths digit is above 5. A
    /// tenths digit of exactly 5 rounds down.
    pub const fn round(self) -> u32 {
        let whole = self.0 / Self::SCALE;
        if self.0 % Self::SCALE > 5 {
            whole + 1
        } else {
            whole
        }
    }

    pub const fn abs_diff(self, other: Deci) -> Deci {
        Deci(self.0.abs_diff(other.0))
    }
}

/// A nominal bit time request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTimeRequest {
    /// CAN kernel clock, in Hz.
    pub can_frequency: u32,
    /// Bits per second.
    pub baudrate: u32,
    /// Hundredths of a percent, 1 ..= 9999.
    pub sample_point: u16,
    /// Synchronization jump width, in quanta. 1 ..= 4.
    pub sjw: u8,
}

impl BitTimeRequest {
    /// A request with an 80% sample point and a one quantum jump width.
    pub const fn new(can_frequency: u32, baudrate: u32) -> Self {
        BitTimeRequest {
            can_frequency,
            baudrate,
            sample_point: 8000,
            sjw: 1,
        }
    }

    /// Set the sample point, in hundredths of a percent.
    pub const fn sample_point(mut self, sample_point: u16) -> Self {
        self.sample_point = sample_point;
        self
    }

    /// Set the synchronization jump width.
    pub const fn sjw(mut self, sjw: u8) -> Self {
        self.sjw = sjw;
        self
    }

    /// Check the request against the supported ranges.
    pub fn validate(&self) -> Result<(), Error> {
        if self.can_frequency <= CAN_FREQUENCY_MIN || self.can_frequency > CAN_FREQUENCY_MAX {
            return Err(Error::CanFrequencyOutOfRange);
        }
        if !(BAUDRATE_MIN..=BAUDRATE_MAX).contains(&self.baudrate) {
            return Err(Error::BaudrateOutOfRange);
        }
        if self.sample_point == 0 || u32::from(self.sample_point) >= SAMPLE_POINT_SCALE {
            return Err(Error::SamplePointOutOfRange);
        }
        if !(1..=SJW_MAX).contains(&self.sjw) {
            return Err(Error::SyncJumpWidthOutOfRange);
        }
        Ok(())
    }
}

/// Bit timing parameters, as counts of quanta.
///
/// These are the actual values, not the minus-one register encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub prescaler: u8,
    pub time_segment_1: u8,
    pub time_segment_2: u8,
    pub sjw: u8,
}

impl BitTiming {
    /// Quanta per bit.
    pub const fn quanta(&self) -> u32 {
        1 + self.time_segment_1 as u32 + self.time_segment_2 as u32
    }

    /// The baud rate these parameters produce from `can_frequency`.
    pub const fn baudrate(&self, can_frequency: u32) -> u32 {
        can_frequency / (self.prescaler as u32 * self.quanta())
    }

    /// The sample point, in hundredths of a percent.
    pub const fn sample_point(&self) -> u32 {
        (self.time_segment_1 as u32 + 1) * SAMPLE_POINT_SCALE / self.quanta()
    }

    /// Returns `true` if every value fits its NBTR field.
    pub const fn is_encodable(&self) -> bool {
        self.prescaler >= 1
            && self.prescaler <= PRESCALER_MAX
            && self.time_segment_1 >= 1
            && self.time_segment_1 <= TIME_SEGMENT_1_MAX
            && self.time_segment_2 >= 1
            && self.time_segment_2 <= TIME_SEGMENT_2_MAX
            && self.sjw >= 1
            && self.sjw <= SJW_MAX
    }
}

/// The outcome of the baud rate stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudrateMatch {
    pub prescaler: u8,
    pub quanta: u8,
    /// Distance from the requested baud rate.
    pub error: Deci,
}

/// Find the prescaler and quanta count closest to `baudrate`.
///
/// Prescalers are tried from 1 upwards. For each, the quanta count is the
/// rounded quotient of the quantum frequency and the baud rate; counts
/// outside of 5 ..= 20 are skipped. Only a strictly smaller error replaces
/// the current best, so ties go to the smallest prescaler. The search
/// stops early once the error is under 100 bps.
///
/// Returns `None` if no prescaler produces a usable quanta count, or if
/// `baudrate` is zero.
pub fn search_baudrate(can_frequency: u32, baudrate: u32) -> Option<BaudrateMatch> {
    let frequency = Deci::from_integer(can_frequency)?;
    let target = Deci::from_integer(baudrate)?;
    if baudrate == 0 {
        return None;
    }

    let mut best: Option<BaudrateMatch> = None;
    for prescaler in 1..=PRESCALER_MAX {
        let quantum_frequency = Deci(frequency.0 / u32::from(prescaler));
        let quanta = Deci(quantum_frequency.0 / baudrate).round();
        if !(u32::from(QUANTA_MIN)..=u32::from(QUANTA_MAX)).contains(&quanta) {
            continue;
        }

        let error = Deci(quantum_frequency.0 / quanta).abs_diff(target);
        if best.map_or(true, |best| best.error > error) {
            best = Some(BaudrateMatch {
                prescaler,
                quanta: quanta as u8,
                error,
            });
            if error < BAUDRATE_GOOD_ENOUGH {
                break;
            }
        }
    }
    best
}

/// Find the time segment 1 length that places the sample point closest
/// to `sample_point`, given `quanta` per bit.
///
/// Candidates are scanned from long to short. A candidate is skipped
/// if it leaves less than one quantum for time segment 2, or if either
/// segment overflows its NBTR field. The scan stops after the first
/// candidate whose sample point falls below the target. Ties keep the
/// longer segment.
///
/// Returns `None` if no candidate fits.
pub fn search_sample_point(quanta: u8, sample_point: u16) -> Option<u8> {
    let quanta = u32::from(quanta);
    let target = u32::from(sample_point);

    let mut best: Option<(u8, u32)> = None;
    for time_segment_1 in (TIME_SEGMENT_1_MIN..=TIME_SEGMENT_1_SCAN_START).rev() {
        let Some(time_segment_2) = quanta.checked_sub(u32::from(time_segment_1) + 1) else {
            continue;
        };
        if time_segment_2 < 1
            || time_segment_1 > TIME_SEGMENT_1_MAX
            || time_segment_2 > u32::from(TIME_SEGMENT_2_MAX)
        {
            continue;
        }

        let candidate = (u32::from(time_segment_1) + 1) * SAMPLE_POINT_SCALE / quanta;
        let error = candidate.abs_diff(target);
        if best.map_or(true, |(_, best_error)| best_error > error) {
            best = Some((time_segment_1, error));
        }
        if candidate < target {
            break;
        }
    }
    best.map(|(time_segment_1, _)| time_segment_1)
}

/// Compute the bit timing for `request`.
///
/// ```
/// use xmc4_hal::can::bit_timing::{self, BitTimeRequest, BitTiming};
///
/// let request = BitTimeRequest::new(80_000_000, 500_000).sample_point(7500);
/// let timing = bit_timing::solve(&request).unwrap();
/// assert_eq!(
///     timing,
///     BitTiming { prescaler: 8, time_segment_1: 14, time_segment_2: 5, sjw: 1 }
/// );
/// ```
pub fn solve(request: &BitTimeRequest) -> Result<BitTiming, Error> {
    request.validate()?;

    let baudrate =
        search_baudrate(request.can_frequency, request.baudrate).ok_or(Error::NoBitTiming)?;
    let time_segment_1 =
        search_sample_point(baudrate.quanta, request.sample_point).ok_or(Error::NoBitTiming)?;

    let timing = BitTiming {
        prescaler: baudrate.prescaler,
        time_segment_1,
        time_segment_2: baudrate.quanta - time_segment_1 - 1,
        sjw: request.sjw,
    };
    debug!(
        "Bit timing {=u32} Hz / {=u32} bps: {}",
        request.can_frequency,
        request.baudrate,
        timing
    );
    Ok(timing)
}
