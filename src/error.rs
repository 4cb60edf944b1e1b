//! Driver errors

use core::fmt;

/// Errors reported by the SCU and MultiCAN drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A hardware status bit never reached the expected state
    /// within the poll limit.
    Timeout,
    /// The CAN kernel frequency is outside of the supported range.
    CanFrequencyOutOfRange,
    /// The requested baud rate is outside of 100 kbps ..= 1 Mbps.
    BaudrateOutOfRange,
    /// The sample point isn't in the open range (0, 10000).
    SamplePointOutOfRange,
    /// The synchronization jump width isn't in 1 ..= 4 time quanta.
    SyncJumpWidthOutOfRange,
    /// No prescaler produced a usable number of time quanta per bit.
    NoBitTiming,
    /// The bit timing doesn't fit the NBTR register fields.
    UnencodableBitTiming,
    /// More than eight data bytes.
    DataLength,
    /// The message object isn't valid (MSGVAL is clear).
    NotValid,
    /// A transmit request is already pending.
    Busy,
    /// The message object hasn't received new data.
    NoNewData,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Timeout => "timed out waiting for hardware",
            Error::CanFrequencyOutOfRange => "CAN frequency out of range",
            Error::BaudrateOutOfRange => "baud rate out of range",
            Error::SamplePointOutOfRange => "sample point out of range",
            Error::SyncJumpWidthOutOfRange => "synchronization jump width out of range",
            Error::NoBitTiming => "no bit timing matches the baud rate",
            Error::UnencodableBitTiming => "bit timing doesn't fit the NBTR register",
            Error::DataLength => "more than eight data bytes",
            Error::NotValid => "message object not valid",
            Error::Busy => "transmit request pending",
            Error::NoNewData => "no new data",
        };
        f.write_str(msg)
    }
}
