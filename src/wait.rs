//! Bounded polling on hardware status bits
//!
//! The hardware signals completion of a panel command, a module disable
//! request, or a clock disable by flipping a status bit. Rather than spin
//! forever, every wait in this crate reads the bit at most
//! [`PollLimit`] times and then gives up with [`Error::Timeout`].

use crate::Error;

/// The number of status reads a busy-wait may spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollLimit(pub u32);

impl PollLimit {
    /// The limit used by drivers unless told otherwise.
    pub const DEFAULT: PollLimit = PollLimit(100_000);
    /// Never give up. A stuck status bit hangs the caller.
    pub const UNBOUNDED: PollLimit = PollLimit(u32::MAX);
}

impl Default for PollLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Poll `ready` until it returns `true`.
///
/// `ready` is called at least once, even for a zero limit. Returns
/// [`Error::Timeout`] if the condition never held. With
/// [`PollLimit::UNBOUNDED`], this only returns once `ready` holds.
pub fn poll_until(limit: PollLimit, mut ready: impl FnMut() -> bool) -> Result<(), Error> {
    let mut attempts: u32 = 0;
    loop {
        if ready() {
            return Ok(());
        }
        if limit != PollLimit::UNBOUNDED {
            attempts += 1;
            if attempts >= limit.0 {
                warn!("Timeout after {=u32} polls", attempts);
                return Err(Error::Timeout);
            }
        }
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::{poll_until, PollLimit};
    use crate::Error;

    #[test]
    fn ready_immediately() {
        let mut calls = 0;
        let result = poll_until(PollLimit(10), || {
            calls += 1;
            true
        });
        assert_eq!(result, Ok(()));
        assert_eq!(calls, 1);
    }

    #[test]
    fn ready_after_some_polls() {
        let mut calls = 0;
        let result = poll_until(PollLimit(10), || {
            calls += 1;
            calls == 4
        });
        assert_eq!(result, Ok(()));
        assert_eq!(calls, 4);
    }

    #[test]
    fn never_ready() {
        let mut calls = 0;
        let result = poll_until(PollLimit(10), || {
            calls += 1;
            false
        });
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(calls, 10);
    }

    #[test]
    fn zero_limit_still_checks_once() {
        let mut calls = 0;
        assert_eq!(
            poll_until(PollLimit(0), || {
                calls += 1;
                true
            }),
            Ok(())
        );
        assert_eq!(calls, 1);
        assert_eq!(poll_until(PollLimit(0), || false), Err(Error::Timeout));
    }
}
