//! Peripheral drivers for Infineon XMC4000 processors
//!
//! `xmc4-hal` drives the MultiCAN module: it clocks the module through the
//! SCU, derives the CAN kernel clock with the fractional divider, computes
//! nominal bit timings, and manages nodes and message objects. See each
//! module for usage and examples.
//!
//! To interface the library, you must define a safe implementation of
//! [`Peripherals`]. See the peripherals documentation for more information.
//!
//! # Features
//!
//! - `xmc4800`: XMC4700 / XMC4800 MultiCAN, with six nodes, 256 message
//!   objects, clock gating, and a selectable kernel clock. Without this
//!   feature, the crate targets the XMC4500.
//! - `defmt`: log through [`defmt`](https://crates.io/crates/defmt).

#![no_std]

#[macro_use]
mod log;

mod error;
mod ral;
mod vcell;

pub mod can;
pub mod scu;
pub mod wait;

pub use error::Error;

/// A type that owns the MultiCAN and SCU register blocks
///
/// An implementation of `Peripherals` is expected to own
///
/// - the MultiCAN module registers
/// - the SCU clock control registers
/// - the SCU reset control registers
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that owns the
/// register blocks. The pointers returned by the methods are assumed to be
/// valid for as long as the implementation lives, and will be cast to
/// register definitions.
///
/// # Example
///
/// A safe implementation of `Peripherals` as a singleton.
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use xmc4_hal::Peripherals;
///
/// pub struct Instances(());
///
/// impl Instances {
///     /// Returns `None` if the instances are already taken
///     pub fn take() -> Option<Instances> {
///         static TAKEN: AtomicBool = AtomicBool::new(false);
///         let taken = TAKEN.swap(true, Ordering::SeqCst);
///         (!taken).then(|| Instances(()))
///     }
/// }
///
/// unsafe impl Peripherals for Instances {
///     fn can(&self) -> *const () {
///         xmc4_hal::can::ADDRESS
///     }
///     fn scu_clock(&self) -> *const () {
///         xmc4_hal::scu::CLOCK_ADDRESS
///     }
///     fn scu_reset(&self) -> *const () {
///         xmc4_hal::scu::RESET_ADDRESS
///     }
/// }
///
/// let instances = Instances::take().unwrap();
/// assert_eq!(instances.can(), 0x4801_4000 as *const ());
/// assert!(Instances::take().is_none());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the MultiCAN module registers
    fn can(&self) -> *const ();
    /// Returns the address of the SCU clock control registers
    fn scu_clock(&self) -> *const ();
    /// Returns the address of the SCU reset control registers
    fn scu_reset(&self) -> *const ();
}
