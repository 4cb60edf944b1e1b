//! Register access helpers
//!
//! Re-exports the `ral-registers` macros used against the register
//! blocks defined in this crate. Each register block module follows the
//! RAL layout: a `#[repr(C)]` struct of [`VCell`](crate::vcell::VCell)s,
//! plus one module per register holding `offset` / `mask` per field.

pub use ral_registers::{modify_reg, read_reg, write_reg};

/// Run `f` with interrupts masked.
///
/// Wraps read-modify-write sequences on registers that other contexts may
/// also touch. Hosted builds (unit tests) have no interrupts to mask, and
/// call `f` directly.
#[inline]
pub fn interrupt_free<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    {
        cortex_m::interrupt::free(|_| f())
    }
    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    {
        f()
    }
}
