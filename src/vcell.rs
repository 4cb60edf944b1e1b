//! Volatile register cell
//!
//! Every register block in this crate is built from `VCell`s. The cell
//! exposes the `read()` / `write()` pair that the `ral-registers` macros
//! expect, so the same block type works over peripheral memory and over
//! an ordinary allocation in host tests.

use core::cell::UnsafeCell;

#[repr(transparent)]
pub struct VCell<T>(UnsafeCell<T>);

impl<T> VCell<T> {
    pub const fn new(val: T) -> Self {
        VCell(UnsafeCell::new(val))
    }
}

impl<T: Copy> VCell<T> {
    #[inline(always)]
    pub fn read(&self) -> T {
        // Safety: the cell owns a valid, aligned T. Registers are only
        // touched from one context at a time (see crate::Peripherals).
        unsafe { self.0.get().read_volatile() }
    }

    #[inline(always)]
    pub fn write(&self, val: T) {
        // Safety: see read()
        unsafe { self.0.get().write_volatile(val) }
    }
}

#[cfg(test)]
mod tests {
    use super::VCell;

    #[test]
    fn read_back_write() {
        let cell = VCell::new(0u32);
        assert_eq!(cell.read(), 0);
        cell.write(0xDEAD_BEEF);
        assert_eq!(cell.read(), 0xDEAD_BEEF);
    }
}
