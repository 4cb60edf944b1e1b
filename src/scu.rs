//! System Control Unit (SCU) clock gating and peripheral reset
//!
//! Only the parts of the SCU that peripheral drivers need before they
//! touch their own registers: peripheral clock gates, peripheral resets,
//! the switchable module clocks, and the peripheral bus divider. Clock
//! tree setup (oscillators, PLLs) is left to the startup code.
//!
//! Bit positions follow the XMC4700 / XMC4800 reference manual. The
//! XMC4500 has no clock gates; on that device, the gate registers are
//! reserved and [`Can`](crate::can::Can) skips them.
//!
//! ```
//! use xmc4_hal::scu::{Clocks, Peripheral, Scu};
//! # use xmc4_hal::scu::{ClockRegisters, ResetRegisters};
//! # struct Ps(ClockRegisters, ResetRegisters);
//! # unsafe impl xmc4_hal::Peripherals for Ps {
//! #     fn can(&self) -> *const () { core::ptr::null() }
//! #     fn scu_clock(&self) -> *const () { &self.0 as *const _ as _ }
//! #     fn scu_reset(&self) -> *const () { &self.1 as *const _ as _ }
//! # }
//! # let my_peripherals = Ps(ClockRegisters::new(), ResetRegisters::new());
//! let scu = Scu::new(&my_peripherals);
//! scu.ungate(Peripheral::Usb);
//! scu.deassert_reset(Peripheral::Usb);
//! scu.enable_clocks(Clocks::USB);
//! ```

#![allow(non_snake_case, non_upper_case_globals)]

use crate::{
    ral,
    vcell::VCell,
    wait::{self, PollLimit},
    Error, Peripherals,
};

/// Address of the SCU clock control registers.
pub const CLOCK_ADDRESS: *const () = 0x5000_4600 as *const ();
/// Address of the SCU reset control registers.
pub const RESET_ADDRESS: *const () = 0x5000_4400 as *const ();

/// A status / set / clear register triple.
///
/// Clock gates and peripheral resets both come in four of these groups,
/// with one bit per peripheral.
#[repr(C)]
pub struct Group {
    pub STAT: VCell<u32>,
    pub SET: VCell<u32>,
    pub CLR: VCell<u32>,
}

impl Group {
    pub const fn new() -> Self {
        Group {
            STAT: VCell::new(0),
            SET: VCell::new(0),
            CLR: VCell::new(0),
        }
    }
}

/// SCU clock control registers.
#[repr(C)]
pub struct ClockRegisters {
    pub CLKSTAT: VCell<u32>,
    pub CLKSET: VCell<u32>,
    pub CLKCLR: VCell<u32>,
    pub SYSCLKCR: VCell<u32>,
    pub CPUCLKCR: VCell<u32>,
    pub PBCLKCR: VCell<u32>,
    pub USBCLKCR: VCell<u32>,
    pub EBUCLKCR: VCell<u32>,
    pub CCUCLKCR: VCell<u32>,
    pub WDTCLKCR: VCell<u32>,
    pub EXTCLKCR: VCell<u32>,
    pub MLINKCLKCR: VCell<u32>,
    pub SLEEPCR: VCell<u32>,
    pub DSLEEPCR: VCell<u32>,
    _reserved: [u32; 2],
    /// CGATSTATx / CGATSETx / CGATCLRx
    pub CGAT: [Group; 4],
}

impl ClockRegisters {
    /// All-zero registers, for use in ordinary memory.
    pub const fn new() -> Self {
        const GROUP: Group = Group::new();
        ClockRegisters {
            CLKSTAT: VCell::new(0),
            CLKSET: VCell::new(0),
            CLKCLR: VCell::new(0),
            SYSCLKCR: VCell::new(0),
            CPUCLKCR: VCell::new(0),
            PBCLKCR: VCell::new(0),
            USBCLKCR: VCell::new(0),
            EBUCLKCR: VCell::new(0),
            CCUCLKCR: VCell::new(0),
            WDTCLKCR: VCell::new(0),
            EXTCLKCR: VCell::new(0),
            MLINKCLKCR: VCell::new(0),
            SLEEPCR: VCell::new(0),
            DSLEEPCR: VCell::new(0),
            _reserved: [0; 2],
            CGAT: [GROUP; 4],
        }
    }
}

/// SCU reset control registers.
#[repr(C)]
pub struct ResetRegisters {
    pub RSTSTAT: VCell<u32>,
    pub RSTSET: VCell<u32>,
    pub RSTCLR: VCell<u32>,
    /// PRSTATx / PRSETx / PRCLRx
    pub PR: [Group; 4],
}

impl ResetRegisters {
    /// All-zero registers, for use in ordinary memory.
    pub const fn new() -> Self {
        const GROUP: Group = Group::new();
        ResetRegisters {
            RSTSTAT: VCell::new(0),
            RSTSET: VCell::new(0),
            RSTCLR: VCell::new(0),
            PR: [GROUP; 4],
        }
    }
}

const _: [(); 1] = [(); (core::mem::size_of::<ClockRegisters>() == 0x70) as usize];
const _: [(); 1] = [(); (core::mem::size_of::<ResetRegisters>() == 0x3C) as usize];

pub mod CPUCLKCR {
    pub mod CPUDIV {
        pub const offset: u32 = 0;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

pub mod PBCLKCR {
    pub mod PBDIV {
        pub const offset: u32 = 0;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

bitflags::bitflags! {
    /// Module clocks switched through CLKSET / CLKCLR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Clocks: u32 {
        const USB = 1 << 0;
        const MMC = 1 << 1;
        const ETH = 1 << 2;
        const EBU = 1 << 3;
        const CCU = 1 << 4;
        const WDT = 1 << 5;
    }
}

/// A peripheral with a clock gate and a reset line.
///
/// Gates and resets share the same group and bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    Vadc,
    Dsd,
    Ccu40,
    Ccu41,
    Ccu42,
    Ccu80,
    Ccu81,
    Posif0,
    Posif1,
    Usic0,
    Eru1,
    Ccu43,
    Ledts0,
    Can,
    Dac,
    Mmci,
    Usic1,
    Usic2,
    Ports,
    Wdt,
    Eth0,
    Dma0,
    Dma1,
    Fce,
    Usb,
    Ebu,
}

impl Peripheral {
    /// Returns the register group and bit mask for this peripheral.
    const fn location(self) -> (usize, u32) {
        let (group, bit) = match self {
            Peripheral::Vadc => (0, 0),
            Peripheral::Dsd => (0, 1),
            Peripheral::Ccu40 => (0, 2),
            Peripheral::Ccu41 => (0, 3),
            Peripheral::Ccu42 => (0, 4),
            Peripheral::Ccu80 => (0, 7),
            Peripheral::Ccu81 => (0, 8),
            Peripheral::Posif0 => (0, 9),
            Peripheral::Posif1 => (0, 10),
            Peripheral::Usic0 => (0, 11),
            Peripheral::Eru1 => (0, 16),
            Peripheral::Ccu43 => (1, 0),
            Peripheral::Ledts0 => (1, 3),
            Peripheral::Can => (1, 4),
            Peripheral::Dac => (1, 5),
            Peripheral::Mmci => (1, 6),
            Peripheral::Usic1 => (1, 7),
            Peripheral::Usic2 => (1, 8),
            Peripheral::Ports => (1, 9),
            Peripheral::Wdt => (2, 1),
            Peripheral::Eth0 => (2, 2),
            Peripheral::Dma0 => (2, 4),
            Peripheral::Dma1 => (2, 5),
            Peripheral::Fce => (2, 6),
            Peripheral::Usb => (2, 7),
            Peripheral::Ebu => (3, 2),
        };
        (group, 1 << bit)
    }
}

/// SCU clock and reset control.
///
/// Writes go through the hardware's set / clear registers, so an `Scu`
/// never performs a read-modify-write, and several may coexist.
pub struct Scu<'a> {
    clock: &'a ClockRegisters,
    reset: &'a ResetRegisters,
    poll_limit: PollLimit,
}

impl<'a> Scu<'a> {
    /// Borrow the SCU registers owned by `peripherals`.
    pub fn new<P: Peripherals>(peripherals: &'a P) -> Self {
        // Safety: Peripherals implementations promise valid addresses
        // for register blocks they own.
        let (clock, reset) = unsafe {
            (
                &*(peripherals.scu_clock() as *const ClockRegisters),
                &*(peripherals.scu_reset() as *const ResetRegisters),
            )
        };
        Scu {
            clock,
            reset,
            poll_limit: PollLimit::DEFAULT,
        }
    }

    /// Bound the waits performed by [`disable_clocks()`](Scu::disable_clocks).
    pub fn with_poll_limit(mut self, poll_limit: PollLimit) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// Supply the peripheral's clock.
    pub fn ungate(&self, peripheral: Peripheral) {
        let (index, bit) = peripheral.location();
        ral::write_reg!(crate::scu, &self.clock.CGAT[index], CLR, bit);
        trace!("UNGATE {}", peripheral);
    }

    /// Stop the peripheral's clock.
    pub fn gate(&self, peripheral: Peripheral) {
        let (index, bit) = peripheral.location();
        ral::write_reg!(crate::scu, &self.clock.CGAT[index], SET, bit);
        trace!("GATE {}", peripheral);
    }

    /// Indicates if the peripheral's clock is stopped.
    pub fn is_gated(&self, peripheral: Peripheral) -> bool {
        let (index, bit) = peripheral.location();
        ral::read_reg!(crate::scu, &self.clock.CGAT[index], STAT) & bit != 0
    }

    /// Hold the peripheral in reset.
    pub fn assert_reset(&self, peripheral: Peripheral) {
        let (index, bit) = peripheral.location();
        ral::write_reg!(crate::scu, &self.reset.PR[index], SET, bit);
    }

    /// Release the peripheral from reset.
    pub fn deassert_reset(&self, peripheral: Peripheral) {
        let (index, bit) = peripheral.location();
        ral::write_reg!(crate::scu, &self.reset.PR[index], CLR, bit);
    }

    /// Indicates if the peripheral is held in reset.
    pub fn is_reset_asserted(&self, peripheral: Peripheral) -> bool {
        let (index, bit) = peripheral.location();
        ral::read_reg!(crate::scu, &self.reset.PR[index], STAT) & bit != 0
    }

    /// Switch on module clocks.
    pub fn enable_clocks(&self, clocks: Clocks) {
        ral::write_reg!(crate::scu, self.clock, CLKSET, clocks.bits());
    }

    /// Switch off module clocks, and wait until CLKSTAT reports them off.
    pub fn disable_clocks(&self, clocks: Clocks) -> Result<(), Error> {
        ral::write_reg!(crate::scu, self.clock, CLKCLR, clocks.bits());
        wait::poll_until(self.poll_limit, || {
            !self.enabled_clocks().intersects(clocks)
        })
    }

    /// Returns the module clocks that are currently running.
    pub fn enabled_clocks(&self) -> Clocks {
        Clocks::from_bits_truncate(ral::read_reg!(crate::scu, self.clock, CLKSTAT))
    }

    /// Computes the peripheral bus clock (fPERIPH) from the system clock.
    ///
    /// fCPU is fSYS divided by CPUDIV + 1, and fPERIPH is fCPU divided by
    /// PBDIV + 1. fPERIPH is the MultiCAN's kernel clock source on the
    /// XMC4500.
    pub fn peripheral_clock(&self, system_frequency: u32) -> u32 {
        let cpu_div = ral::read_reg!(crate::scu, self.clock, CPUCLKCR, CPUDIV) + 1;
        let pb_div = ral::read_reg!(crate::scu, self.clock, PBCLKCR, PBDIV) + 1;
        system_frequency / cpu_div / pb_div
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockRegisters, Clocks, Peripheral, ResetRegisters, Scu};
    use crate::{wait::PollLimit, Error};

    struct Fake {
        clock: ClockRegisters,
        reset: ResetRegisters,
    }

    impl Fake {
        fn new() -> Self {
            Fake {
                clock: ClockRegisters::new(),
                reset: ResetRegisters::new(),
            }
        }
    }

    unsafe impl crate::Peripherals for Fake {
        fn can(&self) -> *const () {
            core::ptr::null()
        }
        fn scu_clock(&self) -> *const () {
            &self.clock as *const _ as _
        }
        fn scu_reset(&self) -> *const () {
            &self.reset as *const _ as _
        }
    }

    #[test]
    fn gate_locations() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);

        scu.ungate(Peripheral::Can);
        assert_eq!(fake.clock.CGAT[1].CLR.read(), 1 << 4);

        scu.gate(Peripheral::Usb);
        assert_eq!(fake.clock.CGAT[2].SET.read(), 1 << 7);

        scu.gate(Peripheral::Vadc);
        assert_eq!(fake.clock.CGAT[0].SET.read(), 1);

        scu.ungate(Peripheral::Ebu);
        assert_eq!(fake.clock.CGAT[3].CLR.read(), 1 << 2);
    }

    #[test]
    fn gate_status() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);
        assert!(!scu.is_gated(Peripheral::Can));
        fake.clock.CGAT[1].STAT.write(1 << 4);
        assert!(scu.is_gated(Peripheral::Can));
        assert!(!scu.is_gated(Peripheral::Ledts0));
    }

    #[test]
    fn reset_locations() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);

        scu.assert_reset(Peripheral::Ledts0);
        assert_eq!(fake.reset.PR[1].SET.read(), 1 << 3);

        scu.deassert_reset(Peripheral::Can);
        assert_eq!(fake.reset.PR[1].CLR.read(), 1 << 4);

        assert!(!scu.is_reset_asserted(Peripheral::Dma0));
        fake.reset.PR[2].STAT.write(1 << 4);
        assert!(scu.is_reset_asserted(Peripheral::Dma0));
    }

    #[test]
    fn enable_clocks() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);
        scu.enable_clocks(Clocks::USB | Clocks::CCU);
        assert_eq!(fake.clock.CLKSET.read(), 0b1_0001);
    }

    #[test]
    fn disable_clocks_settles() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);
        assert_eq!(scu.disable_clocks(Clocks::WDT), Ok(()));
        assert_eq!(fake.clock.CLKCLR.read(), 1 << 5);
    }

    #[test]
    fn disable_clocks_stuck() {
        let fake = Fake::new();
        fake.clock.CLKSTAT.write((Clocks::USB | Clocks::MMC).bits());
        let scu = Scu::new(&fake).with_poll_limit(PollLimit(8));

        // Only the requested clocks are awaited
        assert_eq!(scu.disable_clocks(Clocks::ETH), Ok(()));
        assert_eq!(scu.disable_clocks(Clocks::USB), Err(Error::Timeout));
        assert_eq!(scu.enabled_clocks(), Clocks::USB | Clocks::MMC);
    }

    #[test]
    fn peripheral_clock() {
        let fake = Fake::new();
        let scu = Scu::new(&fake);
        assert_eq!(scu.peripheral_clock(144_000_000), 144_000_000);
        fake.clock.PBCLKCR.write(1);
        assert_eq!(scu.peripheral_clock(144_000_000), 72_000_000);
        fake.clock.CPUCLKCR.write(1);
        assert_eq!(scu.peripheral_clock(144_000_000), 36_000_000);
    }
}
