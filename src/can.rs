//! MultiCAN driver
//!
//! [`Can`] owns the MultiCAN module. It brings the module out of reset,
//! programs the fractional divider that produces the CAN kernel clock, and
//! manages the message object lists through the list panel. From there,
//! [`Can::node_mut`] and [`Can::message_object_mut`] hand out short-lived
//! accessors for the nodes and message objects.
//!
//! ```no_run
//! use xmc4_hal::can::{Can, NodeId};
//! use xmc4_hal::can::bit_timing::BitTimeRequest;
//! use xmc4_hal::can::message_object::{Id, MessageObjectType};
//! use xmc4_hal::can::node::NodeConfig;
//!
//! # struct Ps;
//! # unsafe impl xmc4_hal::Peripherals for Ps {
//! #     fn can(&self) -> *const () { xmc4_hal::can::ADDRESS }
//! #     fn scu_clock(&self) -> *const () { xmc4_hal::scu::CLOCK_ADDRESS }
//! #     fn scu_reset(&self) -> *const () { xmc4_hal::scu::RESET_ADDRESS }
//! # }
//! # let my_peripherals = Ps;
//! let mut can = Can::new(my_peripherals);
//! let can_frequency = can.initialize(120_000_000, 40_000_000)?;
//! can.initialize_lists()?;
//!
//! let config = NodeConfig::new(BitTimeRequest::new(can_frequency, 500_000).sample_point(7500));
//! can.node_mut(NodeId::Node0, |node| node.configure(&config))?;
//!
//! can.allocate_message_object(NodeId::Node0, 0)?;
//! can.message_object_mut(0, |mo| {
//!     mo.set_identifier(Id::Standard(0x123));
//!     mo.configure(MessageObjectType::Transmit);
//!     mo.set_data(&[0xDE, 0xAD])
//! })?;
//!
//! can.node_mut(NodeId::Node0, |node| node.leave_initialization());
//! can.message_object_mut(0, |mo| mo.transmit())?;
//! # Ok::<(), xmc4_hal::Error>(())
//! ```

pub mod bit_timing;
pub mod divider;
pub mod message_object;
pub mod node;
pub mod regs;

use crate::{
    ral,
    scu::{Peripheral, Scu},
    wait::{self, PollLimit},
    Error, Peripherals,
};

/// Address of the MultiCAN module.
pub const ADDRESS: *const () = 0x4801_4000 as *const ();

/// Number of CAN nodes.
#[cfg(not(feature = "xmc4800"))]
pub const NODE_COUNT: usize = 3;
/// Number of CAN nodes.
#[cfg(feature = "xmc4800")]
pub const NODE_COUNT: usize = 6;

/// Number of message objects.
#[cfg(not(feature = "xmc4800"))]
pub const MESSAGE_OBJECT_COUNT: usize = 64;
/// Number of message objects.
#[cfg(feature = "xmc4800")]
pub const MESSAGE_OBJECT_COUNT: usize = 256;

/// Number of list registers. List 0 holds unallocated message objects.
pub const LIST_COUNT: usize = 16;

/// A CAN node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NodeId {
    Node0 = 0,
    Node1 = 1,
    Node2 = 2,
    #[cfg(feature = "xmc4800")]
    Node3 = 3,
    #[cfg(feature = "xmc4800")]
    Node4 = 4,
    #[cfg(feature = "xmc4800")]
    Node5 = 5,
}

impl NodeId {
    /// The list that holds this node's message objects.
    pub const fn list(self) -> u8 {
        self as u8 + 1
    }
}

/// MCR.CLKSEL.
#[cfg(feature = "xmc4800")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum ClockSource {
    /// fPERIPH.
    Peripheral = 1,
    /// fOHP, the high precision oscillator.
    Oscillator = 2,
}

/// PANCTR.PANCMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum PanelCommand {
    NoOperation = 0x00,
    /// Move every message object to list 0.
    InitializeLists = 0x01,
    /// Move message object ARG1 to the end of list ARG2.
    StaticAllocate = 0x02,
    /// Move the first object of list 0 to the end of list ARG2.
    DynamicAllocate = 0x03,
    StaticInsertBefore = 0x04,
    DynamicInsertBefore = 0x05,
    StaticInsertBehind = 0x06,
    DynamicInsertBehind = 0x07,
}

/// A decoded LIST register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListInfo {
    /// First message object.
    pub begin: u8,
    /// Last message object.
    pub end: u8,
    /// Number of message objects.
    pub len: usize,
}

/// The MultiCAN module.
pub struct Can<P> {
    peripherals: P,
    poll_limit: PollLimit,
}

impl<P: Peripherals> Can<P> {
    /// Take ownership of the MultiCAN.
    ///
    /// This doesn't touch any registers; see [`initialize`](Self::initialize).
    pub fn new(peripherals: P) -> Self {
        Can {
            peripherals,
            poll_limit: PollLimit::DEFAULT,
        }
    }

    /// Bound every hardware wait performed by this driver.
    pub fn set_poll_limit(&mut self, poll_limit: PollLimit) {
        self.poll_limit = poll_limit;
    }

    /// Give back the peripherals.
    pub fn free(self) -> P {
        self.peripherals
    }

    fn registers(&self) -> &regs::RegisterBlock {
        // Safety: Peripherals implementations promise a valid MultiCAN
        // address for as long as they live, and we own the implementation.
        unsafe { &*(self.peripherals.can() as *const regs::RegisterBlock) }
    }

    fn scu(&self) -> Scu<'_> {
        Scu::new(&self.peripherals).with_poll_limit(self.poll_limit)
    }

    /// Supply the module clock, release the module from reset, and wait
    /// for the module to run.
    pub fn enable(&mut self) -> Result<(), Error> {
        let scu = self.scu();
        #[cfg(feature = "xmc4800")]
        scu.ungate(Peripheral::Can);
        scu.deassert_reset(Peripheral::Can);

        let global = &self.registers().global;
        ral::modify_reg!(regs::global, global, CLC, DISR: 0);
        wait::poll_until(self.poll_limit, || {
            ral::read_reg!(regs::global, global, CLC, DISS == 0)
        })?;
        debug!("MultiCAN enabled");
        Ok(())
    }

    /// Request the module to stop, wait until it has, then hold it in
    /// reset.
    ///
    /// If the module doesn't acknowledge the request, returns
    /// [`Error::Timeout`] and leaves the reset alone.
    pub fn disable(&mut self) -> Result<(), Error> {
        let global = &self.registers().global;
        ral::write_reg!(regs::global, global, CLC, DISR: 1);
        wait::poll_until(self.poll_limit, || {
            ral::read_reg!(regs::global, global, CLC, DISS == 1)
        })?;

        let scu = self.scu();
        scu.assert_reset(Peripheral::Can);
        #[cfg(feature = "xmc4800")]
        scu.gate(Peripheral::Can);
        debug!("MultiCAN disabled");
        Ok(())
    }

    /// Enable the module, and divide `source_frequency` down to the CAN
    /// kernel clock closest to `can_frequency`.
    ///
    /// Returns the kernel clock that the divider achieved. Use that value
    /// for the bit time requests of all nodes.
    pub fn initialize(&mut self, source_frequency: u32, can_frequency: u32) -> Result<u32, Error> {
        let divider = divider::fractional_divider(source_frequency, can_frequency)?;
        self.enable()?;
        let global = &self.registers().global;
        ral::modify_reg!(regs::global, global, FDR, |fdr| {
            (fdr & !(regs::global::FDR::STEP::mask | regs::global::FDR::DM::mask)) | divider.fdr()
        });
        debug!("CAN kernel clock {=u32} Hz", divider.frequency);
        Ok(divider.frequency)
    }

    /// Select the kernel clock source.
    ///
    /// Only allowed while every node is in initialization.
    #[cfg(feature = "xmc4800")]
    pub fn set_clock_source(&mut self, source: ClockSource) {
        ral::modify_reg!(regs::global, &self.registers().global, MCR, CLKSEL: source as u32);
    }

    /// Issue a list panel command, after the panel finishes the previous
    /// one.
    pub fn panel_command(
        &mut self,
        command: PanelCommand,
        argument1: u8,
        argument2: u8,
    ) -> Result<(), Error> {
        let global = &self.registers().global;
        let poll_limit = self.poll_limit;
        ral::interrupt_free(|| -> Result<(), Error> {
            wait::poll_until(poll_limit, || {
                ral::read_reg!(regs::global, global, PANCTR, BUSY == 0)
            })?;
            ral::write_reg!(regs::global, global, PANCTR,
                PANCMD: command as u32,
                PANAR1: u32::from(argument1),
                PANAR2: u32::from(argument2)
            );
            Ok(())
        })?;
        trace!("PANCMD {} {=u8} {=u8}", command, argument1, argument2);
        Ok(())
    }

    /// Move every message object to list 0, and wait for the panel to
    /// finish.
    pub fn initialize_lists(&mut self) -> Result<(), Error> {
        self.panel_command(PanelCommand::InitializeLists, 0, 0)?;
        let global = &self.registers().global;
        wait::poll_until(self.poll_limit, || {
            ral::read_reg!(regs::global, global, PANCTR, BUSY == 0)
                && ral::read_reg!(regs::global, global, PANCTR, RBUSY == 0)
        })
    }

    /// Append message object `index` to `node`'s list.
    ///
    /// # Panics
    ///
    /// Panics if `index` isn't a message object.
    pub fn allocate_message_object(&mut self, node: NodeId, index: usize) -> Result<(), Error> {
        assert!(index < MESSAGE_OBJECT_COUNT, "no message object {}", index);
        self.panel_command(PanelCommand::StaticAllocate, index as u8, node.list())
    }

    /// Return message object `index` to the unallocated list.
    ///
    /// # Panics
    ///
    /// Panics if `index` isn't a message object.
    pub fn release_message_object(&mut self, index: usize) -> Result<(), Error> {
        assert!(index < MESSAGE_OBJECT_COUNT, "no message object {}", index);
        self.panel_command(PanelCommand::StaticAllocate, index as u8, 0)
    }

    /// Read list `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is at least [`LIST_COUNT`].
    pub fn list(&self, index: usize) -> ListInfo {
        use regs::global::LIST;
        let list = self.registers().global.LIST[index].read();
        let empty = list & LIST::EMPTY::mask != 0;
        ListInfo {
            begin: ((list & LIST::BEGIN::mask) >> LIST::BEGIN::offset) as u8,
            end: ((list & LIST::END::mask) >> LIST::END::offset) as u8,
            len: if empty {
                0
            } else {
                ((list & LIST::SIZE::mask) >> LIST::SIZE::offset) as usize + 1
            },
        }
    }

    /// Access a node.
    pub fn node_mut<R>(&mut self, id: NodeId, f: impl FnOnce(&mut node::Node) -> R) -> R {
        let mut node = node::Node::new(&self.registers().nodes[id as usize], id);
        f(&mut node)
    }

    /// Access message object `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` isn't a message object.
    pub fn message_object_mut<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut message_object::MessageObject) -> R,
    ) -> R {
        assert!(index < MESSAGE_OBJECT_COUNT, "no message object {}", index);
        let regs = &self.registers().message_objects[index];
        let mut mo = message_object::MessageObject::new(regs, index, self.poll_limit);
        f(&mut mo)
    }
}

#[cfg(test)]
mod tests {
    use super::{regs, Can, ListInfo, NodeId, PanelCommand, MESSAGE_OBJECT_COUNT};
    use crate::can::bit_timing::BitTimeRequest;
    use crate::can::message_object::Id;
    use crate::can::node::NodeConfig;
    use crate::scu::{ClockRegisters, Peripheral, ResetRegisters, Scu};
    use crate::{wait::PollLimit, Error};

    struct Fake {
        can: regs::RegisterBlock,
        clock: ClockRegisters,
        reset: ResetRegisters,
    }

    impl Fake {
        fn new() -> Self {
            Fake {
                can: regs::RegisterBlock::new(),
                clock: ClockRegisters::new(),
                reset: ResetRegisters::new(),
            }
        }
    }

    unsafe impl crate::Peripherals for &Fake {
        fn can(&self) -> *const () {
            &self.can as *const _ as _
        }
        fn scu_clock(&self) -> *const () {
            &self.clock as *const _ as _
        }
        fn scu_reset(&self) -> *const () {
            &self.reset as *const _ as _
        }
    }

    fn can(fake: &Fake) -> Can<&Fake> {
        let mut can = Can::new(fake);
        can.set_poll_limit(PollLimit(16));
        can
    }

    const PR1_CAN: u32 = 1 << 4;

    #[test]
    fn initialize_programs_divider() {
        let fake = Fake::new();
        fake.can.global.CLC.write(0b11);
        fake.can.global.FDR.write(0x0200_0000);
        let mut can = can(&fake);

        // CLC.DISS is read-only in hardware; in memory, it holds whatever
        // was there.
        assert_eq!(can.initialize(120_000_000, 40_000_000), Err(Error::Timeout));
        assert_eq!(fake.reset.PR[1].CLR.read(), PR1_CAN);
        assert_eq!(fake.can.global.CLC.read(), 0b10);

        fake.can.global.CLC.write(0);
        assert_eq!(can.initialize(120_000_000, 40_000_000), Ok(40_000_000));
        assert_eq!(fake.can.global.FDR.read(), 0x0200_0000 | 0x4000 | 1021);

        assert_eq!(can.initialize(80_000_000, 30_000_000), Ok(30_000_000));
        assert_eq!(fake.can.global.FDR.read(), 0x0200_0000 | 0x8000 | 384);
    }

    #[test]
    fn initialize_rejects_frequency_before_enabling() {
        let fake = Fake::new();
        let mut can = can(&fake);
        assert_eq!(
            can.initialize(80_000_000, 120_000_000),
            Err(Error::CanFrequencyOutOfRange)
        );
        assert_eq!(fake.reset.PR[1].CLR.read(), 0);
    }

    #[test]
    fn disable_waits_for_acknowledgment() {
        let fake = Fake::new();
        let mut can = can(&fake);
        assert_eq!(can.disable(), Err(Error::Timeout));
        assert_eq!(fake.can.global.CLC.read(), 1);
        assert_eq!(fake.reset.PR[1].SET.read(), 0);
        assert!(!Scu::new(&&fake).is_reset_asserted(Peripheral::Can));
    }

    #[test]
    fn allocate_and_release() {
        let fake = Fake::new();
        let mut can = can(&fake);
        can.initialize_lists().unwrap();
        assert_eq!(fake.can.global.PANCTR.read(), 0x01);

        can.allocate_message_object(NodeId::Node1, 5).unwrap();
        assert_eq!(fake.can.global.PANCTR.read(), 0x0205_0002);

        let last = MESSAGE_OBJECT_COUNT - 1;
        can.release_message_object(last).unwrap();
        assert_eq!(
            fake.can.global.PANCTR.read(),
            ((MESSAGE_OBJECT_COUNT as u32 - 1) << 16) | 0x02
        );
    }

    #[test]
    fn panel_busy() {
        let fake = Fake::new();
        fake.can.global.PANCTR.write(1 << 8);
        let mut can = can(&fake);
        assert_eq!(
            can.panel_command(PanelCommand::DynamicAllocate, 0, 1),
            Err(Error::Timeout)
        );
        assert_eq!(fake.can.global.PANCTR.read(), 1 << 8);
    }

    #[test]
    #[should_panic]
    fn allocate_out_of_range() {
        let fake = Fake::new();
        let mut can = can(&fake);
        let _ = can.allocate_message_object(NodeId::Node0, MESSAGE_OBJECT_COUNT);
    }

    #[test]
    fn list_info() {
        let fake = Fake::new();
        fake.can.global.LIST[0].write(0x0100_0000);
        fake.can.global.LIST[2].write(0x0002_0907);
        let can = can(&fake);
        assert_eq!(
            can.list(0),
            ListInfo {
                begin: 0,
                end: 0,
                len: 0
            }
        );
        assert_eq!(
            can.list(2),
            ListInfo {
                begin: 7,
                end: 9,
                len: 3
            }
        );
    }

    #[test]
    fn node_access() {
        let fake = Fake::new();
        let mut can = can(&fake);
        let request = BitTimeRequest::new(80_000_000, 500_000).sample_point(7500);
        let timing = can
            .node_mut(NodeId::Node2, |node| {
                assert_eq!(node.id(), NodeId::Node2);
                node.configure(&NodeConfig::new(request))
            })
            .unwrap();
        assert_eq!(timing.prescaler, 8);
        assert_eq!(fake.can.nodes[2].NBTR.read(), 0x4D07);
        assert_eq!(fake.can.nodes[0].NBTR.read(), 0);
        assert_eq!(fake.can.nodes[2].NCR.read() & 1, 1);
    }

    #[test]
    fn message_object_access() {
        let fake = Fake::new();
        let mut can = can(&fake);
        can.message_object_mut(3, |mo| {
            assert_eq!(mo.index(), 3);
            mo.set_identifier(Id::Standard(0x42));
        });
        assert_eq!(fake.can.message_objects[3].MOAR.read(), 0x42 << 18);
        assert_eq!(fake.can.message_objects[2].MOAR.read(), 0);
    }

    #[test]
    fn node_lists() {
        assert_eq!(NodeId::Node0.list(), 1);
        assert_eq!(NodeId::Node2.list(), 3);
    }
}
