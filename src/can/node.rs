//! CAN nodes
//!
//! A [`Node`] is one CAN protocol controller. Get one through
//! [`Can::node_mut`](crate::can::Can::node_mut).
//!
//! The bit timing, port control, and error warning level only accept
//! writes while the node is in initialization with configuration change
//! enabled. [`Node::configure`] and [`Node::set_bit_timing`] take care of
//! that. Other setters in this module document when they need it; wrap
//! those calls in [`Node::with_configuration_change`].

use super::bit_timing::{self, BitTimeRequest, BitTiming};
use super::regs;
use super::NodeId;
use crate::{ral, Error};

bitflags::bitflags! {
    /// Node status, as reported by NSR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeStatus: u32 {
        /// A message was transmitted and acknowledged.
        const TX_OK = 1 << 3;
        /// A message was received.
        const RX_OK = 1 << 4;
        const ALERT = 1 << 5;
        /// An error counter reached the warning level.
        const ERROR_WARNING = 1 << 6;
        const BUS_OFF = 1 << 7;
        const LIST_LENGTH_ERROR = 1 << 8;
        const LIST_OBJECT_ERROR = 1 << 9;
        const SUSPEND_ACK = 1 << 10;
    }
}

bitflags::bitflags! {
    /// Node interrupt sources, as enabled in NCR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeEvents: u32 {
        /// TXOK or RXOK set.
        const TRANSFER = 1 << 1;
        /// A new last error code.
        const LAST_ERROR_CODE = 1 << 2;
        /// ALERT, EWRN, BOFF, LLE, or LOE set.
        const ALERT = 1 << 3;
    }
}

/// NSR.LEC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LastError {
    None,
    Stuff,
    Form,
    Acknowledgment,
    Bit1,
    Bit0,
    Crc,
    /// Software wrote the error code.
    Cpu,
}

impl LastError {
    fn from_lec(lec: u32) -> Self {
        match lec & 0b111 {
            0 => LastError::None,
            1 => LastError::Stuff,
            2 => LastError::Form,
            3 => LastError::Acknowledgment,
            4 => LastError::Bit1,
            5 => LastError::Bit0,
            6 => LastError::Crc,
            _ => LastError::Cpu,
        }
    }
}

/// NECNT error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    pub receive: u8,
    pub transmit: u8,
    pub warning_level: u8,
}

/// NPCR.RXSEL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum ReceiveInput {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
}

/// Everything [`Node::configure`] sets up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub bit_time: BitTimeRequest,
    /// Route the node to the internal loop-back bus.
    pub loopback: bool,
    /// Listen without acknowledging or transmitting.
    pub analyzer: bool,
    pub receive_input: ReceiveInput,
    pub events: NodeEvents,
}

impl NodeConfig {
    /// A configuration that only sets the bit timing.
    pub const fn new(bit_time: BitTimeRequest) -> Self {
        NodeConfig {
            bit_time,
            loopback: false,
            analyzer: false,
            receive_input: ReceiveInput::A,
            events: NodeEvents::empty(),
        }
    }
}

/// A CAN node.
pub struct Node<'a> {
    regs: &'a regs::node::Node,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub(super) fn new(regs: &'a regs::node::Node, id: NodeId) -> Self {
        Node { regs, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn enable_configuration_change(&mut self) {
        ral::modify_reg!(regs::node, self.regs, NCR, CCE: 1);
    }

    pub fn disable_configuration_change(&mut self) {
        ral::modify_reg!(regs::node, self.regs, NCR, CCE: 0);
    }

    pub fn is_configuration_change_enabled(&self) -> bool {
        ral::read_reg!(regs::node, self.regs, NCR, CCE == 1)
    }

    /// Run `f` with configuration change enabled.
    ///
    /// Configuration change is disabled once `f` returns, whatever `f`
    /// did.
    pub fn with_configuration_change<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.enable_configuration_change();
        let result = f(self);
        self.disable_configuration_change();
        result
    }

    /// Stop taking part in bus traffic.
    pub fn enter_initialization(&mut self) {
        ral::modify_reg!(regs::node, self.regs, NCR, INIT: 1);
    }

    /// Join the bus.
    pub fn leave_initialization(&mut self) {
        ral::modify_reg!(regs::node, self.regs, NCR, INIT: 0);
    }

    pub fn is_initialization(&self) -> bool {
        ral::read_reg!(regs::node, self.regs, NCR, INIT == 1)
    }

    /// Solve `request` and program the result.
    ///
    /// The solved timing is returned so that callers can check the
    /// achieved baud rate and sample point. On error, NBTR isn't touched.
    pub fn configure_nominal_bit_time(
        &mut self,
        request: &BitTimeRequest,
    ) -> Result<BitTiming, Error> {
        let timing = bit_timing::solve(request)?;
        self.set_bit_timing(&timing)?;
        Ok(timing)
    }

    /// Program `timing` into NBTR, inside a configuration change.
    pub fn set_bit_timing(&mut self, timing: &BitTiming) -> Result<(), Error> {
        if !timing.is_encodable() {
            return Err(Error::UnencodableBitTiming);
        }
        self.with_configuration_change(|node| node.write_bit_timing(timing));
        Ok(())
    }

    fn write_bit_timing(&mut self, timing: &BitTiming) {
        ral::write_reg!(regs::node, self.regs, NBTR,
            BRP: u32::from(timing.prescaler) - 1,
            SJW: u32::from(timing.sjw) - 1,
            TSEG1: u32::from(timing.time_segment_1) - 1,
            TSEG2: u32::from(timing.time_segment_2) - 1,
            DIV8: 0
        );
        debug!("Node {} NBTR = {=u32:#x}", self.id, self.regs.NBTR.read());
    }

    /// Decode NBTR.
    ///
    /// Assumes DIV8 is clear, which is always true after
    /// [`set_bit_timing`](Self::set_bit_timing).
    pub fn bit_timing(&self) -> BitTiming {
        BitTiming {
            prescaler: ral::read_reg!(regs::node, self.regs, NBTR, BRP) as u8 + 1,
            time_segment_1: ral::read_reg!(regs::node, self.regs, NBTR, TSEG1) as u8 + 1,
            time_segment_2: ral::read_reg!(regs::node, self.regs, NBTR, TSEG2) as u8 + 1,
            sjw: ral::read_reg!(regs::node, self.regs, NBTR, SJW) as u8 + 1,
        }
    }

    /// Put the node into initialization and apply `config`.
    ///
    /// The node stays in initialization; call
    /// [`leave_initialization`](Self::leave_initialization) to join the
    /// bus. On error, nothing but NCR.INIT changed.
    pub fn configure(&mut self, config: &NodeConfig) -> Result<BitTiming, Error> {
        self.enter_initialization();
        let timing = bit_timing::solve(&config.bit_time)?;
        if !timing.is_encodable() {
            return Err(Error::UnencodableBitTiming);
        }
        self.with_configuration_change(|node| {
            node.write_bit_timing(&timing);
            node.set_loopback(config.loopback);
            node.set_analyzer_mode(config.analyzer);
            node.set_receive_input(config.receive_input);
        });
        self.disable_events(NodeEvents::all());
        self.enable_events(config.events);
        Ok(timing)
    }

    /// Needs configuration change.
    pub fn set_loopback(&mut self, loopback: bool) {
        ral::modify_reg!(regs::node, self.regs, NPCR, LBM: loopback as u32);
    }

    pub fn is_loopback(&self) -> bool {
        ral::read_reg!(regs::node, self.regs, NPCR, LBM == 1)
    }

    /// Needs configuration change.
    pub fn set_analyzer_mode(&mut self, analyzer: bool) {
        ral::modify_reg!(regs::node, self.regs, NCR, CALM: analyzer as u32);
    }

    /// Needs configuration change.
    pub fn set_receive_input(&mut self, input: ReceiveInput) {
        ral::modify_reg!(regs::node, self.regs, NPCR, RXSEL: input as u32);
    }

    pub fn enable_events(&mut self, events: NodeEvents) {
        ral::modify_reg!(regs::node, self.regs, NCR, |ncr| ncr | events.bits());
    }

    pub fn disable_events(&mut self, events: NodeEvents) {
        ral::modify_reg!(regs::node, self.regs, NCR, |ncr| ncr & !events.bits());
    }

    pub fn enabled_events(&self) -> NodeEvents {
        NodeEvents::from_bits_truncate(ral::read_reg!(regs::node, self.regs, NCR))
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_bits_truncate(ral::read_reg!(regs::node, self.regs, NSR))
    }

    /// Clear `status` flags. BOFF and EWRN are hardware-owned, and don't
    /// clear.
    pub fn clear_status(&mut self, status: NodeStatus) {
        ral::modify_reg!(regs::node, self.regs, NSR, |nsr| nsr & !status.bits());
    }

    pub fn last_error(&self) -> LastError {
        LastError::from_lec(ral::read_reg!(regs::node, self.regs, NSR, LEC))
    }

    pub fn error_counters(&self) -> ErrorCounters {
        ErrorCounters {
            receive: ral::read_reg!(regs::node, self.regs, NECNT, REC) as u8,
            transmit: ral::read_reg!(regs::node, self.regs, NECNT, TEC) as u8,
            warning_level: ral::read_reg!(regs::node, self.regs, NECNT, EWRNLVL) as u8,
        }
    }

    /// Needs configuration change.
    pub fn set_error_warning_level(&mut self, level: u8) {
        ral::modify_reg!(regs::node, self.regs, NECNT, EWRNLVL: u32::from(level));
    }
}
