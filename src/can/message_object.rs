//! Message objects
//!
//! A message object buffers one CAN frame, either to transmit or as a
//! receive filter. It takes part in bus traffic once it's allocated to a
//! node's list (see [`Can::allocate_message_object`]) and marked valid.
//!
//! MOCTR is a command register: each write sets or resets MOSTAT bits, and
//! leaves all other bits alone. Reads of the same address return MOSTAT.
//!
//! [`Can::allocate_message_object`]: crate::can::Can::allocate_message_object

use super::regs::{self, message_object::MOCTR};
use crate::wait::{self, PollLimit};
use crate::{ral, Error};

/// Frame identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Id {
    /// 11 bit identifier.
    Standard(u16),
    /// 29 bit identifier.
    Extended(u32),
}

const STANDARD_SHIFT: u32 = 18;
const STANDARD_MASK: u16 = 0x7FF;
const EXTENDED_MASK: u32 = 0x1FFF_FFFF;

impl Id {
    /// The value for the 29 bit ID / AM fields. Out of range bits are
    /// dropped.
    const fn field(self) -> u32 {
        match self {
            Id::Standard(id) => ((id & STANDARD_MASK) as u32) << STANDARD_SHIFT,
            Id::Extended(id) => id & EXTENDED_MASK,
        }
    }

    const fn is_extended(self) -> bool {
        matches!(self, Id::Extended(_))
    }
}

/// Which message object transmits first, among those with pending
/// requests on the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Priority {
    /// The first in the node's list.
    ListOrder = 1,
    /// The lowest identifier, like bus arbitration.
    Identifier = 2,
}

/// Message object direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageObjectType {
    Receive,
    Transmit,
}

bitflags::bitflags! {
    /// MOSTAT flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MessageObjectStatus: u32 {
        const RX_PENDING = 1 << 0;
        const TX_PENDING = 1 << 1;
        /// The hardware is copying a received frame.
        const RX_UPDATING = 1 << 2;
        const NEW_DATA = 1 << 3;
        /// A frame arrived before the last one was read.
        const MESSAGE_LOST = 1 << 4;
        const VALID = 1 << 5;
        const RTSEL = 1 << 6;
        const RX_ENABLE = 1 << 7;
        const TX_REQUEST = 1 << 8;
        const TX_ENABLE0 = 1 << 9;
        const TX_ENABLE1 = 1 << 10;
        /// Set for transmit objects.
        const DIRECTION = 1 << 11;
    }
}

/// One message object.
pub struct MessageObject<'a> {
    regs: &'a regs::message_object::MessageObject,
    index: usize,
    poll_limit: PollLimit,
}

impl<'a> MessageObject<'a> {
    pub(super) fn new(
        regs: &'a regs::message_object::MessageObject,
        index: usize,
        poll_limit: PollLimit,
    ) -> Self {
        MessageObject {
            regs,
            index,
            poll_limit,
        }
    }

    /// The message object number.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Make this a standard receive or transmit object.
    ///
    /// The object is invalidated while its direction changes, then marked
    /// valid again.
    pub fn configure(&mut self, kind: MessageObjectType) {
        self.invalidate();
        ral::modify_reg!(regs::message_object, self.regs, MOFCR, MMC: 0);
        let direction = match kind {
            MessageObjectType::Receive => MOCTR::RESDIR | MOCTR::SETRXEN,
            MessageObjectType::Transmit => {
                MOCTR::SETDIR | MOCTR::RESRXEN | MOCTR::SETTXEN0 | MOCTR::SETTXEN1
            }
        };
        ral::write_reg!(regs::message_object, self.regs, MOCTR, direction);
        self.validate();
        trace!("MO {=usize} configured as {}", self.index, kind);
    }

    pub fn invalidate(&mut self) {
        ral::write_reg!(regs::message_object, self.regs, MOCTR, MOCTR::RESMSGVAL);
    }

    pub fn validate(&mut self) {
        ral::write_reg!(regs::message_object, self.regs, MOCTR, MOCTR::SETMSGVAL);
    }

    pub fn set_identifier(&mut self, id: Id) {
        ral::modify_reg!(regs::message_object, self.regs, MOAR,
            ID: id.field(),
            IDE: id.is_extended() as u32
        );
    }

    pub fn identifier(&self) -> Id {
        let id = ral::read_reg!(regs::message_object, self.regs, MOAR, ID);
        if ral::read_reg!(regs::message_object, self.regs, MOAR, IDE == 1) {
            Id::Extended(id)
        } else {
            Id::Standard((id >> STANDARD_SHIFT) as u16 & STANDARD_MASK)
        }
    }

    /// Set the acceptance mask.
    ///
    /// Set bits in `mask` must match the identifier. The variant of `mask`
    /// selects the bit positions. If `match_ide` is set, only frames with
    /// the same identifier length as this object are accepted.
    pub fn set_acceptance_mask(&mut self, mask: Id, match_ide: bool) {
        ral::write_reg!(regs::message_object, self.regs, MOAMR,
            AM: mask.field(),
            MIDE: match_ide as u32
        );
    }

    pub fn set_priority(&mut self, priority: Priority) {
        ral::modify_reg!(regs::message_object, self.regs, MOAR, PRI: priority as u32);
    }

    /// Load up to eight bytes for transmission, and flag them as new.
    ///
    /// Returns [`Error::DataLength`] for longer slices, without touching
    /// the object.
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > 8 {
            return Err(Error::DataLength);
        }
        let mut bytes = [0u8; 8];
        bytes[..data.len()].copy_from_slice(data);
        let low = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let high = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        ral::write_reg!(regs::message_object, self.regs, MODATAL, low);
        ral::write_reg!(regs::message_object, self.regs, MODATAH, high);
        ral::modify_reg!(regs::message_object, self.regs, MOFCR, DLC: data.len() as u32);
        ral::write_reg!(regs::message_object, self.regs, MOCTR, MOCTR::SETNEWDAT);
        Ok(())
    }

    /// The data length code, capped to eight.
    pub fn data_length(&self) -> usize {
        (ral::read_reg!(regs::message_object, self.regs, MOFCR, DLC) as usize).min(8)
    }

    /// Copy the data bytes into `buffer`, returning how many are valid.
    ///
    /// This reads whatever the object holds right now. See
    /// [`receive`](Self::receive) for a consistent copy of a received
    /// frame.
    pub fn data(&self, buffer: &mut [u8; 8]) -> usize {
        let low = ral::read_reg!(regs::message_object, self.regs, MODATAL);
        let high = ral::read_reg!(regs::message_object, self.regs, MODATAH);
        buffer[..4].copy_from_slice(&low.to_le_bytes());
        buffer[4..].copy_from_slice(&high.to_le_bytes());
        self.data_length()
    }

    pub fn status(&self) -> MessageObjectStatus {
        let mostat = ral::read_reg!(regs::message_object, self.regs, MOCTR);
        MessageObjectStatus::from_bits_truncate(mostat)
    }

    /// The list that holds this object. List 0 holds unallocated
    /// objects, list `n + 1` belongs to node `n`.
    pub fn list(&self) -> u8 {
        use regs::message_object::MOSTAT;
        let mostat = ral::read_reg!(regs::message_object, self.regs, MOCTR);
        ((mostat & MOSTAT::LIST::mask) >> MOSTAT::LIST::offset) as u8
    }

    /// Clear status flags.
    pub fn clear_status(&mut self, status: MessageObjectStatus) {
        let reset = status.bits() & 0xFFF;
        ral::write_reg!(regs::message_object, self.regs, MOCTR, reset);
    }

    /// Request transmission.
    ///
    /// Returns [`Error::NotValid`] if the object isn't valid, or
    /// [`Error::Busy`] if a request is still pending.
    pub fn transmit(&mut self) -> Result<(), Error> {
        let status = self.status();
        if !status.contains(MessageObjectStatus::VALID) {
            return Err(Error::NotValid);
        }
        if status.contains(MessageObjectStatus::TX_REQUEST) {
            return Err(Error::Busy);
        }
        ral::write_reg!(
            regs::message_object,
            self.regs,
            MOCTR,
            MOCTR::SETTXRQ | MOCTR::SETTXEN0 | MOCTR::SETTXEN1
        );
        trace!("MO {=usize} transmit", self.index);
        Ok(())
    }

    /// Copy a received frame into `buffer`, returning its length.
    ///
    /// Returns [`Error::NoNewData`] if nothing arrived since the last call.
    /// The copy repeats if a new frame lands while reading; if frames keep
    /// landing past the poll limit, returns [`Error::Timeout`].
    pub fn receive(&mut self, buffer: &mut [u8; 8]) -> Result<usize, Error> {
        if !self.status().contains(MessageObjectStatus::NEW_DATA) {
            return Err(Error::NoNewData);
        }
        let mut len = 0;
        wait::poll_until(self.poll_limit, || {
            ral::write_reg!(regs::message_object, self.regs, MOCTR, MOCTR::RESNEWDAT);
            len = self.data(buffer);
            let pending = MessageObjectStatus::NEW_DATA | MessageObjectStatus::RX_UPDATING;
            !self.status().intersects(pending)
        })?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, MessageObject, MessageObjectStatus, MessageObjectType, Priority};
    use crate::can::regs::{self, message_object::MOCTR};
    use crate::wait::PollLimit;
    use crate::Error;

    fn object(regs: &regs::message_object::MessageObject) -> MessageObject<'_> {
        MessageObject::new(regs, 7, PollLimit(8))
    }

    #[test]
    fn standard_identifier() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        mo.set_identifier(Id::Standard(0x123));
        assert_eq!(regs.MOAR.read(), 0x123 << 18);
        assert_eq!(mo.identifier(), Id::Standard(0x123));

        mo.set_identifier(Id::Standard(0xF123));
        assert_eq!(mo.identifier(), Id::Standard(0x123));
    }

    #[test]
    fn extended_identifier() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        mo.set_priority(Priority::Identifier);
        mo.set_identifier(Id::Extended(0x1ABC_DEF0));
        assert_eq!(regs.MOAR.read(), (2 << 30) | (1 << 29) | 0x1ABC_DEF0);
        assert_eq!(mo.identifier(), Id::Extended(0x1ABC_DEF0));

        mo.set_identifier(Id::Standard(0x7FF));
        assert_eq!(regs.MOAR.read(), (2 << 30) | (0x7FF << 18));
    }

    #[test]
    fn acceptance_mask() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        mo.set_acceptance_mask(Id::Standard(0x7F0), true);
        assert_eq!(regs.MOAMR.read(), (1 << 29) | (0x7F0 << 18));
        mo.set_acceptance_mask(Id::Extended(EXTENDED_ALL), false);
        assert_eq!(regs.MOAMR.read(), EXTENDED_ALL);
    }

    const EXTENDED_ALL: u32 = 0x1FFF_FFFF;

    #[test]
    fn configure_ends_valid() {
        let regs = regs::message_object::MessageObject::new();
        regs.MOFCR.write(0x0800_0003);
        let mut mo = object(&regs);
        mo.configure(MessageObjectType::Transmit);
        assert_eq!(regs.MOCTR.read(), MOCTR::SETMSGVAL);
        assert_eq!(regs.MOFCR.read(), 0x0800_0000);
        assert_eq!(mo.index(), 7);
    }

    #[test]
    fn set_data() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        mo.set_data(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(regs.MODATAL.read(), 0x0403_0201);
        assert_eq!(regs.MODATAH.read(), 0x0000_0005);
        assert_eq!(regs.MOFCR.read(), 5 << 24);
        assert_eq!(regs.MOCTR.read(), MOCTR::SETNEWDAT);

        let mut buffer = [0; 8];
        assert_eq!(mo.data(&mut buffer), 5);
        assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(mo.data_length(), 5);
    }

    #[test]
    fn too_much_data() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        assert_eq!(mo.set_data(&[0; 9]), Err(Error::DataLength));
        assert_eq!(regs.MOFCR.read(), 0);
        assert_eq!(regs.MOCTR.read(), 0);
    }

    #[test]
    fn data_length_capped() {
        let regs = regs::message_object::MessageObject::new();
        regs.MOFCR.write(15 << 24);
        let mo = object(&regs);
        assert_eq!(mo.data_length(), 8);
    }

    #[test]
    fn transmit_checks_status() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        assert_eq!(mo.transmit(), Err(Error::NotValid));

        let status = MessageObjectStatus::VALID | MessageObjectStatus::TX_REQUEST;
        regs.MOCTR.write(status.bits());
        assert_eq!(mo.transmit(), Err(Error::Busy));

        regs.MOCTR.write(MessageObjectStatus::VALID.bits());
        assert_eq!(mo.transmit(), Ok(()));
        assert_eq!(
            regs.MOCTR.read(),
            MOCTR::SETTXRQ | MOCTR::SETTXEN0 | MOCTR::SETTXEN1
        );
    }

    #[test]
    fn status_and_list() {
        let regs = regs::message_object::MessageObject::new();
        regs.MOCTR.write(0x0502_2828);
        let mo = object(&regs);
        assert_eq!(
            mo.status(),
            MessageObjectStatus::NEW_DATA
                | MessageObjectStatus::VALID
                | MessageObjectStatus::DIRECTION
        );
        assert_eq!(mo.list(), 2);
    }

    #[test]
    fn receive_without_new_data() {
        let regs = regs::message_object::MessageObject::new();
        let mut mo = object(&regs);
        let mut buffer = [0; 8];
        assert_eq!(mo.receive(&mut buffer), Err(Error::NoNewData));
    }

    #[test]
    fn receive_gives_up_on_stuck_new_data() {
        // In plain memory, the RESNEWDAT command lands on the NEWDAT bit.
        let regs = regs::message_object::MessageObject::new();
        regs.MOCTR.write(MessageObjectStatus::NEW_DATA.bits());
        let mut mo = object(&regs);
        let mut buffer = [0; 8];
        assert_eq!(mo.receive(&mut buffer), Err(Error::Timeout));
    }
}
