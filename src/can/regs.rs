//! MultiCAN register blocks
//!
//! The module implements RAL-compatible register blocks for the global
//! module registers, the CAN node registers, and the message objects.
//! [`RegisterBlock`] stitches them together at their fixed offsets, so a
//! pointer to the MultiCAN base address is a pointer to a `RegisterBlock`.

#![allow(
    non_snake_case,
    non_upper_case_globals,
    clippy::declare_interior_mutable_const
)]

use super::{MESSAGE_OBJECT_COUNT, NODE_COUNT};

/// Declares a register module with one RAL field module per field.
macro_rules! register {
    ($reg:ident { $($field:ident : $offset:expr, $width:expr;)* }) => {
        pub mod $reg {
            $(
                pub mod $field {
                    pub const offset: u32 = $offset;
                    pub const mask: u32 = ((1u32 << $width) - 1) << offset;
                    pub mod RW {}
                    pub mod R {}
                    pub mod W {}
                }
            )*
        }
    };
}

/// Global module registers, offset 0x000.
pub mod global {
    use crate::vcell::VCell;

    #[repr(C)]
    pub struct Global {
        pub CLC: VCell<u32>,
        _reserved0: u32,
        pub ID: VCell<u32>,
        pub FDR: VCell<u32>,
        _reserved1: [u32; 60],
        pub LIST: [VCell<u32>; 16],
        pub MSPND: [VCell<u32>; 8],
        _reserved2: [u32; 8],
        pub MSID: [VCell<u32>; 8],
        _reserved3: [u32; 8],
        pub MSIMASK: VCell<u32>,
        pub PANCTR: VCell<u32>,
        pub MCR: VCell<u32>,
        pub MITR: VCell<u32>,
        _reserved4: [u32; 12],
    }

    impl Global {
        pub const fn new() -> Self {
            const ZERO: VCell<u32> = VCell::new(0);
            Global {
                CLC: VCell::new(0),
                _reserved0: 0,
                ID: VCell::new(0),
                FDR: VCell::new(0),
                _reserved1: [0; 60],
                LIST: [ZERO; 16],
                MSPND: [ZERO; 8],
                _reserved2: [0; 8],
                MSID: [ZERO; 8],
                _reserved3: [0; 8],
                MSIMASK: VCell::new(0),
                PANCTR: VCell::new(0),
                MCR: VCell::new(0),
                MITR: VCell::new(0),
                _reserved4: [0; 12],
            }
        }
    }

    register!(CLC {
        DISR: 0, 1;
        DISS: 1, 1;
        EDIS: 3, 1;
    });

    register!(FDR {
        STEP: 0, 10;
        DM: 14, 2;
    });

    register!(LIST {
        BEGIN: 0, 8;
        END: 8, 8;
        SIZE: 16, 8;
        EMPTY: 24, 1;
    });

    register!(PANCTR {
        PANCMD: 0, 8;
        BUSY: 8, 1;
        RBUSY: 9, 1;
        PANAR1: 16, 8;
        PANAR2: 24, 8;
    });

    register!(MCR {
        CLKSEL: 0, 4;
        MPSEL: 12, 4;
    });

    const _: [(); 1] = [(); (core::mem::size_of::<Global>() == 0x200) as usize];
}

/// CAN node registers, offset 0x200 + n * 0x100.
pub mod node {
    use crate::vcell::VCell;

    #[repr(C)]
    pub struct Node {
        pub NCR: VCell<u32>,
        pub NSR: VCell<u32>,
        pub NIPR: VCell<u32>,
        pub NPCR: VCell<u32>,
        pub NBTR: VCell<u32>,
        pub NECNT: VCell<u32>,
        pub NFCR: VCell<u32>,
        _reserved: [u32; 57],
    }

    impl Node {
        pub const fn new() -> Self {
            Node {
                NCR: VCell::new(0),
                NSR: VCell::new(0),
                NIPR: VCell::new(0),
                NPCR: VCell::new(0),
                NBTR: VCell::new(0),
                NECNT: VCell::new(0),
                NFCR: VCell::new(0),
                _reserved: [0; 57],
            }
        }
    }

    register!(NCR {
        INIT: 0, 1;
        TRIE: 1, 1;
        LECIE: 2, 1;
        ALIE: 3, 1;
        CANDIS: 4, 1;
        CCE: 6, 1;
        CALM: 7, 1;
        SUSEN: 8, 1;
    });

    register!(NSR {
        LEC: 0, 3;
        TXOK: 3, 1;
        RXOK: 4, 1;
        ALERT: 5, 1;
        EWRN: 6, 1;
        BOFF: 7, 1;
        LLE: 8, 1;
        LOE: 9, 1;
        SUSACK: 10, 1;
    });

    register!(NPCR {
        RXSEL: 0, 3;
        LBM: 8, 1;
    });

    register!(NBTR {
        BRP: 0, 6;
        SJW: 6, 2;
        TSEG1: 8, 4;
        TSEG2: 12, 3;
        DIV8: 15, 1;
    });

    register!(NECNT {
        REC: 0, 8;
        TEC: 8, 8;
        EWRNLVL: 16, 8;
        LETD: 24, 1;
        LEINC: 25, 1;
    });

    const _: [(); 1] = [(); (core::mem::size_of::<Node>() == 0x100) as usize];
}

/// Message object registers, offset 0x1000 + n * 0x20.
pub mod message_object {
    use crate::vcell::VCell;

    #[repr(C)]
    pub struct MessageObject {
        pub MOFCR: VCell<u32>,
        pub MOFGPR: VCell<u32>,
        pub MOIPR: VCell<u32>,
        pub MOAMR: VCell<u32>,
        pub MODATAL: VCell<u32>,
        pub MODATAH: VCell<u32>,
        pub MOAR: VCell<u32>,
        /// Writes are MOCTR set / reset commands, reads return MOSTAT.
        pub MOCTR: VCell<u32>,
    }

    impl MessageObject {
        pub const fn new() -> Self {
            MessageObject {
                MOFCR: VCell::new(0),
                MOFGPR: VCell::new(0),
                MOIPR: VCell::new(0),
                MOAMR: VCell::new(0),
                MODATAL: VCell::new(0),
                MODATAH: VCell::new(0),
                MOAR: VCell::new(0),
                MOCTR: VCell::new(0),
            }
        }
    }

    register!(MOFCR {
        MMC: 0, 4;
        DLC: 24, 4;
    });

    register!(MOAMR {
        AM: 0, 29;
        MIDE: 29, 1;
    });

    register!(MOAR {
        ID: 0, 29;
        IDE: 29, 1;
        PRI: 30, 2;
    });

    /// MOCTR commands. The low half resets a MOSTAT bit, the high
    /// half sets it.
    pub mod MOCTR {
        pub const RESRXPND: u32 = 1 << 0;
        pub const RESTXPND: u32 = 1 << 1;
        pub const RESRXUPD: u32 = 1 << 2;
        pub const RESNEWDAT: u32 = 1 << 3;
        pub const RESMSGLST: u32 = 1 << 4;
        pub const RESMSGVAL: u32 = 1 << 5;
        pub const RESRTSEL: u32 = 1 << 6;
        pub const RESRXEN: u32 = 1 << 7;
        pub const RESTXRQ: u32 = 1 << 8;
        pub const RESTXEN0: u32 = 1 << 9;
        pub const RESTXEN1: u32 = 1 << 10;
        pub const RESDIR: u32 = 1 << 11;
        pub const SETRXPND: u32 = RESRXPND << 16;
        pub const SETTXPND: u32 = RESTXPND << 16;
        pub const SETRXUPD: u32 = RESRXUPD << 16;
        pub const SETNEWDAT: u32 = RESNEWDAT << 16;
        pub const SETMSGLST: u32 = RESMSGLST << 16;
        pub const SETMSGVAL: u32 = RESMSGVAL << 16;
        pub const SETRTSEL: u32 = RESRTSEL << 16;
        pub const SETRXEN: u32 = RESRXEN << 16;
        pub const SETTXRQ: u32 = RESTXRQ << 16;
        pub const SETTXEN0: u32 = RESTXEN0 << 16;
        pub const SETTXEN1: u32 = RESTXEN1 << 16;
        pub const SETDIR: u32 = RESDIR << 16;
    }

    register!(MOSTAT {
        LIST: 12, 4;
        PPREV: 16, 8;
        PNEXT: 24, 8;
    });

    const _: [(); 1] = [(); (core::mem::size_of::<MessageObject>() == 0x20) as usize];
}

const RESERVED_WORDS: usize = (0x1000 - 0x200 - NODE_COUNT * 0x100) / 4;

/// The complete MultiCAN register map.
#[repr(C)]
pub struct RegisterBlock {
    pub global: global::Global,
    pub nodes: [node::Node; NODE_COUNT],
    _reserved: [u32; RESERVED_WORDS],
    pub message_objects: [message_object::MessageObject; MESSAGE_OBJECT_COUNT],
}

impl RegisterBlock {
    /// All-zero registers, for use in ordinary memory.
    pub const fn new() -> Self {
        const NODE: node::Node = node::Node::new();
        const MO: message_object::MessageObject = message_object::MessageObject::new();
        RegisterBlock {
            global: global::Global::new(),
            nodes: [NODE; NODE_COUNT],
            _reserved: [0; RESERVED_WORDS],
            message_objects: [MO; MESSAGE_OBJECT_COUNT],
        }
    }
}

const BLOCK_SIZE: usize = 0x1000 + MESSAGE_OBJECT_COUNT * 0x20;
const _: [(); 1] = [(); (core::mem::size_of::<RegisterBlock>() == BLOCK_SIZE) as usize];
