pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM function commands, sent right after the reset pulse
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    MatchRom = 0x55,
    SkipRom = 0xCC,
    ReadRom = 0x33,
    OverdriveSkipRom = 0x3C,
    OverdriveMatchRom = 0x69,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Memory function opcodes of one device family.
///
/// Families disagree on these (copy is 0x55 on most EEPROM parts, 0x5A on
/// the SHA parts, write status shares 0x55 on EPROM parts), so every
/// protocol instance carries its own set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryCommands {
    pub write_scratchpad: u8,
    pub read_scratchpad: u8,
    pub copy_scratchpad: u8,
    pub read_memory: u8,
    /// Read memory with an inverted CRC16 after each page
    pub read_memory_crc: Option<u8>,
}

impl MemoryCommands {
    pub const EEPROM: Self = Self {
        write_scratchpad: 0x0F,
        read_scratchpad: 0xAA,
        copy_scratchpad: 0x55,
        read_memory: 0xF0,
        read_memory_crc: None,
    };

    pub const EEPROM_EXTENDED_READ: Self = Self {
        read_memory_crc: Some(0xA5),
        ..Self::EEPROM
    };

    pub const SHA: Self = Self {
        copy_scratchpad: 0x5A,
        ..Self::EEPROM
    };
}

/// EPROM program/read opcodes for one memory area
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpromCommands {
    pub write: u8,
    pub read: u8,
}

impl EpromCommands {
    pub const DATA: Self = Self {
        write: 0x0F,
        read: 0xF0,
    };

    pub const STATUS: Self = Self {
        write: 0x55,
        read: 0xAA,
    };
}
