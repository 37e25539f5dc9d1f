use crate::{
    Access, Address, Bank, BankIo, Capabilities, CopyMode, Device, ExtraInfo, Flavor, Geometry,
    Link, MemoryBank, MemoryCommands, Scratchpad, ScratchpadConfig,
};

/// 20Kb EEPROM, 80 pages of 32 bytes.
///
/// Copies whole 32 byte rows only. Extended read memory (0xA5) sends an
/// inverted CRC16 after every page.
#[derive(Debug)]
pub struct Ds28ec20 {
    link: Link,
    pad: Scratchpad,
    scratchpad: MemoryBank,
    memory: MemoryBank,
}

impl From<Ds28ec20> for Address {
    fn from(device: Ds28ec20) -> Self {
        *device.link.address()
    }
}

impl Ds28ec20 {
    pub const SCRATCHPAD: ScratchpadConfig = ScratchpadConfig::new(
        MemoryCommands::EEPROM_EXTENDED_READ,
        Flavor::Extended,
        32,
        CopyMode::Powered { delay_ms: 10 },
    );

    pub const SCRATCHPAD_BANK: Geometry =
        Geometry::paged(0x0000, 1, 32, Access::ReadWrite, Capabilities::PAGE_AUTO_CRC)
            .with_extra_info(ExtraInfo::LEN);

    pub const MEMORY: Geometry = Geometry::paged(
        0x0000,
        80,
        32,
        Access::ReadWrite,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::PAGE_AUTO_CRC)
            .union(Capabilities::POWER_DELIVERY),
    );

    pub fn link(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn scratchpad(&mut self) -> Bank<'_> {
        Bank::new(&mut self.scratchpad, &mut self.link, Some(&mut self.pad))
    }

    pub fn memory(&mut self) -> Bank<'_> {
        Bank::new(&mut self.memory, &mut self.link, Some(&mut self.pad))
    }
}

impl Device for Ds28ec20 {
    const FAMILY_CODE: u8 = 0x43;
    const NAME: &'static str = "DS28EC20";
    const DESCRIPTION: &'static str = "20480 bit EEPROM organized as 80 pages of 256 bits";

    fn address(&self) -> &Address {
        self.link.address()
    }

    unsafe fn from_address_unchecked(address: Address) -> Self {
        Self {
            link: Link::new(address),
            pad: Scratchpad::new(Self::SCRATCHPAD),
            scratchpad: MemoryBank::new("Scratchpad", Self::SCRATCHPAD_BANK, BankIo::Scratchpad),
            memory: MemoryBank::new(
                "Main memory",
                Self::MEMORY,
                BankIo::Eeprom(MemoryCommands::EEPROM_EXTENDED_READ),
            ),
        }
    }
}
